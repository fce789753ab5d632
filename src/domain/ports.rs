use crate::domain::errors::FetchError;
use crate::domain::market::series::Series;
use async_trait::async_trait;

// Need async_trait for async functions in traits
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Full daily history for `symbol` with at least the
    /// `open, high, low, close, adjclose, volume` columns, oldest row first.
    async fn fetch_daily_series(&self, symbol: &str) -> Result<Series, FetchError>;

    fn name(&self) -> &str;
}
