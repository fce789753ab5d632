use crate::domain::errors::FetchError;
use crate::domain::market::series::{PriceBar, Series};
use crate::domain::ports::MarketDataProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// In-memory provider serving registered series by symbol.
#[derive(Clone, Default)]
pub struct MockMarketDataProvider {
    series: Arc<RwLock<HashMap<String, Series>>>,
}

impl MockMarketDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration. The map is only contended once the
    /// provider has been cloned and is in use.
    pub fn with_series(self, symbol: &str, series: Series) -> Self {
        let (key, series) = Self::entry(symbol, series);
        match self.series.try_write() {
            Ok(mut map) => {
                map.insert(key, series);
            }
            Err(_) => warn!(
                "MockMarketDataProvider: series map busy, {} not registered; use insert()",
                key
            ),
        }
        self
    }

    pub async fn insert(&self, symbol: &str, series: Series) {
        let (key, series) = Self::entry(symbol, series);
        self.series.write().await.insert(key, series);
    }

    fn entry(symbol: &str, series: Series) -> (String, Series) {
        let key = symbol.to_uppercase();
        let series = series.with_symbol(&key);
        (key, series)
    }

    /// Linear trend with a small oscillation, `rows` consecutive days.
    pub fn synthetic_series(symbol: &str, rows: usize) -> Series {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
        let bars: Vec<PriceBar> = (0..rows)
            .map(|i| {
                let t = i as f64;
                let price = 100.0 + 0.5 * t + 3.0 * (t / 5.0).sin();
                PriceBar {
                    date: start + chrono::Days::new(i as u64),
                    open: price - 0.4,
                    high: price + 1.2,
                    low: price - 1.1,
                    close: price,
                    adjclose: price,
                    volume: 1_000_000.0 + 5_000.0 * (t / 3.0).cos(),
                }
            })
            .collect();
        Series::from_bars(symbol, &bars)
    }
}

#[async_trait]
impl MarketDataProvider for MockMarketDataProvider {
    async fn fetch_daily_series(&self, symbol: &str) -> Result<Series, FetchError> {
        let key = symbol.to_uppercase();
        let found = self.series.read().await.get(&key).cloned();

        match found {
            Some(series) => {
                debug!("MockMarketDataProvider: serving {} rows for {}", series.len(), key);
                Ok(series)
            }
            None => Err(FetchError::UnknownSymbol { symbol: key }),
        }
    }

    fn name(&self) -> &str {
        "Mock"
    }
}
