pub mod csv_source;
pub mod http_client_factory;
pub mod mock;
pub mod yahoo;

pub use csv_source::CsvMarketDataProvider;
pub use mock::MockMarketDataProvider;
pub use yahoo::YahooMarketDataProvider;
