use crate::domain::errors::FetchError;
use crate::domain::market::series::{PriceBar, Series};
use crate::domain::ports::MarketDataProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use csv::StringRecord;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reads `<dir>/<SYMBOL>.csv` files, one per ticker.
///
/// Expected header: `date,open,high,low,close,adjclose,volume`, in any
/// case. The date column may also be unnamed, as in pandas exports. Extra
/// columns are ignored and empty cells load as NaN.
pub struct CsvMarketDataProvider {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    adjclose: Option<f64>,
    volume: Option<f64>,
}

impl CsvMarketDataProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol.to_uppercase()))
    }

    fn read_series(symbol: &str, path: &Path) -> Result<Series, FetchError> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(FetchError::UnknownSymbol {
                symbol: symbol.to_string(),
            });
        }

        let file = File::open(path).map_err(|e| FetchError::Io {
            path: display.clone(),
            source: e,
        })?;
        let mut rdr = csv::Reader::from_reader(BufReader::new(file));
        let csv_error = |e: csv::Error| FetchError::Csv {
            path: display.clone(),
            source: e,
        };

        // Lowercase names, an unnamed first column is the date index
        let headers: StringRecord = rdr
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(|h| {
                let h = h.trim().to_lowercase();
                if h.is_empty() { "date".to_string() } else { h }
            })
            .collect();
        rdr.set_headers(headers);

        let mut bars = Vec::new();
        for result in rdr.deserialize() {
            let row: CsvRow = result.map_err(csv_error)?;
            let nan = f64::NAN;
            bars.push(PriceBar {
                date: row.date,
                open: row.open.unwrap_or(nan),
                high: row.high.unwrap_or(nan),
                low: row.low.unwrap_or(nan),
                close: row.close.unwrap_or(nan),
                adjclose: row.adjclose.or(row.close).unwrap_or(nan),
                volume: row.volume.unwrap_or(nan),
            });
        }
        bars.sort_by_key(|b| b.date);

        Ok(Series::from_bars(symbol, &bars))
    }
}

#[async_trait]
impl MarketDataProvider for CsvMarketDataProvider {
    async fn fetch_daily_series(&self, symbol: &str) -> Result<Series, FetchError> {
        let path = self.path_for(symbol);
        let series = Self::read_series(symbol, &path)?;
        info!(
            "CsvMarketDataProvider: {} rows for {} from {}",
            series.len(),
            symbol,
            path.display()
        );
        Ok(series)
    }

    fn name(&self) -> &str {
        "CSV"
    }
}
