use crate::domain::errors::{DatasetError, LoadError};
use crate::domain::market::series::Series;
use crate::domain::ml::scaler::{ColumnScalers, scale_columns};
use crate::domain::ml::split::{DatasetSplit, SplitOptions, split_dataset};
use crate::domain::ml::window::{TailSequence, Windower, WindowedDataset};
use crate::domain::ports::MarketDataProvider;
use ndarray::Array3;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a series comes from: already in memory, or a ticker to fetch.
#[derive(Debug, Clone)]
pub enum SeriesSource {
    Loaded(Series),
    Ticker(String),
}

impl From<Series> for SeriesSource {
    fn from(series: Series) -> Self {
        SeriesSource::Loaded(series)
    }
}

impl From<&str> for SeriesSource {
    fn from(symbol: &str) -> Self {
        SeriesSource::Ticker(symbol.to_string())
    }
}

/// Parameters for turning one series into a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub n_steps: usize,
    pub lookup_step: usize,
    pub feature_columns: Vec<String>,
    pub target_column: String,
    pub scale: bool,
    pub split: SplitOptions,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            n_steps: 50,
            lookup_step: 1,
            feature_columns: ["adjclose", "volume", "open", "high", "low"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            target_column: "adjclose".to_string(),
            scale: true,
            split: SplitOptions {
                test_size: 0.2,
                shuffle: true,
                seed: None,
            },
        }
    }
}

/// Everything produced while loading one series.
#[derive(Debug, Clone)]
pub struct DatasetBundle {
    /// The series exactly as resolved, before scaling
    pub series: Series,
    /// Empty when scaling is disabled
    pub scalers: ColumnScalers,
    pub tail: TailSequence,
    pub split: DatasetSplit,
    pub feature_columns: Vec<String>,
    pub target_column: String,
    pub n_steps: usize,
    pub lookup_step: usize,
}

impl DatasetBundle {
    pub fn total_windows(&self) -> usize {
        self.split.train_len() + self.split.test_len()
    }

    /// Fails when there is nothing to train on.
    pub fn ensure_trainable(&self) -> Result<(), DatasetError> {
        if self.split.train_len() == 0 {
            return Err(DatasetError::InsufficientData {
                available: self.series.len(),
                required: self.n_steps.saturating_add(self.lookup_step),
            });
        }
        Ok(())
    }

    /// Maps model outputs back to the target column's raw scale.
    pub fn invert_target(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .map(|v| self.scalers.invert_value(&self.target_column, *v))
            .collect()
    }
}

/// Symbols accepted by providers: ASCII alphanumerics plus `.-=^_`.
pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= 32
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '=' | '^' | '_'))
}

/// Scales, windows and splits one series.
pub struct DatasetLoader {
    options: LoadOptions,
    provider: Arc<dyn MarketDataProvider>,
}

struct Prepared {
    series: Series,
    scalers: ColumnScalers,
    dataset: WindowedDataset,
}

impl DatasetLoader {
    pub fn new(options: LoadOptions, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { options, provider }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Returns the series behind `source`, fetching it if needed.
    pub async fn resolve(&self, source: SeriesSource) -> Result<Series, LoadError> {
        match source {
            SeriesSource::Loaded(series) => Ok(series),
            SeriesSource::Ticker(symbol) => {
                let symbol = symbol.trim();
                if !is_valid_symbol(symbol) {
                    return Err(DatasetError::InvalidInput {
                        reason: format!("'{}' is not a ticker symbol", symbol),
                    }
                    .into());
                }
                info!(
                    "DatasetLoader: fetching {} from {}",
                    symbol,
                    self.provider.name()
                );
                let series = self.provider.fetch_daily_series(symbol).await?;
                Ok(series)
            }
        }
    }

    fn prepare(&self, series: Series) -> Result<Prepared, LoadError> {
        let opts = &self.options;
        series.require_columns(&opts.feature_columns)?;

        let (scaled, scalers) = if opts.scale {
            let scaled = scale_columns(&series, &opts.feature_columns)?;
            (scaled.series, scaled.scalers)
        } else {
            (series.clone(), ColumnScalers::default())
        };

        let dataset = Windower::new(opts.n_steps, opts.lookup_step)
            .with_target(&opts.target_column)
            .window(&scaled, &opts.feature_columns)?;

        let label = series.symbol().unwrap_or("<in-memory>");
        if dataset.is_empty() {
            warn!(
                "DatasetLoader: {} has {} rows, fewer than n_steps + lookup_step = {}; dataset is empty",
                label,
                series.len(),
                opts.n_steps.saturating_add(opts.lookup_step)
            );
        } else {
            debug!(
                "DatasetLoader: {} rows -> {} windows of {}x{} for {}",
                series.len(),
                dataset.len(),
                dataset.n_features(),
                opts.n_steps,
                label
            );
        }

        Ok(Prepared {
            series,
            scalers,
            dataset,
        })
    }

    /// Loads the full bundle: raw series, scalers, tail and train/test split.
    pub async fn load_bundle(&self, source: SeriesSource) -> Result<DatasetBundle, LoadError> {
        let series = self.resolve(source).await?;
        let prepared = self.prepare(series)?;
        let split = split_dataset(&prepared.dataset, &self.options.split)?;

        info!(
            "DatasetLoader: {} windows (train {}, test {}, shuffle {})",
            prepared.dataset.len(),
            split.train_len(),
            split.test_len(),
            self.options.split.shuffle
        );

        Ok(DatasetBundle {
            series: prepared.series,
            scalers: prepared.scalers,
            tail: prepared.dataset.tail,
            split,
            feature_columns: self.options.feature_columns.clone(),
            target_column: self.options.target_column.clone(),
            n_steps: self.options.n_steps,
            lookup_step: self.options.lookup_step,
        })
    }

    /// Loads only the pre-split window tensor `(examples, features, steps)`.
    pub async fn load_feature_tensor(&self, source: SeriesSource) -> Result<Array3<f64>, LoadError> {
        let series = self.resolve(source).await?;
        let prepared = self.prepare(series)?;
        Ok(prepared.dataset.windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_validation() {
        for ok in ["TSLA", "GBP=X", "^GSPC", "BRK-B", "RDS.A"] {
            assert!(is_valid_symbol(ok), "{ok}");
        }
        for bad in ["", "TS LA", "AAPL/US", "ÄPL", "a;b"] {
            assert!(!is_valid_symbol(bad), "{bad}");
        }
    }

    #[test]
    fn test_source_conversions() {
        assert!(matches!(SeriesSource::from("TSLA"), SeriesSource::Ticker(s) if s == "TSLA"));
    }
}
