use crate::application::dataset::loader::{DatasetLoader, SeriesSource};
use crate::application::ml::forecaster::{Evaluation, ForecastError, Forecaster};
use crate::application::ml::linear_baseline::LinearBaseline;
use crate::application::ml::lstm::LstmRegressor;
use crate::application::ml::predictor::{SequenceRegressor, TrainingHistory};
use crate::config::ForecastConfig;
use crate::domain::errors::LoadError;
use crate::domain::ports::MarketDataProvider;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

/// Shape of a series loaded for reference only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub symbol: String,
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub windows: usize,
    pub train_windows: usize,
    pub test_windows: usize,
    /// Most recent non-missing target value, raw scale
    pub last_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastReport {
    pub model_name: String,
    pub symbol: String,
    pub evaluation: Evaluation,
    pub baseline: Option<Evaluation>,
    pub history: TrainingHistory,
    /// Price `lookup_step` days past the last row
    pub next_price: Option<f64>,
    pub lookup_step: usize,
    pub secondary: Option<SeriesSummary>,
}

impl ForecastReport {
    pub fn log_summary(&self) {
        info!("=== Forecast report: {} ===", self.model_name);
        let m = &self.evaluation.metrics;
        info!(
            "{} on {}: RMSE {:.4}, MAE {:.4}, R2 {:.4} over {} test examples",
            self.evaluation.model, self.symbol, m.rmse, m.mae, m.r2, m.samples
        );
        if let Some(loss) = self.history.final_train_loss() {
            info!(
                "Final train loss {:.6}, validation loss {}",
                loss,
                self.history
                    .final_val_loss()
                    .map(|v| format!("{:.6}", v))
                    .unwrap_or_else(|| "n/a".to_string())
            );
        }
        if let Some(baseline) = &self.baseline {
            let b = &baseline.metrics;
            info!(
                "{}: RMSE {:.4}, MAE {:.4}, R2 {:.4}",
                baseline.model, b.rmse, b.mae, b.r2
            );
        }
        match self.next_price {
            Some(price) => info!(
                "Future price after {} day(s) is {:.2}",
                self.lookup_step, price
            ),
            None => warn!("No forward forecast: tail history is incomplete"),
        }
        if let Some(s) = &self.secondary {
            info!(
                "Secondary {}: {} rows, {} windows ({} train / {} test), last value {}",
                s.symbol,
                s.rows,
                s.windows,
                s.train_windows,
                s.test_windows,
                s.last_value
                    .map(|v| format!("{:.4}", v))
                    .unwrap_or_else(|| "n/a".to_string())
            );
        }
    }
}

/// Loads, trains, evaluates and forecasts one instrument.
pub struct ForecastPipeline {
    config: ForecastConfig,
    provider: Arc<dyn MarketDataProvider>,
}

impl ForecastPipeline {
    pub fn new(config: ForecastConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    async fn summarise_secondary(&self, source: SeriesSource) -> Result<SeriesSummary, LoadError> {
        let loader = DatasetLoader::new(
            self.config.dataset.load_options(false),
            self.provider.clone(),
        );
        let bundle = loader.load_bundle(source).await?;
        let series = &bundle.series;

        Ok(SeriesSummary {
            symbol: series.symbol().unwrap_or("<in-memory>").to_string(),
            rows: series.len(),
            first_date: series.dates().first().copied(),
            last_date: series.dates().last().copied(),
            windows: bundle.total_windows(),
            train_windows: bundle.split.train_len(),
            test_windows: bundle.split.test_len(),
            last_value: series.last_valid(&bundle.target_column)?,
        })
    }

    pub async fn run(
        &self,
        primary: SeriesSource,
        secondary: Option<SeriesSource>,
    ) -> Result<ForecastReport, PipelineError> {
        let secondary = match secondary {
            Some(source) => Some(self.summarise_secondary(source).await?),
            None => None,
        };

        let loader = DatasetLoader::new(
            self.config.dataset.load_options(self.config.dataset.shuffle),
            self.provider.clone(),
        );
        // Fetch once, both loads below reuse it
        let series = loader.resolve(primary).await?;
        let symbol = series
            .symbol()
            .unwrap_or(self.config.ticker.as_str())
            .to_string();

        let tensor = loader.load_feature_tensor(series.clone().into()).await?;
        info!("ForecastPipeline: feature tensor for {} is {:?}", symbol, tensor.shape());

        let bundle = loader.load_bundle(series.into()).await?;
        bundle.ensure_trainable().map_err(ForecastError::from)?;

        let split = &bundle.split;
        let validation = (split.test_len() > 0).then_some((&split.x_test, &split.y_test));

        let mut lstm = LstmRegressor::new(self.config.model.clone());
        let history = lstm
            .fit(&split.x_train, &split.y_train, validation)
            .map_err(ForecastError::from)?;

        let forecaster = Forecaster::new(self.config.chart_window);
        let evaluation = forecaster.evaluate(&lstm, &bundle)?;

        let mut linear = LinearBaseline::new();
        let baseline = match linear.fit(&split.x_train, &split.y_train, None) {
            Ok(_) => Some(forecaster.evaluate(&linear, &bundle)?),
            Err(e) => {
                warn!("ForecastPipeline: {} skipped: {}", linear.name(), e);
                None
            }
        };

        let next_price = match forecaster.forecast_next(&lstm, &bundle) {
            Ok(price) => Some(price),
            Err(ForecastError::Dataset(e)) => {
                warn!("ForecastPipeline: cannot forecast past the series: {}", e);
                None
            }
            Err(e) => return Err(e.into()),
        };

        let model_name = ForecastConfig {
            ticker: symbol.clone(),
            ..self.config.clone()
        }
        .model_name(chrono::Local::now().date_naive());

        Ok(ForecastReport {
            model_name,
            symbol,
            evaluation,
            baseline,
            history,
            next_price,
            lookup_step: self.config.dataset.lookup_step,
            secondary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{DatasetError, FetchError};
    use crate::infrastructure::mock::MockMarketDataProvider;

    fn small_config() -> ForecastConfig {
        let mut config = ForecastConfig::default();
        config.ticker = "SYN".to_string();
        config.secondary_ticker = None;
        config.dataset.n_steps = 6;
        config.dataset.test_size = 0.2;
        config.model.units = 4;
        config.model.epochs = 3;
        config.model.batch_size = 16;
        config.model.seed = Some(1);
        config
    }

    #[tokio::test]
    async fn test_secondary_fetch_failure_aborts_run() {
        let provider = MockMarketDataProvider::new()
            .with_series("SYN", MockMarketDataProvider::synthetic_series("SYN", 80));
        let pipeline = ForecastPipeline::new(small_config(), Arc::new(provider));

        let err = pipeline
            .run("SYN".into(), Some("GBP=X".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Load(LoadError::Fetch(FetchError::UnknownSymbol { .. }))
        ));
    }

    #[tokio::test]
    async fn test_too_short_series_is_insufficient_data() {
        let provider = MockMarketDataProvider::new()
            .with_series("SYN", MockMarketDataProvider::synthetic_series("SYN", 4));
        let pipeline = ForecastPipeline::new(small_config(), Arc::new(provider));

        let err = pipeline.run("SYN".into(), None).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Forecast(ForecastError::Dataset(DatasetError::InsufficientData { .. }))
        ));
    }
}
