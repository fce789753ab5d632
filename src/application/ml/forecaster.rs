use super::predictor::SequenceRegressor;
use crate::application::dataset::loader::DatasetBundle;
use crate::domain::errors::{DatasetError, ModelError};
use crate::domain::ml::metrics::RegressionMetrics;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Actual vs predicted prices for the chart, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub title: String,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

impl ChartData {
    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    /// `[step, price]` points for plotting.
    pub fn actual_points(&self) -> Vec<[f64; 2]> {
        points(&self.actual)
    }

    pub fn predicted_points(&self) -> Vec<[f64; 2]> {
        points(&self.predicted)
    }
}

fn points(values: &[f64]) -> Vec<[f64; 2]> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| [i as f64, *v])
        .collect()
}

/// Test-set quality of one model on the raw price scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub model: String,
    pub metrics: RegressionMetrics,
    pub chart: ChartData,
}

/// Evaluates models against a bundle and forecasts past its last row.
pub struct Forecaster {
    chart_window: usize,
}

impl Forecaster {
    pub fn new(chart_window: usize) -> Self {
        Self { chart_window }
    }

    /// Predicts the test split, inverts both sides with the target scaler
    /// and keeps the most recent `chart_window` pairs for plotting.
    pub fn evaluate(
        &self,
        model: &dyn SequenceRegressor,
        bundle: &DatasetBundle,
    ) -> Result<Evaluation, ForecastError> {
        let predicted = model.predict(&bundle.split.x_test)?;
        let predicted = bundle.invert_target(&predicted.to_vec());
        let actual = bundle.invert_target(&bundle.split.y_test.to_vec());

        let metrics = RegressionMetrics::compute(&predicted, &actual);
        let start = actual.len().saturating_sub(self.chart_window);
        let title = format!(
            "{} - {}",
            bundle.series.symbol().unwrap_or("series"),
            model.name()
        );

        Ok(Evaluation {
            model: model.name().to_string(),
            metrics,
            chart: ChartData {
                title,
                actual: actual[start..].to_vec(),
                predicted: predicted[start..].to_vec(),
            },
        })
    }

    /// Price `lookup_step` rows past the end of the series, predicted from
    /// the tail history.
    pub fn forecast_next(
        &self,
        model: &dyn SequenceRegressor,
        bundle: &DatasetBundle,
    ) -> Result<f64, ForecastError> {
        let input = bundle
            .tail
            .history_window(bundle.n_steps)
            .ok_or(DatasetError::InsufficientData {
                available: bundle.tail.history.nrows(),
                required: bundle.n_steps,
            })?;

        let prediction = model.predict(&input)?;
        let value = prediction.first().copied().ok_or_else(|| ModelError::Backend {
            reason: "no prediction returned".to_string(),
        })?;
        Ok(bundle.scalers.invert_value(&bundle.target_column, value))
    }
}
