use super::predictor::{SequenceRegressor, TrainingHistory};
use crate::domain::errors::ModelError;
use ndarray::{Array1, Array3};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};
use tracing::info;

type Model = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Ordinary least squares over flattened windows. Used as a reference
/// point for the recurrent model.
#[derive(Default)]
pub struct LinearBaseline {
    model: Option<Model>,
    width: usize,
}

impl LinearBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    fn flatten(x: &Array3<f64>) -> Vec<Vec<f64>> {
        x.outer_iter()
            .map(|window| window.iter().copied().collect())
            .collect()
    }

    fn to_matrix(x: &Array3<f64>) -> Result<DenseMatrix<f64>, ModelError> {
        DenseMatrix::from_2d_vec(&Self::flatten(x)).map_err(|e| ModelError::Backend {
            reason: format!("Matrix error: {}", e),
        })
    }

    fn mean_absolute_error(&self, x: &Array3<f64>, y: &Array1<f64>) -> Result<f64, ModelError> {
        let predictions = self.predict(x)?;
        if predictions.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, t)| (p - t).abs())
            .sum();
        Ok(total / predictions.len() as f64)
    }
}

impl SequenceRegressor for LinearBaseline {
    fn fit(
        &mut self,
        x_train: &Array3<f64>,
        y_train: &Array1<f64>,
        validation: Option<(&Array3<f64>, &Array1<f64>)>,
    ) -> Result<TrainingHistory, ModelError> {
        let n = x_train.shape()[0];
        if n == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if y_train.len() != n {
            return Err(ModelError::ShapeMismatch {
                expected: format!("{} labels", n),
                actual: y_train.len().to_string(),
            });
        }

        let matrix = Self::to_matrix(x_train)?;
        // SVD copes with the constant columns min-max scaling can produce
        let params =
            LinearRegressionParameters::default().with_solver(LinearRegressionSolverName::SVD);
        let model = LinearRegression::fit(&matrix, &y_train.to_vec(), params).map_err(|e| {
            ModelError::Backend {
                reason: format!("Training error: {}", e),
            }
        })?;

        self.model = Some(model);
        self.width = x_train.shape()[1] * x_train.shape()[2];
        info!("LinearBaseline: fitted on {} examples", n);

        let mut history = TrainingHistory {
            train_loss: vec![self.mean_absolute_error(x_train, y_train)?],
            val_loss: Vec::new(),
        };
        if let Some((x_val, y_val)) = validation {
            history.val_loss.push(self.mean_absolute_error(x_val, y_val)?);
        }
        Ok(history)
    }

    fn predict(&self, x: &Array3<f64>) -> Result<Array1<f64>, ModelError> {
        let model = self.model.as_ref().ok_or_else(|| ModelError::NotFitted {
            model: self.name().to_string(),
        })?;

        let width = x.shape()[1] * x.shape()[2];
        if width != self.width {
            return Err(ModelError::ShapeMismatch {
                expected: format!("{} values per window", self.width),
                actual: width.to_string(),
            });
        }
        if x.shape()[0] == 0 {
            return Ok(Array1::zeros(0));
        }

        let predictions: Vec<f64> = model
            .predict(&Self::to_matrix(x)?)
            .map_err(|e| ModelError::Backend {
                reason: format!("Predict error: {}", e),
            })?;
        Ok(Array1::from(predictions))
    }

    fn name(&self) -> &str {
        "Linear Regression"
    }
}
