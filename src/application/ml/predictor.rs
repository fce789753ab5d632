use crate::domain::errors::ModelError;
use ndarray::{Array1, Array3};
use serde::{Deserialize, Serialize};

/// Per-epoch losses recorded while fitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train_loss: Vec<f64>,
    /// Empty when no validation data was supplied
    pub val_loss: Vec<f64>,
}

impl TrainingHistory {
    pub fn final_train_loss(&self) -> Option<f64> {
        self.train_loss.last().copied()
    }

    pub fn final_val_loss(&self) -> Option<f64> {
        self.val_loss.last().copied()
    }
}

/// Interface for models mapping a window tensor to one scalar per example.
///
/// Inputs are shaped `(examples, features, steps)`.
pub trait SequenceRegressor {
    fn fit(
        &mut self,
        x_train: &Array3<f64>,
        y_train: &Array1<f64>,
        validation: Option<(&Array3<f64>, &Array1<f64>)>,
    ) -> Result<TrainingHistory, ModelError>;

    fn predict(&self, x: &Array3<f64>) -> Result<Array1<f64>, ModelError>;

    /// Get model name/type
    fn name(&self) -> &str;
}
