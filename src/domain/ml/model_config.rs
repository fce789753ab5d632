use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Activation used for the LSTM cell candidate and cell output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellActivation {
    Tanh,
    Relu,
}

impl CellActivation {
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            CellActivation::Tanh => x.tanh(),
            CellActivation::Relu => x.max(0.0),
        }
    }

    /// Derivative expressed through the activation's output `y = f(x)`.
    pub fn derivative_from_output(&self, y: f64) -> f64 {
        match self {
            CellActivation::Tanh => 1.0 - y * y,
            CellActivation::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl FromStr for CellActivation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tanh" => Ok(CellActivation::Tanh),
            "relu" => Ok(CellActivation::Relu),
            _ => Err(format!("Invalid activation: {}. Must be 'tanh' or 'relu'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    /// Mean absolute error
    Mae,
    /// Huber loss with delta 1.0
    Huber,
}

impl LossKind {
    pub fn value(&self, error: f64) -> f64 {
        match self {
            LossKind::Mae => error.abs(),
            LossKind::Huber => {
                if error.abs() <= 1.0 {
                    0.5 * error * error
                } else {
                    error.abs() - 0.5
                }
            }
        }
    }

    pub fn gradient(&self, error: f64) -> f64 {
        match self {
            LossKind::Mae => {
                if error > 0.0 {
                    1.0
                } else if error < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            LossKind::Huber => error.clamp(-1.0, 1.0),
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossKind::Mae => write!(f, "mae"),
            LossKind::Huber => write!(f, "huber_loss"),
        }
    }
}

impl FromStr for LossKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mae" | "mean_absolute_error" => Ok(LossKind::Mae),
            "huber" | "huber_loss" => Ok(LossKind::Huber),
            _ => Err(format!("Invalid loss: {}. Must be 'mae' or 'huber'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    RmsProp,
    Adam,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::RmsProp => write!(f, "rmsprop"),
            OptimizerKind::Adam => write!(f, "adam"),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rmsprop" => Ok(OptimizerKind::RmsProp),
            "adam" => Ok(OptimizerKind::Adam),
            _ => Err(format!("Invalid optimizer: {}. Must be 'rmsprop' or 'adam'", s)),
        }
    }
}

/// Hyper-parameters of the recurrent regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub units: usize,
    pub dropout: f64,
    pub activation: CellActivation,
    pub loss: LossKind,
    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    /// Global-norm clip applied to each batch gradient
    pub gradient_clip: Option<f64>,
    /// Seed for weight init, dropout masks and batch order
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            units: 50,
            dropout: 0.2,
            activation: CellActivation::Relu,
            loss: LossKind::Mae,
            optimizer: OptimizerKind::RmsProp,
            learning_rate: 0.001,
            batch_size: 64,
            epochs: 400,
            gradient_clip: Some(5.0),
            seed: None,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.units == 0 {
            return Err("units must be at least 1".to_string());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        if !(self.learning_rate > 0.0) {
            return Err(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        if let Some(clip) = self.gradient_clip.filter(|c| !(*c > 0.0)) {
            return Err(format!("gradient_clip must be positive, got {}", clip));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsing() {
        assert_eq!(CellActivation::from_str("ReLU").unwrap(), CellActivation::Relu);
        assert_eq!(LossKind::from_str("huber_loss").unwrap(), LossKind::Huber);
        assert_eq!(OptimizerKind::from_str("ADAM").unwrap(), OptimizerKind::Adam);
        assert!(OptimizerKind::from_str("sgd").is_err());
    }

    #[test]
    fn test_loss_gradients() {
        assert_eq!(LossKind::Mae.gradient(-3.0), -1.0);
        assert_eq!(LossKind::Huber.gradient(0.25), 0.25);
        assert_eq!(LossKind::Huber.gradient(4.0), 1.0);
        assert_eq!(LossKind::Huber.value(3.0), 2.5);
    }

    #[test]
    fn test_non_positive_gradient_clip_rejected() {
        for clip in [0.0, -1.0, f64::NAN] {
            let cfg = ModelConfig {
                gradient_clip: Some(clip),
                ..ModelConfig::default()
            };
            assert!(cfg.validate().is_err(), "clip {clip} accepted");
        }
        let unclipped = ModelConfig {
            gradient_clip: None,
            ..ModelConfig::default()
        };
        assert!(unclipped.validate().is_ok());
    }

    #[test]
    fn test_default_validates() {
        assert!(ModelConfig::default().validate().is_ok());
        let bad = ModelConfig {
            dropout: 1.0,
            ..ModelConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
