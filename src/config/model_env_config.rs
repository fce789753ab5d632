//! Model hyper-parameters from environment variables.

use super::{parse_optional, parse_var};
use crate::domain::ml::model_config::ModelConfig;
use anyhow::Result;

/// Reads `FORECAST_MODEL_*` variables on top of the defaults.
pub fn model_config_from_env() -> Result<ModelConfig> {
    let defaults = ModelConfig::default();
    let gradient_clip = match parse_optional::<f64>("FORECAST_MODEL_GRADIENT_CLIP")? {
        // Zero or negative disables clipping
        Some(clip) if clip <= 0.0 => None,
        Some(clip) => Some(clip),
        None => defaults.gradient_clip,
    };

    Ok(ModelConfig {
        units: parse_var("FORECAST_MODEL_UNITS", defaults.units)?,
        dropout: parse_var("FORECAST_MODEL_DROPOUT", defaults.dropout)?,
        activation: parse_var("FORECAST_MODEL_ACTIVATION", defaults.activation)?,
        loss: parse_var("FORECAST_MODEL_LOSS", defaults.loss)?,
        optimizer: parse_var("FORECAST_MODEL_OPTIMIZER", defaults.optimizer)?,
        learning_rate: parse_var("FORECAST_MODEL_LEARNING_RATE", defaults.learning_rate)?,
        batch_size: parse_var("FORECAST_MODEL_BATCH_SIZE", defaults.batch_size)?,
        epochs: parse_var("FORECAST_MODEL_EPOCHS", defaults.epochs)?,
        gradient_clip,
        seed: parse_optional("FORECAST_MODEL_SEED")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::model_config::{LossKind, OptimizerKind};

    #[test]
    fn test_model_config_defaults_from_env() {
        let config = model_config_from_env().unwrap();
        assert_eq!(config.units, 50);
        assert_eq!(config.loss, LossKind::Mae);
        assert_eq!(config.optimizer, OptimizerKind::RmsProp);
        assert_eq!(config.batch_size, 64);
    }
}
