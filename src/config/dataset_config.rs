//! Dataset configuration parsing from environment variables.
//!
//! Window geometry, split parameters and the feature columns fed to the model.

use super::{parse_list, parse_optional, parse_var};
use crate::application::dataset::loader::LoadOptions;
use crate::domain::ml::split::SplitOptions;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// How a series is turned into windows and split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Window size (sequence length)
    pub n_steps: usize,
    /// Label offset, 1 is the next day
    pub lookup_step: usize,
    /// Fraction of windows held out for testing
    pub test_size: f64,
    pub feature_columns: Vec<String>,
    pub target_column: String,
    pub scale: bool,
    pub shuffle: bool,
    pub shuffle_seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            n_steps: 50,
            lookup_step: 1,
            test_size: 0.08,
            feature_columns: ["adjclose", "volume", "open", "high", "low"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            target_column: "adjclose".to_string(),
            scale: true,
            shuffle: false,
            shuffle_seed: None,
        }
    }
}

impl DatasetConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            n_steps: parse_var("FORECAST_N_STEPS", defaults.n_steps)?,
            lookup_step: parse_var("FORECAST_LOOKUP_STEP", defaults.lookup_step)?,
            test_size: parse_var("FORECAST_TEST_SIZE", defaults.test_size)?,
            feature_columns: parse_list("FORECAST_FEATURE_COLUMNS", defaults.feature_columns),
            target_column: parse_var("FORECAST_TARGET_COLUMN", defaults.target_column)?,
            scale: parse_var("FORECAST_SCALE", defaults.scale)?,
            shuffle: parse_var("FORECAST_SHUFFLE", defaults.shuffle)?,
            shuffle_seed: parse_optional("FORECAST_SHUFFLE_SEED")?,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.n_steps == 0 {
            return Err("n_steps must be at least 1".to_string());
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(format!("test_size must be in (0, 1), got {}", self.test_size));
        }
        if self.feature_columns.is_empty() {
            return Err("feature_columns must not be empty".to_string());
        }
        if self.target_column.trim().is_empty() {
            return Err("target_column must not be empty".to_string());
        }
        Ok(())
    }

    /// Loader options for this configuration. `shuffle` overrides the
    /// configured flag so secondary series can keep temporal order.
    pub fn load_options(&self, shuffle: bool) -> LoadOptions {
        LoadOptions {
            n_steps: self.n_steps,
            lookup_step: self.lookup_step,
            feature_columns: self.feature_columns.clone(),
            target_column: self.target_column.clone(),
            scale: self.scale,
            split: SplitOptions {
                test_size: self.test_size,
                shuffle,
                seed: self.shuffle_seed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_config_defaults() {
        let config = DatasetConfig::default();
        assert_eq!(config.n_steps, 50);
        assert_eq!(config.lookup_step, 1);
        assert_eq!(config.test_size, 0.08);
        assert_eq!(config.feature_columns.len(), 5);
        assert!(!config.shuffle);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_steps = DatasetConfig {
            n_steps: 0,
            ..DatasetConfig::default()
        };
        assert!(zero_steps.validate().is_err());

        let whole_test = DatasetConfig {
            test_size: 1.0,
            ..DatasetConfig::default()
        };
        assert!(whole_test.validate().is_err());

        let no_features = DatasetConfig {
            feature_columns: Vec::new(),
            ..DatasetConfig::default()
        };
        assert!(no_features.validate().is_err());
    }

    #[test]
    fn test_load_options_override_shuffle() {
        let config = DatasetConfig {
            shuffle: true,
            shuffle_seed: Some(3),
            ..DatasetConfig::default()
        };
        let options = config.load_options(false);
        assert!(!options.split.shuffle);
        assert_eq!(options.split.seed, Some(3));
        assert_eq!(options.split.test_size, 0.08);
        assert_eq!(options.target_column, "adjclose");
    }
}
