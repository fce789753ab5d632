//! Configuration module for Pricecast.
//!
//! Configuration is read once at startup, from `FORECAST_*` environment
//! variables or from a TOML file, and passed by value afterwards.

mod dataset_config;
mod model_env_config;

pub use dataset_config::DatasetConfig;
pub use model_env_config::model_config_from_env;

pub use crate::domain::ml::model_config::ModelConfig;
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Primary instrument to forecast
    pub ticker: String,
    /// Secondary series loaded alongside the primary one (FX rate)
    pub secondary_ticker: Option<String>,
    /// Number of most recent test examples drawn on the chart
    pub chart_window: usize,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            ticker: "TSLA".to_string(),
            secondary_ticker: Some("GBP=X".to_string()),
            chart_window: 200,
            dataset: DatasetConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl ForecastConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let secondary_ticker = match env::var("FORECAST_SECONDARY_TICKER") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(raw.trim().to_string()),
            Err(_) => defaults.secondary_ticker,
        };

        let config = Self {
            ticker: parse_var("FORECAST_TICKER", defaults.ticker)?,
            secondary_ticker,
            chart_window: parse_var("FORECAST_CHART_WINDOW", defaults.chart_window)?,
            dataset: DatasetConfig::from_env().context("Failed to load dataset config")?,
            model: model_config_from_env().context("Failed to load model config")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ticker.trim().is_empty() {
            anyhow::bail!("ticker must not be empty");
        }
        self.dataset
            .validate()
            .map_err(|e| anyhow!("Invalid dataset config: {}", e))?;
        self.model
            .validate()
            .map_err(|e| anyhow!("Invalid model config: {}", e))?;
        Ok(())
    }

    /// Identifier of a trained model, unique per day and parameter set.
    pub fn model_name(&self, date: NaiveDate) -> String {
        format!(
            "{}_{}-{}-{}-LSTM-seq-{}-step-{}-layers-1-units-{}",
            date.format("%Y-%m-%d"),
            self.ticker,
            self.model.loss,
            self.model.optimizer,
            self.dataset.n_steps,
            self.dataset.lookup_step,
            self.model.units
        )
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Failed to parse {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn parse_optional<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("Failed to parse {}: {}", key, e)),
        Err(_) => Ok(None),
    }
}

fn parse_list(key: &str, default: Vec<String>) -> Vec<String> {
    env::var(key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::model_config::{LossKind, OptimizerKind};

    #[test]
    fn test_defaults_match_reference_parameters() {
        let config = ForecastConfig::default();
        assert_eq!(config.ticker, "TSLA");
        assert_eq!(config.secondary_ticker.as_deref(), Some("GBP=X"));
        assert_eq!(config.chart_window, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_name() {
        let config = ForecastConfig::default();
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            config.model_name(date),
            "2024-03-09_TSLA-mae-rmsprop-LSTM-seq-50-step-1-layers-1-units-50"
        );
    }

    #[test]
    fn test_from_toml_overrides_nested_fields() {
        let raw = r#"
            ticker = "AAPL"
            secondary_ticker = "EURUSD=X"

            [dataset]
            n_steps = 20
            shuffle = true
            shuffle_seed = 11

            [model]
            units = 16
            loss = "huber"
            optimizer = "adam"
            epochs = 5
        "#;
        let config = ForecastConfig::from_toml_str(raw).unwrap();

        assert_eq!(config.ticker, "AAPL");
        assert_eq!(config.dataset.n_steps, 20);
        assert_eq!(config.dataset.lookup_step, 1);
        assert_eq!(config.dataset.shuffle_seed, Some(11));
        assert_eq!(config.model.units, 16);
        assert_eq!(config.model.loss, LossKind::Huber);
        assert_eq!(config.model.optimizer, OptimizerKind::Adam);
        assert_eq!(config.model.batch_size, 64);
        assert_eq!(config.chart_window, 200);
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        let raw = r#"
            [dataset]
            test_size = 1.5
        "#;
        let err = ForecastConfig::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("test_size"));
    }

    #[test]
    fn test_from_toml_rejects_non_positive_gradient_clip() {
        let raw = r#"
            [model]
            gradient_clip = 0.0
        "#;
        let err = ForecastConfig::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("gradient_clip"));
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = ForecastConfig::from_toml_file("/nonexistent/pricecast.toml");
        assert!(result.is_err());
    }
}
