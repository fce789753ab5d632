use thiserror::Error;

/// Errors raised while shaping a series into a supervised dataset
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DatasetError {
    #[error("'{column}' does not exist in the series")]
    MissingColumn { column: String },

    #[error("Invalid series source: {reason}")]
    InvalidInput { reason: String },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("test_size must be in (0, 1), got {test_size}")]
    InvalidTestSize { test_size: f64 },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Insufficient data: {available} usable rows, need at least {required}")]
    InsufficientData { available: usize, required: usize },
}

/// Errors related to the market-data provider
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request for {symbol} failed: {source}")]
    Http {
        symbol: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Provider returned status {status} for {symbol}")]
    Status { symbol: String, status: u16 },

    #[error("Unknown symbol: {symbol}")]
    UnknownSymbol { symbol: String },

    #[error("Malformed response for {symbol}: {reason}")]
    MalformedResponse { symbol: String, reason: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Everything the dataset loader can fail with
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Errors related to fitting and running sequence regressors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model {model} has not been fitted")]
    NotFitted { model: String },

    #[error("Cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("Input shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid model configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Backend failure: {reason}")]
    Backend { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_formatting() {
        let error = DatasetError::MissingColumn {
            column: "adjclose".to_string(),
        };

        assert_eq!(error.to_string(), "'adjclose' does not exist in the series");
    }

    #[test]
    fn test_insufficient_data_formatting() {
        let error = DatasetError::InsufficientData {
            available: 5,
            required: 11,
        };

        let msg = error.to_string();
        assert!(msg.contains('5'));
        assert!(msg.contains("11"));
    }

    #[test]
    fn test_load_error_is_transparent() {
        let error: LoadError = DatasetError::InvalidTestSize { test_size: 1.5 }.into();
        assert_eq!(error.to_string(), "test_size must be in (0, 1), got 1.5");

        let error: LoadError = FetchError::UnknownSymbol {
            symbol: "NOPE".to_string(),
        }
        .into();
        assert!(matches!(error, LoadError::Fetch(FetchError::UnknownSymbol { .. })));
    }
}
