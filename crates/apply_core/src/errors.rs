//! Error types for the apply kernel

use thiserror::Error;

/// Value returned by the raw entry point when the input shape is malformed.
pub const PREDICTION_ERROR_SENTINEL: f32 = -1.0;

/// Errors that can occur while building or running a predictor
#[derive(Error, Debug)]
pub enum ApplyError {
    /// Sample length does not match the model's fixed feature count
    #[error("Feature count mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Flat batch length is not a whole number of rows
    #[error("Batch of {len} values is not a multiple of row width {width}")]
    BatchShapeMismatch { width: usize, len: usize },

    /// Model artifact violates a structural invariant
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Configuration could not be parsed or applied
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown execution strategy name
    #[error("Unsupported strategy: {0}")]
    UnsupportedStrategy(String),

    /// Logging subscriber could not be installed
    #[error("Logging initialization failed: {0}")]
    Logging(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ApplyError {
    fn from(err: toml::de::Error) -> Self {
        ApplyError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for ApplyError {
    fn from(err: toml::ser::Error) -> Self {
        ApplyError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ApplyError {
    fn from(err: serde_json::Error) -> Self {
        ApplyError::Serialization(err.to_string())
    }
}

/// Result type for apply-kernel operations
pub type Result<T> = std::result::Result<T, ApplyError>;
