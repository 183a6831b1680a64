//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised outside the load pipeline itself (configuration, files, reports)
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}. Check your environment variables or command-line flags.")]
    Config(String),

    #[error("Invalid value '{value}' for {key}")]
    InvalidSetting { key: String, value: String },
}

impl CommonError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an error for an unparseable setting
    pub fn invalid_setting(key: &str, value: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.to_string(),
            value: value.into(),
        }
    }
}
