use std::io;

use thiserror::Error;

/// Result type used across the INTeract core crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Canonical error representation for service startup and shared plumbing.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {key}: {message}")]
    InvalidEnvVar { key: &'static str, message: String },
}

impl From<ConfigError> for CoreError {
    fn from(value: ConfigError) -> Self {
        CoreError::Config(value.to_string())
    }
}
