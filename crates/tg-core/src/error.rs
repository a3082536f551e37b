//! Error types for the tool gateway

use thiserror::Error;

/// Main error type for gateway operations
#[derive(Error, Debug)]
pub enum Error {
    /// Provider credentials are missing or empty
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A request was rejected at the transport boundary
    #[error("Validation error: {0}")]
    Validation(String),

    /// The workflow provider answered with a failure or could not be reached
    #[error("Provider error: {0}")]
    Provider(String),

    /// A stdio frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Error::Provider(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Settings(err.to_string())
    }
}
