//! Error types for the result courier.

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias using the courier error type.
pub type Result<T> = std::result::Result<T, CourierError>;

/// Main error type for the result courier.
#[derive(Error, Debug)]
pub enum CourierError {
    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local file system error (identifier file, artifacts)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or a request failed outright
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Chat transport error (rate limiting, API rejection, network)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Conversion of a fetched document into an artifact failed
    #[error("Render failed for {identifier}: {reason}")]
    Render { identifier: String, reason: String },

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for CourierError {
    fn from(e: config::ConfigError) -> Self {
        CourierError::Config(e.to_string())
    }
}
