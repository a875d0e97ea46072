//! Error types for the berth platform

use thiserror::Error;

/// Main error type shared by the API server, builder and proxy
#[derive(Error, Debug)]
pub enum BerthError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Bus error: {0}")]
    BusError(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for BerthError {
    fn from(err: anyhow::Error) -> Self {
        BerthError::Internal(err.to_string())
    }
}
