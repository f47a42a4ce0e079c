//! Error types for the simulation engine
//!
//! Simulated failures (a stage in `Error`, an active alert, a failed server)
//! are plain data on the snapshots and never show up here.

use thiserror::Error;

/// Main error type for opslab
#[derive(Error, Debug)]
pub enum SimError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Controller stopped: {0}")]
    ControllerStopped(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for SimError {
    fn from(err: anyhow::Error) -> Self {
        SimError::Internal(err.to_string())
    }
}
