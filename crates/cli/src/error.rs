//! Error types for CLI operations.

use capture::CaptureError;
use contracts::ContractError;
use dispatcher::DispatcherError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be parsed or failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[source] ContractError),

    /// A pipeline component could not be built or started
    #[error("Pipeline setup failed: {0}")]
    Setup(#[from] ContractError),

    /// Capture sources could not be registered or started
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// Sink construction failed
    #[error("Dispatcher failed: {0}")]
    Dispatcher(#[from] DispatcherError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
