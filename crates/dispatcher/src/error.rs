//! Dispatcher error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink could not be built from its configuration
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Two sinks share a name
    #[error("duplicate sink name '{name}'")]
    DuplicateSink { name: String },

    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
