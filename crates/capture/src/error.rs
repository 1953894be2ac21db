//! Capture error types

use contracts::StreamId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// A source is already registered for the stream
    #[error("stream {stream} already has a source ({name})")]
    DuplicateStream { stream: StreamId, name: String },

    /// Front or back source missing at start
    #[error("no source registered for stream {stream}")]
    MissingStream { stream: StreamId },

    #[error("capture pipeline is already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, CaptureError>;
