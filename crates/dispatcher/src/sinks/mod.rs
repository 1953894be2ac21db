//! Pair sink implementations

mod file;
mod log;
mod network;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::network::{NetworkSink, NetworkSinkConfig};
