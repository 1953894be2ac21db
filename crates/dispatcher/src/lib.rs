//! # Dispatcher
//!
//! Renderer-side fan-out of synchronized pairs.
//!
//! - Consumes `SynchronizedPair`s from one channel
//! - Hands each pair to every configured sink
//! - Each sink has its own queue and worker, so a slow sink only drops
//!   its own pairs
//!
//! The file sink is a debug journal of pair metadata; media export is out
//! of scope.

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod record;
pub mod sinks;

pub use contracts::{PairSink, SynchronizedPair};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{SinkMetrics, SinkMetricsSnapshot};
pub use record::PairRecord;
pub use sinks::{FileSink, FileSinkConfig, LogSink, NetworkSink, NetworkSinkConfig};
