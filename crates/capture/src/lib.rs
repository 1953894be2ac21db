//! # Capture
//!
//! Front and back frame sources merged into one bounded channel.
//!
//! - [`CapturePipeline`]: registers one [`FrameSource`] per stream and
//!   forwards their frames, dropping the newest under backpressure
//! - [`MockCamera`]: tokio-driven source with offset, drift and jitter
//! - [`MockClockDevice`]: shared-clock hardware stand-in for calibration
//!
//! ```ignore
//! let mut pipeline = CapturePipeline::new(BackpressureConfig::default());
//! pipeline.register(Box::new(front))?;
//! pipeline.register(Box::new(back))?;
//! let rx = pipeline.take_receiver().unwrap();
//! pipeline.start()?;
//! while let Ok(frame) = rx.recv().await {
//!     sync.try_push(frame);
//! }
//! ```

mod clock_device;
mod config;
mod error;
mod mock;
mod pipeline;

pub use clock_device::MockClockDevice;
pub use config::{BackpressureConfig, CaptureMetrics, CaptureMetricsSnapshot};
pub use contracts::{Frame, FrameSource, StreamId};
pub use error::{CaptureError, Result};
pub use mock::{reported_timestamp, MockCamera};
pub use pipeline::CapturePipeline;
