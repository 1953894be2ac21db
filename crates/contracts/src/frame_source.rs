//! FrameSource trait - Capture path abstraction
//!
//! Decouples the capture pipeline from concrete camera implementations so
//! real and mock cameras are handled the same way.

use std::sync::Arc;

use crate::{CaptureConfiguration, Frame, StreamId};

/// Frame arrival callback
///
/// Called from the source's own task for every captured frame. Uses `Arc`
/// so the same callback can be shared across contexts.
pub type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync>;

/// Camera frame source
///
/// # Example
///
/// ```ignore
/// let source: Box<dyn FrameSource> = get_frame_source();
/// source.listen(Arc::new(|frame| {
///     println!("{} frame at {:.3}s", frame.stream, frame.timestamp);
/// }));
/// // ...
/// source.stop();
/// ```
pub trait FrameSource: Send + Sync {
    /// Stream this source feeds
    fn stream(&self) -> StreamId;

    /// Source name (logging/metrics)
    fn name(&self) -> &str;

    /// Register the frame callback and start producing
    ///
    /// Repeated calls while listening are ignored.
    fn listen(&self, callback: FrameCallback);

    /// Stop producing frames
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;

    /// Switch resolution / frame rate / features without interrupting capture
    fn apply_configuration(&self, configuration: &CaptureConfiguration);

    /// Configuration currently in effect
    fn configuration(&self) -> CaptureConfiguration;
}
