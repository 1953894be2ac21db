//! Frame - capture path output
//!
//! One captured image unit from either camera.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Physical capture stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamId {
    /// Front-facing camera
    Front,
    /// Back-facing camera
    Back,
}

impl StreamId {
    /// Both streams, front first
    pub const ALL: [StreamId; 2] = [StreamId::Front, StreamId::Back];

    /// The opposite stream
    pub fn other(self) -> Self {
        match self {
            StreamId::Front => StreamId::Back,
            StreamId::Back => StreamId::Front,
        }
    }

    /// Metric/log label
    pub fn as_str(self) -> &'static str {
        match self {
            StreamId::Front => "front",
            StreamId::Back => "back",
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured frame
///
/// Immutable once produced. Cloning is cheap: the pixel payload is
/// reference-counted and never copied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Source stream
    pub stream: StreamId,

    /// Monotonic capture timestamp (session clock, seconds)
    pub timestamp: f64,

    /// Per-stream sequence number
    pub sequence: u64,

    /// Opaque pixel payload handle
    pub payload: FramePayload,
}

/// Pixel payload handle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FramePayload {
    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Raw pixel bytes (zero-copy)
    pub data: Bytes,
}

impl Frame {
    /// Frame without pixel data, mostly useful for tests and calibration
    pub fn empty(stream: StreamId, timestamp: f64, sequence: u64) -> Self {
        Self {
            stream,
            timestamp,
            sequence,
            payload: FramePayload::default(),
        }
    }

    /// Age of the frame relative to `now` (seconds, never negative)
    #[inline]
    pub fn age(&self, now: f64) -> f64 {
        (now - self.timestamp).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_other_is_symmetric() {
        for stream in StreamId::ALL {
            assert_eq!(stream.other().other(), stream);
            assert_ne!(stream.other(), stream);
        }
    }

    #[test]
    fn frame_age_clamps_future_timestamps() {
        let frame = Frame::empty(StreamId::Front, 1.0, 0);
        assert_eq!(frame.age(1.5), 0.5);
        assert_eq!(frame.age(0.5), 0.0);
    }

    #[test]
    fn stream_serializes_snake_case() {
        let json = serde_json::to_string(&StreamId::Back).unwrap();
        assert_eq!(json, "\"back\"");
    }
}
