//! Ingestion backpressure settings and counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::StreamId;
use serde::Serialize;

/// Merged frame channel settings
///
/// A full channel drops the newest frame; the sync buffers already keep
/// only the most recent frames, so older frames are never worth more.
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    pub channel_capacity: usize,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Per-stream frame counters
#[derive(Debug, Default)]
pub struct CaptureMetrics {
    received: [AtomicU64; 2],
    dropped: [AtomicU64; 2],
    queue_len: AtomicUsize,
}

fn slot(stream: StreamId) -> usize {
    match stream {
        StreamId::Front => 0,
        StreamId::Back => 1,
    }
}

impl CaptureMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, stream: StreamId) {
        self.received[slot(stream)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, stream: StreamId) {
        self.dropped[slot(stream)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureMetricsSnapshot {
        CaptureMetricsSnapshot {
            front_received: self.received[0].load(Ordering::Relaxed),
            back_received: self.received[1].load(Ordering::Relaxed),
            front_dropped: self.dropped[0].load(Ordering::Relaxed),
            back_dropped: self.dropped[1].load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CaptureMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureMetricsSnapshot {
    pub front_received: u64,
    pub back_received: u64,
    pub front_dropped: u64,
    pub back_dropped: u64,
    pub queue_len: usize,
}

impl CaptureMetricsSnapshot {
    pub fn received(&self) -> u64 {
        self.front_received + self.back_received
    }

    pub fn dropped(&self) -> u64 {
        self.front_dropped + self.back_dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_stream() {
        let metrics = CaptureMetrics::new();
        metrics.record_received(StreamId::Front);
        metrics.record_received(StreamId::Front);
        metrics.record_received(StreamId::Back);
        metrics.record_dropped(StreamId::Back);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.front_received, 2);
        assert_eq!(snapshot.back_received, 1);
        assert_eq!(snapshot.back_dropped, 1);
        assert_eq!(snapshot.received(), 3);
        assert_eq!(snapshot.dropped(), 1);
    }
}
