//! Per-sink counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    written: AtomicU64,
    failed: AtomicU64,
    /// Pairs rejected because the sink queue was full
    dropped: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SinkMetricsSnapshot {
        SinkMetricsSnapshot {
            queue_len: self.queue_len(),
            written: self.written(),
            failed: self.failed(),
            dropped: self.dropped(),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkMetricsSnapshot {
    pub queue_len: usize,
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
}
