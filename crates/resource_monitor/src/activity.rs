//! Frame activity counters fed by the capture/render side.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    latency_micros: AtomicU64,
    latency_samples: AtomicU64,
}

/// Lock-free frame and processing-latency counters
///
/// Cloned into whichever task delivers frames; the monitor reads deltas at
/// each frame-rate refresh.
#[derive(Debug, Clone, Default)]
pub struct FrameActivity {
    inner: Arc<Counters>,
}

/// Totals at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityTotals {
    pub frames: u64,
    pub latency_micros: u64,
    pub latency_samples: u64,
}

impl ActivityTotals {
    /// Mean latency (seconds) of the samples recorded since `earlier`
    pub fn mean_latency_since(&self, earlier: &ActivityTotals) -> Option<f64> {
        let samples = self.latency_samples.saturating_sub(earlier.latency_samples);
        if samples == 0 {
            return None;
        }
        let micros = self.latency_micros.saturating_sub(earlier.latency_micros);
        Some(micros as f64 / samples as f64 / 1_000_000.0)
    }
}

impl FrameActivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// One delivered frame
    #[inline]
    pub fn record_frame(&self) {
        self.inner.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Per-frame processing latency (seconds)
    #[inline]
    pub fn record_latency(&self, latency: f64) {
        let micros = (latency.max(0.0) * 1_000_000.0) as u64;
        self.inner.latency_micros.fetch_add(micros, Ordering::Relaxed);
        self.inner.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn totals(&self) -> ActivityTotals {
        ActivityTotals {
            frames: self.inner.frames.load(Ordering::Relaxed),
            latency_micros: self.inner.latency_micros.load(Ordering::Relaxed),
            latency_samples: self.inner.latency_samples.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let activity = FrameActivity::new();
        let other = activity.clone();
        activity.record_frame();
        other.record_frame();
        assert_eq!(activity.totals().frames, 2);
    }

    #[test]
    fn mean_latency_over_delta() {
        let activity = FrameActivity::new();
        activity.record_latency(0.010);
        let before = activity.totals();
        activity.record_latency(0.004);
        activity.record_latency(0.006);

        let mean = activity.totals().mean_latency_since(&before).unwrap();
        assert!((mean - 0.005).abs() < 1e-9);
        assert!(before.mean_latency_since(&before).is_none());
    }
}
