//! SynchronizedPair - Sync coordinator output
//!
//! Time-aligned front/back frame pairs plus the diagnostics published
//! alongside them.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Frame, SyncQualityThresholds};

/// Synchronization quality classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl SyncQuality {
    /// Classify an uncompensated time difference (seconds)
    pub fn classify(time_difference: f64, thresholds: &SyncQualityThresholds) -> Self {
        let diff_ms = time_difference.abs() * 1000.0;
        if diff_ms < thresholds.excellent_ms {
            SyncQuality::Excellent
        } else if diff_ms < thresholds.good_ms {
            SyncQuality::Good
        } else if diff_ms < thresholds.fair_ms {
            SyncQuality::Fair
        } else {
            SyncQuality::Poor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncQuality::Excellent => "excellent",
            SyncQuality::Good => "good",
            SyncQuality::Fair => "fair",
            SyncQuality::Poor => "poor",
        }
    }
}

impl fmt::Display for SyncQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronized frame pair
///
/// One front and one back frame judged to represent the same capture instant.
/// Consumed exactly once by the renderer side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronizedPair {
    /// Pair sequence number (monotonically increasing per session)
    pub pair_id: u64,

    /// Front camera frame
    pub front: Frame,

    /// Back camera frame
    pub back: Frame,

    /// Uncompensated `|front.ts - back.ts|` (seconds)
    pub time_difference: f64,

    /// Drift-compensated difference used for matching (seconds)
    pub compensated_difference: f64,

    /// Classification derived from `time_difference`
    pub quality: SyncQuality,

    /// Midpoint of the two capture timestamps (seconds)
    pub presentation_timestamp: f64,

    /// Session time at which the pair was built (seconds)
    pub created_at: f64,
}

/// Rolling drift estimate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftState {
    /// Recent signed `front - back` differences (seconds), oldest first
    pub history: VecDeque<f64>,

    /// Arithmetic mean of `history` (seconds)
    pub average_drift: f64,

    /// Session time of the last recorded sample
    pub last_update: Option<f64>,
}

/// Per-quality pair counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityHistogram {
    pub excellent: u64,
    pub good: u64,
    pub fair: u64,
    pub poor: u64,
}

impl QualityHistogram {
    pub fn record(&mut self, quality: SyncQuality) {
        match quality {
            SyncQuality::Excellent => self.excellent += 1,
            SyncQuality::Good => self.good += 1,
            SyncQuality::Fair => self.fair += 1,
            SyncQuality::Poor => self.poor += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.excellent + self.good + self.fair + self.poor
    }
}

/// Running synchronization statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatistics {
    /// Frames accepted from the front stream
    pub front_frames: u64,

    /// Frames accepted from the back stream
    pub back_frames: u64,

    /// Pairs emitted
    pub paired: u64,

    /// Mean uncompensated time difference of emitted pairs (seconds)
    pub average_time_difference: f64,

    /// `paired / max(front_frames, back_frames)`
    pub sync_rate: f64,

    /// Front frames evicted on buffer overflow
    pub front_dropped: u64,

    /// Back frames evicted on buffer overflow
    pub back_dropped: u64,

    /// Frames aged out before pairing (both streams)
    pub expired: u64,

    /// Frames discarded because a newer frame of the same stream was paired
    pub superseded: u64,

    /// Frames rejected for arriving at or before their stream's last paired frame
    pub late: u64,

    /// Pairs dropped from the output buffer before being consumed
    pub output_dropped: u64,

    /// Pairs per quality class
    pub quality: QualityHistogram,
}

/// Clock synchronization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Capture paths share a hardware time base
    Hardware,
    /// Timestamp-only alignment
    Software,
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockMode::Hardware => f.write_str("hardware"),
            ClockMode::Software => f.write_str("software"),
        }
    }
}

/// Clock synchronizer status report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockReport {
    /// Active mode
    pub mode: ClockMode,

    /// Requested cross-path latency (seconds)
    pub target_latency: f64,

    /// Mean observed cross-path delay from the last calibration (seconds)
    pub measured_latency: Option<f64>,

    /// Wall time spent in the last calibration (milliseconds)
    pub calibration_duration_ms: f64,

    /// Session time of the last successful calibration
    pub calibrated_at: Option<f64>,

    /// 0-1 confidence in the shared time base
    pub quality: f64,
}

/// Coordinator notification stream
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Coordinator entered Running
    Started { clock: ClockReport },

    /// Periodic statistics update
    Statistics(SyncStatistics),

    /// Calibration finished
    ClockCalibrated(ClockReport),

    /// Hardware clock unusable, running timestamp-only
    ClockDegraded { reason: String, clock: ClockReport },

    /// Hardware-level failure surfaced to the caller
    Error { message: String },

    /// Coordinator entered Stopped
    Stopped { statistics: SyncStatistics },
}
