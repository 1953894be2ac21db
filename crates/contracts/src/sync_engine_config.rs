//! Sync coordinator and clock configuration contracts shared across crates.
//!
//! All durations are milliseconds on the wire; the `*_secs` helpers convert
//! to the session clock unit.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Upper bound accepted for the clock target latency (milliseconds)
pub const MAX_TARGET_LATENCY_MS: f64 = 100.0;

/// Frame sync coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SyncCoordinatorConfig {
    /// Maximum `|front.ts - back.ts|` for a pair, also the tick period (ms)
    #[validate(range(exclusive_min = 0.0, max = 1000.0))]
    pub sync_window_ms: f64,

    /// Frames older than this are evicted unpaired (ms)
    #[validate(range(exclusive_min = 0.0))]
    pub max_frame_age_ms: f64,

    /// Per-stream buffer capacity (frames)
    #[validate(range(min = 1))]
    pub buffer_capacity: usize,

    /// Output pair buffer capacity
    #[validate(range(min = 1))]
    pub output_capacity: usize,

    /// Drift history length (pairs)
    #[validate(range(min = 1))]
    pub drift_history: usize,

    /// Weight of the frame-age penalty relative to the sync window
    #[validate(range(min = 0.0, max = 10.0))]
    pub age_penalty_weight: f64,

    /// Pairs emitted per tick at most
    #[validate(range(min = 1))]
    pub max_pairs_per_tick: usize,

    /// Publish a statistics event every N ticks
    #[validate(range(min = 1))]
    pub statistics_interval_ticks: u32,

    /// Frame ingress channel capacity
    #[validate(range(min = 1))]
    pub ingress_capacity: usize,

    /// Quality classification bounds
    #[validate(nested)]
    pub quality_thresholds: SyncQualityThresholds,
}

impl Default for SyncCoordinatorConfig {
    fn default() -> Self {
        Self {
            sync_window_ms: 16.0,
            max_frame_age_ms: 100.0,
            buffer_capacity: 10,
            output_capacity: 30,
            drift_history: 100,
            age_penalty_weight: 0.25,
            max_pairs_per_tick: 1,
            statistics_interval_ticks: 60,
            ingress_capacity: 64,
            quality_thresholds: SyncQualityThresholds::default(),
        }
    }
}

impl SyncCoordinatorConfig {
    pub fn sync_window_secs(&self) -> f64 {
        self.sync_window_ms / 1000.0
    }

    pub fn max_frame_age_secs(&self) -> f64 {
        self.max_frame_age_ms / 1000.0
    }
}

/// Pair quality thresholds (milliseconds, exclusive upper bounds)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SyncQualityThresholds {
    #[validate(range(exclusive_min = 0.0))]
    pub excellent_ms: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub good_ms: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub fair_ms: f64,
}

impl Default for SyncQualityThresholds {
    fn default() -> Self {
        Self {
            excellent_ms: 5.0,
            good_ms: 10.0,
            fair_ms: 16.0,
        }
    }
}

/// Clock synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClockConfig {
    /// Requested cross-path latency (ms), must lie in (0, 100]
    #[validate(range(exclusive_min = 0.0, max = 100.0))]
    pub target_latency_ms: f64,

    /// Test pairs captured per calibration
    #[validate(range(min = 1, max = 1000))]
    pub calibration_samples: u32,

    /// Try the hardware shared clock before falling back to software
    pub prefer_hardware: bool,

    /// Quality reported in software mode (0-1)
    #[validate(range(min = 0.0, max = 1.0))]
    pub software_quality: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            target_latency_ms: 10.0,
            calibration_samples: 10,
            prefer_hardware: true,
            software_quality: 0.5,
        }
    }
}

impl ClockConfig {
    pub fn target_latency_secs(&self) -> f64 {
        self.target_latency_ms / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SyncCoordinatorConfig::default().validate().is_ok());
        assert!(ClockConfig::default().validate().is_ok());
    }

    #[test]
    fn target_latency_bounds() {
        let mut config = ClockConfig {
            target_latency_ms: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.target_latency_ms = MAX_TARGET_LATENCY_MS;
        assert!(config.validate().is_ok());

        config.target_latency_ms = 150.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = SyncCoordinatorConfig {
            buffer_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unit_helpers_convert_to_seconds() {
        let config = SyncCoordinatorConfig::default();
        assert!((config.sync_window_secs() - 0.016).abs() < 1e-12);
        assert!((config.max_frame_age_secs() - 0.1).abs() < 1e-12);
    }
}
