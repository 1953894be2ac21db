//! Resource monitor and quality controller configuration contracts.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ThermalLevel;

/// Resource monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MonitorConfig {
    /// Snapshot cadence (ms)
    #[validate(range(min = 1.0))]
    pub sample_interval_ms: f64,

    /// Frame-rate refresh cadence and measurement window (ms)
    #[validate(range(min = 1.0))]
    pub frame_rate_interval_ms: f64,

    /// Thermal refresh cadence (ms)
    #[validate(range(min = 1.0))]
    pub thermal_interval_ms: f64,

    /// Memory refresh cadence (ms)
    #[validate(range(min = 1.0))]
    pub memory_interval_ms: f64,

    /// Battery refresh cadence (ms)
    #[validate(range(min = 1.0))]
    pub battery_interval_ms: f64,

    /// Snapshots kept in history
    #[validate(range(min = 1))]
    pub history_size: usize,

    /// Frame rate the capture path is expected to achieve (fps)
    #[validate(range(exclusive_min = 0.0))]
    pub target_frame_rate: f64,

    #[validate(nested)]
    pub weights: CompositeWeights,

    #[validate(nested)]
    pub thresholds: MonitorThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000.0,
            frame_rate_interval_ms: 1000.0,
            thermal_interval_ms: 2000.0,
            memory_interval_ms: 5000.0,
            battery_interval_ms: 5000.0,
            history_size: 300,
            target_frame_rate: 30.0,
            weights: CompositeWeights::default(),
            thresholds: MonitorThresholds::default(),
        }
    }
}

/// Composite score factor weights
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CompositeWeights {
    #[validate(range(min = 0.0, max = 1.0))]
    pub frame_rate: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub memory: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub thermal: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub battery: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            frame_rate: 0.4,
            memory: 0.2,
            thermal: 0.2,
            battery: 0.2,
        }
    }
}

/// Warning / critical boundaries per dimension
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MonitorThresholds {
    /// Efficiency below this is a warning
    #[validate(range(min = 0.0, max = 1.0))]
    pub frame_rate_warning: f64,
    /// Efficiency below this is critical
    #[validate(range(min = 0.0, max = 1.0))]
    pub frame_rate_critical: f64,
    /// Memory usage above this is a warning
    #[validate(range(min = 0.0, max = 1.0))]
    pub memory_warning: f64,
    /// Memory usage above this is critical
    #[validate(range(min = 0.0, max = 1.0))]
    pub memory_critical: f64,
    /// Battery below this is a warning
    #[validate(range(min = 0.0, max = 1.0))]
    pub battery_warning: f64,
    /// Battery below this is critical
    #[validate(range(min = 0.0, max = 1.0))]
    pub battery_critical: f64,
    /// Thermal at or above this is a warning
    pub thermal_warning: ThermalLevel,
    /// Thermal at or above this is critical
    pub thermal_critical: ThermalLevel,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            frame_rate_warning: 0.8,
            frame_rate_critical: 0.5,
            memory_warning: 0.75,
            memory_critical: 0.9,
            battery_warning: 0.2,
            battery_critical: 0.1,
            thermal_warning: ThermalLevel::Serious,
            thermal_critical: ThermalLevel::Critical,
        }
    }
}

/// Adaptive quality controller configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ControllerConfig {
    /// Minimum spacing between two non-forced adaptations (ms)
    #[validate(range(min = 0.0))]
    pub cooldown_ms: f64,

    /// Composite score at or below which degradation is considered
    #[validate(range(min = 0.0, max = 1.0))]
    pub adaptation_threshold: f64,

    /// Consecutive critical snapshots that force an evaluation
    #[validate(range(min = 1))]
    pub critical_cascade_count: u32,

    /// Battery at or below this, together with critical thermal, pins the
    /// lowest-preference level
    #[validate(range(min = 0.0, max = 1.0))]
    pub critical_battery_level: f64,

    /// Name of the level matching the user's base configuration; the
    /// highest-preference level when unset
    pub base_level: Option<String>,

    #[validate(nested)]
    pub weights: ScoringWeights,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 10_000.0,
            adaptation_threshold: 0.8,
            critical_cascade_count: 3,
            critical_battery_level: 0.1,
            base_level: None,
            weights: ScoringWeights::default(),
        }
    }
}

impl ControllerConfig {
    pub fn cooldown_secs(&self) -> f64 {
        self.cooldown_ms / 1000.0
    }
}

/// Level scoring weights
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScoringWeights {
    /// Closeness of target score to composite
    #[validate(range(min = 0.0, max = 1.0))]
    pub target: f64,
    /// Resource constraint fit
    #[validate(range(min = 0.0, max = 1.0))]
    pub resource: f64,
    /// Frame-rate and processing-time fit
    #[validate(range(min = 0.0, max = 1.0))]
    pub stability: f64,
    /// Level preference
    #[validate(range(min = 0.0, max = 1.0))]
    pub preference: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            target: 0.4,
            resource: 0.3,
            stability: 0.2,
            preference: 0.1,
        }
    }
}
