//! QualityLevel / AdaptationDecision - Quality controller contracts
//!
//! Operating points, their constraint predicates and the decisions emitted
//! when the controller switches between them.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{PerformanceSnapshot, ThermalLevel};

/// Capture resolution preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// 1280x720
    Hd720,
    /// 1920x1080
    Hd1080,
    /// 3840x2160
    Uhd4k,
}

impl Resolution {
    pub fn width(self) -> u32 {
        match self {
            Resolution::Hd720 => 1280,
            Resolution::Hd1080 => 1920,
            Resolution::Uhd4k => 3840,
        }
    }

    pub fn height(self) -> u32 {
        match self {
            Resolution::Hd720 => 720,
            Resolution::Hd1080 => 1080,
            Resolution::Uhd4k => 2160,
        }
    }

    /// Next preset down; `Hd720` is the floor
    pub fn lower(self) -> Self {
        match self {
            Resolution::Uhd4k => Resolution::Hd1080,
            Resolution::Hd1080 | Resolution::Hd720 => Resolution::Hd720,
        }
    }

    pub fn pixels(self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Hd720 => f.write_str("720p"),
            Resolution::Hd1080 => f.write_str("1080p"),
            Resolution::Uhd4k => f.write_str("4k"),
        }
    }
}

/// Optional processing features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSet {
    pub hdr: bool,
    pub stabilization: bool,
    pub low_light_boost: bool,
}

/// Configuration pushed to capture, sync and render components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CaptureConfiguration {
    pub resolution: Resolution,

    /// Frames per second per stream
    #[validate(range(min = 1, max = 240))]
    pub frame_rate: u32,

    #[serde(default)]
    pub features: FeatureSet,
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            resolution: Resolution::Hd1080,
            frame_rate: 30,
            features: FeatureSet {
                hdr: false,
                stabilization: true,
                low_light_boost: false,
            },
        }
    }
}

impl CaptureConfiguration {
    /// Frame period (seconds)
    pub fn frame_interval_secs(&self) -> f64 {
        1.0 / f64::from(self.frame_rate.max(1))
    }

    /// Rough relative cost, used to rank configurations
    pub fn load_factor(&self) -> f64 {
        self.resolution.pixels() as f64 * f64::from(self.frame_rate)
    }
}

impl fmt::Display for CaptureConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}fps", self.resolution, self.frame_rate)?;
        if self.features.hdr {
            f.write_str(" +hdr")?;
        }
        if self.features.stabilization {
            f.write_str(" +stab")?;
        }
        if self.features.low_light_boost {
            f.write_str(" +lowlight")?;
        }
        Ok(())
    }
}

/// Resource predicates a level needs to hold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct QualityConstraints {
    /// Highest tolerated memory usage ratio
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_memory_usage: f64,

    /// Hottest tolerated thermal state
    pub max_thermal: ThermalLevel,

    /// Lowest tolerated battery level
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_battery_level: f64,

    /// Lowest tolerated frame-rate efficiency
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_frame_rate_efficiency: f64,

    /// Longest tolerated per-frame processing time (ms)
    #[validate(range(exclusive_min = 0.0))]
    pub max_processing_time_ms: f64,
}

/// Which constraints a snapshot breaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstraintViolations {
    pub memory: bool,
    pub thermal: bool,
    pub battery: bool,
    pub frame_rate: bool,
    pub processing_time: bool,
}

impl ConstraintViolations {
    pub fn none(&self) -> bool {
        !(self.memory || self.thermal || self.battery || self.frame_rate || self.processing_time)
    }

    /// Count of violated resource constraints (memory, thermal, battery)
    pub fn resource_count(&self) -> usize {
        [self.memory, self.thermal, self.battery]
            .iter()
            .filter(|violated| **violated)
            .count()
    }
}

impl QualityConstraints {
    /// Constraints that hold under any reading, used by the floor level
    pub fn unconstrained() -> Self {
        Self {
            max_memory_usage: 1.0,
            max_thermal: ThermalLevel::Critical,
            min_battery_level: 0.0,
            min_frame_rate_efficiency: 0.0,
            max_processing_time_ms: f64::MAX,
        }
    }

    pub fn check(&self, snapshot: &PerformanceSnapshot) -> ConstraintViolations {
        ConstraintViolations {
            memory: snapshot.memory_usage > self.max_memory_usage,
            thermal: snapshot.thermal > self.max_thermal,
            battery: snapshot.battery_level < self.min_battery_level,
            frame_rate: snapshot.frame_rate_efficiency < self.min_frame_rate_efficiency,
            processing_time: snapshot.processing_latency * 1000.0 > self.max_processing_time_ms,
        }
    }

    /// Whether these constraints admit a battery-critical, thermal-critical,
    /// memory-exhausted reading
    pub fn admits_no_headroom(&self) -> bool {
        self.max_thermal == ThermalLevel::Critical
            && self.min_battery_level <= 0.0
            && self.max_memory_usage >= 1.0
    }
}

/// Named operating point in the quality catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QualityLevel {
    /// Unique level name
    #[validate(length(min = 1))]
    pub name: String,

    pub resolution: Resolution,

    #[validate(range(min = 1, max = 240))]
    pub frame_rate: u32,

    #[serde(default)]
    pub features: FeatureSet,

    #[validate(nested)]
    pub constraints: QualityConstraints,

    /// Relative preference (0-1); higher levels are preferred
    #[validate(range(min = 0.0, max = 1.0))]
    pub preference_weight: f64,

    /// Composite score this level is tuned for (0-1)
    #[validate(range(min = 0.0, max = 1.0))]
    pub target_score: f64,
}

impl QualityLevel {
    /// Capture configuration implied by this level alone
    pub fn configuration(&self) -> CaptureConfiguration {
        CaptureConfiguration {
            resolution: self.resolution,
            frame_rate: self.frame_rate,
            features: self.features,
        }
    }
}

/// Adaptation strategy applied to the configuration draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Thermal,
    Battery,
    Memory,
    FrameRate,
}

impl StrategyKind {
    /// Fixed application order
    pub const CHAIN: [StrategyKind; 4] = [
        StrategyKind::Thermal,
        StrategyKind::Battery,
        StrategyKind::Memory,
        StrategyKind::FrameRate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Thermal => "thermal",
            StrategyKind::Battery => "battery",
            StrategyKind::Memory => "memory",
            StrategyKind::FrameRate => "frame_rate",
        }
    }
}

/// A change one strategy made to the draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAdjustment {
    pub strategy: StrategyKind,
    pub note: String,
}

/// Why an adaptation happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationReason {
    /// Composite score fell to or below the threshold
    Degraded,
    /// Composite score recovered above the threshold while below base
    Recovered,
    /// Caller-requested evaluation
    Forced,
    /// Consecutive critical snapshots
    CriticalCascade,
}

impl AdaptationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AdaptationReason::Degraded => "degraded",
            AdaptationReason::Recovered => "recovered",
            AdaptationReason::Forced => "forced",
            AdaptationReason::CriticalCascade => "critical_cascade",
        }
    }
}

impl fmt::Display for AdaptationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controller output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationDecision {
    /// Chosen operating point
    pub level: QualityLevel,

    /// Configuration after the strategy chain ran
    pub configuration: CaptureConfiguration,

    /// Snapshot that triggered the decision
    pub snapshot: PerformanceSnapshot,

    /// Session time of the decision (seconds)
    pub timestamp: f64,

    /// Bypassed cooldown
    pub forced: bool,

    pub reason: AdaptationReason,

    /// Strategy changes in application order
    pub adjustments: Vec<StrategyAdjustment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PerformanceStatus;

    fn stressed_snapshot() -> PerformanceSnapshot {
        PerformanceSnapshot {
            timestamp: 0.0,
            frame_rate_efficiency: 0.0,
            achieved_frame_rate: 0.0,
            target_frame_rate: 30.0,
            memory_usage: 1.0,
            thermal: ThermalLevel::Critical,
            battery_level: 0.0,
            processing_latency: 1.0,
            composite_score: 0.0,
            status: PerformanceStatus::Critical,
        }
    }

    #[test]
    fn unconstrained_admits_everything() {
        let constraints = QualityConstraints::unconstrained();
        assert!(constraints.admits_no_headroom());
        assert!(constraints.check(&stressed_snapshot()).none());
    }

    #[test]
    fn check_flags_each_dimension() {
        let constraints = QualityConstraints {
            max_memory_usage: 0.5,
            max_thermal: ThermalLevel::Fair,
            min_battery_level: 0.3,
            min_frame_rate_efficiency: 0.9,
            max_processing_time_ms: 20.0,
        };
        let violations = constraints.check(&stressed_snapshot());
        assert!(violations.memory && violations.thermal && violations.battery);
        assert!(violations.frame_rate && violations.processing_time);
        assert_eq!(violations.resource_count(), 3);
    }

    #[test]
    fn resolution_lower_floors_at_720p() {
        assert_eq!(Resolution::Uhd4k.lower(), Resolution::Hd1080);
        assert_eq!(Resolution::Hd720.lower(), Resolution::Hd720);
    }

    #[test]
    fn configuration_display() {
        let config = CaptureConfiguration {
            resolution: Resolution::Hd720,
            frame_rate: 24,
            features: FeatureSet::default(),
        };
        assert_eq!(config.to_string(), "720p@24fps");
    }
}
