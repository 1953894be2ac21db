//! PerformanceSnapshot - Resource monitor output
//!
//! Point-in-time resource readings and the events derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device thermal state, ordered from coolest to hottest
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ThermalLevel {
    #[default]
    Nominal,
    Fair,
    Serious,
    Critical,
}

impl ThermalLevel {
    /// Normalized headroom: 1.0 at nominal, 0.0 at critical
    pub fn headroom(self) -> f64 {
        match self {
            ThermalLevel::Nominal => 1.0,
            ThermalLevel::Fair => 2.0 / 3.0,
            ThermalLevel::Serious => 1.0 / 3.0,
            ThermalLevel::Critical => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThermalLevel::Nominal => "nominal",
            ThermalLevel::Fair => "fair",
            ThermalLevel::Serious => "serious",
            ThermalLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for ThermalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall or per-dimension health
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceStatus {
    #[default]
    Optimal,
    Warning,
    Critical,
}

impl PerformanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PerformanceStatus::Optimal => "optimal",
            PerformanceStatus::Warning => "warning",
            PerformanceStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for PerformanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monitored resource dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceDimension {
    FrameRate,
    Memory,
    Thermal,
    Battery,
}

impl ResourceDimension {
    pub const ALL: [ResourceDimension; 4] = [
        ResourceDimension::FrameRate,
        ResourceDimension::Memory,
        ResourceDimension::Thermal,
        ResourceDimension::Battery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceDimension::FrameRate => "frame_rate",
            ResourceDimension::Memory => "memory",
            ResourceDimension::Thermal => "thermal",
            ResourceDimension::Battery => "battery",
        }
    }
}

/// Raw readings supplied by a [`ResourceProbe`](crate::ResourceProbe)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceReadings {
    /// Used / total memory (0-1)
    pub memory_usage: f64,

    /// Thermal state
    pub thermal: ThermalLevel,

    /// Remaining battery (0-1)
    pub battery_level: f64,
}

impl Default for ResourceReadings {
    fn default() -> Self {
        Self {
            memory_usage: 0.0,
            thermal: ThermalLevel::Nominal,
            battery_level: 1.0,
        }
    }
}

/// Point-in-time performance reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// Session time of the sample (seconds)
    pub timestamp: f64,

    /// Achieved / target frame rate, clamped to 0-1
    pub frame_rate_efficiency: f64,

    /// Achieved frame rate (fps)
    pub achieved_frame_rate: f64,

    /// Target frame rate (fps)
    pub target_frame_rate: f64,

    /// Memory usage ratio (0-1)
    pub memory_usage: f64,

    /// Thermal state
    pub thermal: ThermalLevel,

    /// Battery level (0-1)
    pub battery_level: f64,

    /// Mean per-frame processing latency (seconds)
    pub processing_latency: f64,

    /// Weighted composite health score (0-1)
    pub composite_score: f64,

    /// Worst per-dimension status
    pub status: PerformanceStatus,
}

impl PerformanceSnapshot {
    /// A fully healthy reading, handy as a starting point for tests and demos
    pub fn healthy(timestamp: f64, target_frame_rate: f64) -> Self {
        Self {
            timestamp,
            frame_rate_efficiency: 1.0,
            achieved_frame_rate: target_frame_rate,
            target_frame_rate,
            memory_usage: 0.3,
            thermal: ThermalLevel::Nominal,
            battery_level: 1.0,
            processing_latency: 0.005,
            composite_score: 1.0,
            status: PerformanceStatus::Optimal,
        }
    }
}

/// Threshold crossing for a single dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdEvent {
    /// Dimension that changed state
    pub dimension: ResourceDimension,

    /// Status before this sample
    pub previous: PerformanceStatus,

    /// Status after this sample
    pub current: PerformanceStatus,

    /// Reading that caused the crossing
    pub value: f64,

    /// Session time of the sample
    pub timestamp: f64,
}

/// Resource monitor notification stream
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// New snapshot appended to history
    Snapshot(PerformanceSnapshot),

    /// A dimension crossed a warning/critical boundary
    Threshold(ThresholdEvent),

    /// Overall status changed
    StatusChanged {
        previous: PerformanceStatus,
        current: PerformanceStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thermal_ordering_matches_severity() {
        assert!(ThermalLevel::Nominal < ThermalLevel::Fair);
        assert!(ThermalLevel::Serious < ThermalLevel::Critical);
        assert_eq!(ThermalLevel::Critical.headroom(), 0.0);
        assert_eq!(ThermalLevel::Nominal.headroom(), 1.0);
    }

    #[test]
    fn status_ordering_picks_worst() {
        let worst = [
            PerformanceStatus::Warning,
            PerformanceStatus::Critical,
            PerformanceStatus::Optimal,
        ]
        .into_iter()
        .max();
        assert_eq!(worst, Some(PerformanceStatus::Critical));
    }
}
