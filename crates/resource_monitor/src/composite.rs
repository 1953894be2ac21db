//! Composite health score and per-dimension classification.

use contracts::{
    CompositeWeights, MonitorThresholds, PerformanceStatus, ResourceDimension, ThermalLevel,
};

/// Normalized headroom per dimension (1 = fully healthy, 0 = exhausted)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Headroom {
    pub frame_rate: f64,
    pub memory: f64,
    pub thermal: f64,
    pub battery: f64,
}

impl Headroom {
    pub fn from_readings(
        frame_rate_efficiency: f64,
        memory_usage: f64,
        thermal: ThermalLevel,
        battery_level: f64,
    ) -> Self {
        Self {
            frame_rate: frame_rate_efficiency.clamp(0.0, 1.0),
            memory: (1.0 - memory_usage).clamp(0.0, 1.0),
            thermal: thermal.headroom(),
            battery: battery_level.clamp(0.0, 1.0),
        }
    }
}

/// Product of `(1 - w) + w * headroom` over all dimensions
///
/// A dimension with weight `w` can pull the score down by at most `w`.
pub fn composite_score(headroom: &Headroom, weights: &CompositeWeights) -> f64 {
    let factor = |weight: f64, value: f64| (1.0 - weight) + weight * value;
    let score = factor(weights.frame_rate, headroom.frame_rate)
        * factor(weights.memory, headroom.memory)
        * factor(weights.thermal, headroom.thermal)
        * factor(weights.battery, headroom.battery);
    score.clamp(0.0, 1.0)
}

/// Status of one dimension and the reading it was derived from
pub fn classify(
    dimension: ResourceDimension,
    frame_rate_efficiency: f64,
    memory_usage: f64,
    thermal: ThermalLevel,
    battery_level: f64,
    thresholds: &MonitorThresholds,
) -> (PerformanceStatus, f64) {
    use PerformanceStatus::{Critical, Optimal, Warning};

    match dimension {
        ResourceDimension::FrameRate => {
            let status = if frame_rate_efficiency < thresholds.frame_rate_critical {
                Critical
            } else if frame_rate_efficiency < thresholds.frame_rate_warning {
                Warning
            } else {
                Optimal
            };
            (status, frame_rate_efficiency)
        }
        ResourceDimension::Memory => {
            let status = if memory_usage > thresholds.memory_critical {
                Critical
            } else if memory_usage > thresholds.memory_warning {
                Warning
            } else {
                Optimal
            };
            (status, memory_usage)
        }
        ResourceDimension::Thermal => {
            let status = if thermal >= thresholds.thermal_critical {
                Critical
            } else if thermal >= thresholds.thermal_warning {
                Warning
            } else {
                Optimal
            };
            (status, thermal.headroom())
        }
        ResourceDimension::Battery => {
            let status = if battery_level < thresholds.battery_critical {
                Critical
            } else if battery_level < thresholds.battery_warning {
                Warning
            } else {
                Optimal
            };
            (status, battery_level)
        }
    }
}
