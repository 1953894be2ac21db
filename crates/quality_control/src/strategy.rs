//! Adaptation strategy chain.
//!
//! Each strategy clamps the configuration draft for one resource. They run
//! in [`StrategyKind::CHAIN`] order and only ever lower quality.

use contracts::{
    CaptureConfiguration, PerformanceSnapshot, StrategyAdjustment, StrategyKind, ThermalLevel,
};

/// Battery level below which stabilization and HDR are dropped
const BATTERY_LOW: f64 = 0.2;
/// Battery level below which the frame rate is capped
const BATTERY_CRITICAL: f64 = 0.1;
const BATTERY_FRAME_RATE_CAP: u32 = 24;
/// Memory usage above which resolution is lowered
const MEMORY_HIGH: f64 = 0.9;
/// Frame-rate efficiency below which the rate follows what is achieved
const FRAME_RATE_STRAINED: f64 = 0.5;
const FRAME_RATE_FLOOR: u32 = 15;

/// Derive the starting draft: `level` capped by the user's base configuration
pub fn derive_from_base(
    base: &CaptureConfiguration,
    level: &CaptureConfiguration,
) -> CaptureConfiguration {
    CaptureConfiguration {
        resolution: base.resolution.min(level.resolution),
        frame_rate: base.frame_rate.min(level.frame_rate),
        features: contracts::FeatureSet {
            hdr: base.features.hdr && level.features.hdr,
            stabilization: base.features.stabilization && level.features.stabilization,
            low_light_boost: base.features.low_light_boost && level.features.low_light_boost,
        },
    }
}

/// Run the full chain over `draft`
pub fn apply_chain(
    draft: &mut CaptureConfiguration,
    snapshot: &PerformanceSnapshot,
) -> Vec<StrategyAdjustment> {
    StrategyKind::CHAIN
        .into_iter()
        .filter_map(|kind| {
            apply(kind, draft, snapshot).map(|note| StrategyAdjustment {
                strategy: kind,
                note,
            })
        })
        .collect()
}

/// Apply one strategy; returns a note when the draft changed
pub fn apply(
    kind: StrategyKind,
    draft: &mut CaptureConfiguration,
    snapshot: &PerformanceSnapshot,
) -> Option<String> {
    let before = *draft;
    match kind {
        StrategyKind::Thermal => {
            if snapshot.thermal >= ThermalLevel::Serious {
                draft.features.hdr = false;
            }
            if snapshot.thermal == ThermalLevel::Critical {
                draft.features.low_light_boost = false;
                draft.resolution = draft.resolution.lower();
            }
        }
        StrategyKind::Battery => {
            if snapshot.battery_level < BATTERY_LOW {
                draft.features.stabilization = false;
                draft.features.hdr = false;
            }
            if snapshot.battery_level < BATTERY_CRITICAL {
                draft.frame_rate = draft.frame_rate.min(BATTERY_FRAME_RATE_CAP);
            }
        }
        StrategyKind::Memory => {
            if snapshot.memory_usage > MEMORY_HIGH {
                draft.resolution = draft.resolution.lower();
            }
        }
        StrategyKind::FrameRate => {
            if snapshot.frame_rate_efficiency < FRAME_RATE_STRAINED {
                let sustainable = (snapshot.achieved_frame_rate.ceil() as u32).max(FRAME_RATE_FLOOR);
                draft.frame_rate = draft.frame_rate.min(sustainable);
            }
        }
    }

    (*draft != before).then(|| format!("{before} -> {draft}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FeatureSet, Resolution};

    fn full_featured() -> CaptureConfiguration {
        CaptureConfiguration {
            resolution: Resolution::Uhd4k,
            frame_rate: 60,
            features: FeatureSet {
                hdr: true,
                stabilization: true,
                low_light_boost: true,
            },
        }
    }

    #[test]
    fn base_caps_level() {
        let base = CaptureConfiguration::default();
        let derived = derive_from_base(&base, &full_featured());
        assert_eq!(derived.resolution, Resolution::Hd1080);
        assert_eq!(derived.frame_rate, 30);
        assert!(derived.features.stabilization);
        assert!(!derived.features.hdr);
    }

    #[test]
    fn healthy_snapshot_changes_nothing() {
        let mut draft = full_featured();
        let adjustments = apply_chain(&mut draft, &PerformanceSnapshot::healthy(0.0, 60.0));
        assert!(adjustments.is_empty());
        assert_eq!(draft, full_featured());
    }

    #[test]
    fn chain_runs_in_fixed_order() {
        let snapshot = PerformanceSnapshot {
            thermal: ThermalLevel::Critical,
            battery_level: 0.05,
            memory_usage: 0.95,
            frame_rate_efficiency: 0.3,
            achieved_frame_rate: 9.0,
            ..PerformanceSnapshot::healthy(0.0, 30.0)
        };
        let mut draft = full_featured();
        let adjustments = apply_chain(&mut draft, &snapshot);

        let order: Vec<StrategyKind> = adjustments.iter().map(|a| a.strategy).collect();
        assert_eq!(order, StrategyKind::CHAIN.to_vec());
        assert_eq!(draft.resolution, Resolution::Hd720);
        assert_eq!(draft.frame_rate, FRAME_RATE_FLOOR);
        assert_eq!(draft.features, FeatureSet::default());
    }

    #[test]
    fn serious_thermal_only_drops_hdr() {
        let snapshot = PerformanceSnapshot {
            thermal: ThermalLevel::Serious,
            ..PerformanceSnapshot::healthy(0.0, 30.0)
        };
        let mut draft = full_featured();
        let note = apply(StrategyKind::Thermal, &mut draft, &snapshot).unwrap();
        assert!(note.contains("+hdr"));
        assert!(!draft.features.hdr);
        assert_eq!(draft.resolution, Resolution::Uhd4k);
    }
}
