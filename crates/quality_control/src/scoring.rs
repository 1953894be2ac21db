//! Level scoring against a performance snapshot.

use contracts::{PerformanceSnapshot, QualityLevel, ScoringWeights};
use serde::Serialize;

/// Penalty per violated resource constraint
const RESOURCE_PENALTY: f64 = 0.4;
/// Penalty per violated stability constraint
const STABILITY_PENALTY: f64 = 0.5;

/// Weighted components of one level's score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelScore {
    /// `1 - |target_score - composite|`
    pub target_fit: f64,
    /// Memory / thermal / battery fit
    pub resource_fit: f64,
    /// Frame-rate / processing-time fit
    pub stability_fit: f64,
    /// Preference weight, halved under thermal or battery violations
    pub preference: f64,
    /// Weighted sum
    pub total: f64,
}

/// Score one level for a snapshot
pub fn score_level(
    level: &QualityLevel,
    snapshot: &PerformanceSnapshot,
    weights: &ScoringWeights,
) -> LevelScore {
    let violations = level.constraints.check(snapshot);

    let target_fit = 1.0 - (level.target_score - snapshot.composite_score).abs();
    let resource_fit =
        (1.0 - RESOURCE_PENALTY * violations.resource_count() as f64).max(0.0);
    let stability_violations =
        usize::from(violations.frame_rate) + usize::from(violations.processing_time);
    let stability_fit = (1.0 - STABILITY_PENALTY * stability_violations as f64).max(0.0);

    let mut preference = level.preference_weight;
    if violations.thermal || violations.battery {
        preference *= 0.5;
    }

    let total = weights.target * target_fit
        + weights.resource * resource_fit
        + weights.stability * stability_fit
        + weights.preference * preference;

    LevelScore {
        target_fit,
        resource_fit,
        stability_fit,
        preference,
        total,
    }
}

/// Index of the best level; ties go to the more preferred one
///
/// Levels whose thermal or battery constraint the snapshot breaks are only
/// considered when no level admits it. `levels` must be in descending
/// preference order.
pub fn best_level(
    levels: &[QualityLevel],
    snapshot: &PerformanceSnapshot,
    weights: &ScoringWeights,
) -> Option<(usize, LevelScore)> {
    let power_safe = |level: &QualityLevel| {
        let violations = level.constraints.check(snapshot);
        !(violations.thermal || violations.battery)
    };
    let any_safe = levels.iter().any(power_safe);

    let mut best: Option<(usize, LevelScore)> = None;
    for (index, level) in levels.iter().enumerate() {
        if any_safe && !power_safe(level) {
            continue;
        }
        let score = score_level(level, snapshot, weights);
        if best.map_or(true, |(_, b)| score.total > b.total) {
            best = Some((index, score));
        }
    }
    best
}
