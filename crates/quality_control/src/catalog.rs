//! Quality level catalog.

use std::collections::HashSet;
use std::sync::Arc;

use contracts::{
    ContractError, FeatureSet, QualityConstraints, QualityLevel, Resolution, ThermalLevel,
};
use validator::Validate;

/// Read-only, preference-ordered set of operating points
///
/// Never empty; the lowest-preference level always admits a reading with
/// no headroom left. Cloning shares the levels.
#[derive(Debug, Clone)]
pub struct QualityCatalog {
    levels: Arc<[QualityLevel]>,
}

impl QualityCatalog {
    /// Validate and order levels by descending preference
    ///
    /// # Errors
    /// Empty catalog, invalid level, duplicate names, or no level usable
    /// under critical thermal and battery conditions.
    pub fn new(mut levels: Vec<QualityLevel>) -> Result<Self, ContractError> {
        if levels.is_empty() {
            return Err(ContractError::config_validation(
                "quality_levels",
                "quality catalog must not be empty",
            ));
        }

        let mut names = HashSet::new();
        for level in &levels {
            level
                .validate()
                .map_err(|e| ContractError::from_validation(format!("quality_levels.{}", level.name), e))?;
            if !names.insert(level.name.as_str()) {
                return Err(ContractError::config_validation(
                    "quality_levels",
                    format!("duplicate level name '{}'", level.name),
                ));
            }
        }

        levels.sort_by(|a, b| b.preference_weight.total_cmp(&a.preference_weight));

        let floor = levels.last().map(|level| (level.name.clone(), level.constraints));
        if let Some((name, constraints)) = floor {
            if !constraints.admits_no_headroom() {
                return Err(ContractError::config_validation(
                    "quality_levels",
                    format!(
                        "lowest-preference level '{name}' must tolerate critical thermal, \
                         empty battery and full memory"
                    ),
                ));
            }
        }

        Ok(Self {
            levels: levels.into(),
        })
    }

    /// Built-in five-level catalog
    pub fn builtin() -> Self {
        Self {
            levels: default_levels().into(),
        }
    }

    pub fn levels(&self) -> &[QualityLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&QualityLevel> {
        self.levels.iter().find(|level| level.name == name)
    }

    /// Position in preference order (0 = most preferred)
    pub fn rank(&self, name: &str) -> Option<usize> {
        self.levels.iter().position(|level| level.name == name)
    }

    /// Most preferred level
    pub fn highest(&self) -> &QualityLevel {
        &self.levels[0]
    }

    /// Floor level
    pub fn lowest(&self) -> &QualityLevel {
        &self.levels[self.levels.len() - 1]
    }
}

impl Default for QualityCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The built-in operating points, most preferred first
pub fn default_levels() -> Vec<QualityLevel> {
    let stabilized = FeatureSet {
        stabilization: true,
        ..FeatureSet::default()
    };

    vec![
        QualityLevel {
            name: "ultra".to_string(),
            resolution: Resolution::Uhd4k,
            frame_rate: 30,
            features: FeatureSet {
                hdr: true,
                stabilization: true,
                low_light_boost: false,
            },
            constraints: QualityConstraints {
                max_memory_usage: 0.6,
                max_thermal: ThermalLevel::Fair,
                min_battery_level: 0.5,
                min_frame_rate_efficiency: 0.9,
                max_processing_time_ms: 25.0,
            },
            preference_weight: 1.0,
            target_score: 0.95,
        },
        QualityLevel {
            name: "high".to_string(),
            resolution: Resolution::Hd1080,
            frame_rate: 60,
            features: stabilized,
            constraints: QualityConstraints {
                max_memory_usage: 0.7,
                max_thermal: ThermalLevel::Fair,
                min_battery_level: 0.4,
                min_frame_rate_efficiency: 0.85,
                max_processing_time_ms: 16.0,
            },
            preference_weight: 0.8,
            target_score: 0.85,
        },
        QualityLevel {
            name: "balanced".to_string(),
            resolution: Resolution::Hd1080,
            frame_rate: 30,
            features: stabilized,
            constraints: QualityConstraints {
                max_memory_usage: 0.8,
                max_thermal: ThermalLevel::Serious,
                min_battery_level: 0.2,
                min_frame_rate_efficiency: 0.75,
                max_processing_time_ms: 33.0,
            },
            preference_weight: 0.6,
            target_score: 0.65,
        },
        QualityLevel {
            name: "efficient".to_string(),
            resolution: Resolution::Hd720,
            frame_rate: 30,
            features: FeatureSet::default(),
            constraints: QualityConstraints {
                max_memory_usage: 0.9,
                max_thermal: ThermalLevel::Serious,
                min_battery_level: 0.1,
                min_frame_rate_efficiency: 0.6,
                max_processing_time_ms: 40.0,
            },
            preference_weight: 0.4,
            target_score: 0.45,
        },
        QualityLevel {
            name: "minimal".to_string(),
            resolution: Resolution::Hd720,
            frame_rate: 24,
            features: FeatureSet::default(),
            constraints: QualityConstraints::unconstrained(),
            preference_weight: 0.2,
            target_score: 0.2,
        },
    ]
}
