//! Adaptive quality controller.
//!
//! Consumes performance snapshots and decides when to move between catalog
//! levels. Cooldown is measured on snapshot timestamps so the controller is
//! deterministic for a given snapshot sequence.

use contracts::{
    AdaptationDecision, AdaptationReason, CaptureConfiguration, ContractError, ControllerConfig,
    PerformanceSnapshot, PerformanceStatus, QualityLevel, ThermalLevel,
};
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::catalog::QualityCatalog;
use crate::scoring::best_level;
use crate::strategy::{apply_chain, derive_from_base};

/// Adaptive quality controller
#[derive(Debug)]
pub struct QualityController {
    config: ControllerConfig,
    catalog: QualityCatalog,
    base: CaptureConfiguration,
    base_rank: usize,
    current: usize,
    configuration: CaptureConfiguration,
    last_adaptation: Option<f64>,
    last_decision: Option<AdaptationDecision>,
    critical_streak: u32,
}

impl QualityController {
    /// # Errors
    /// Invalid configuration, or a base level missing from the catalog.
    pub fn new(
        config: ControllerConfig,
        catalog: QualityCatalog,
        base: CaptureConfiguration,
    ) -> Result<Self, ContractError> {
        config
            .validate()
            .map_err(|e| ContractError::from_validation("controller", e))?;
        base.validate()
            .map_err(|e| ContractError::from_validation("capture.base", e))?;

        let base_rank = match &config.base_level {
            Some(name) => catalog.rank(name).ok_or_else(|| {
                ContractError::config_validation(
                    "controller.base_level",
                    format!("unknown quality level '{name}'"),
                )
            })?,
            None => 0,
        };

        let configuration = derive_from_base(&base, &catalog.levels()[base_rank].configuration());

        Ok(Self {
            config,
            catalog,
            base,
            base_rank,
            current: base_rank,
            configuration,
            last_adaptation: None,
            last_decision: None,
            critical_streak: 0,
        })
    }

    pub fn catalog(&self) -> &QualityCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn current_level(&self) -> &QualityLevel {
        &self.catalog.levels()[self.current]
    }

    pub fn base_level(&self) -> &QualityLevel {
        &self.catalog.levels()[self.base_rank]
    }

    /// Configuration currently in effect
    pub fn current_configuration(&self) -> CaptureConfiguration {
        self.configuration
    }

    pub fn last_decision(&self) -> Option<&AdaptationDecision> {
        self.last_decision.as_ref()
    }

    /// Feed one snapshot; returns a decision when the level changes
    #[instrument(
        name = "quality_controller_evaluate",
        skip(self, snapshot),
        fields(ts = snapshot.timestamp, composite = snapshot.composite_score)
    )]
    pub fn on_snapshot(&mut self, snapshot: &PerformanceSnapshot) -> Option<AdaptationDecision> {
        if snapshot.status == PerformanceStatus::Critical {
            self.critical_streak += 1;
        } else {
            self.critical_streak = 0;
        }

        if self.critical_streak >= self.config.critical_cascade_count {
            self.critical_streak = 0;
            info!(
                count = self.config.critical_cascade_count,
                "Consecutive critical snapshots, forcing downgrade evaluation"
            );
            return Some(self.decide(snapshot, true, AdaptationReason::CriticalCascade));
        }

        let reason = if snapshot.composite_score <= self.config.adaptation_threshold {
            AdaptationReason::Degraded
        } else if self.current > self.base_rank {
            AdaptationReason::Recovered
        } else {
            return None;
        };

        if let Some(last) = self.last_adaptation {
            let elapsed = snapshot.timestamp - last;
            if elapsed < self.config.cooldown_secs() {
                debug!(
                    remaining_secs = self.config.cooldown_secs() - elapsed,
                    "Within cooldown"
                );
                return None;
            }
        }

        let (index, total) = self.select(snapshot)?;
        // Never recover above the user's base level
        let index = if reason == AdaptationReason::Recovered {
            index.max(self.base_rank)
        } else {
            index
        };
        if index == self.current {
            debug!(level = %self.current_level().name, total, "Current level is still best");
            return None;
        }

        Some(self.apply(index, snapshot, false, reason))
    }

    /// Evaluate regardless of cooldown and always emit a decision
    pub fn force(&mut self, snapshot: &PerformanceSnapshot) -> AdaptationDecision {
        self.decide(snapshot, true, AdaptationReason::Forced)
    }

    fn decide(
        &mut self,
        snapshot: &PerformanceSnapshot,
        forced: bool,
        reason: AdaptationReason,
    ) -> AdaptationDecision {
        let index = self
            .select(snapshot)
            .map_or(self.current, |(index, _)| index);
        self.apply(index, snapshot, forced, reason)
    }

    /// Best level index and its total score
    ///
    /// Critical thermal with a critical battery pins the lowest level.
    fn select(&self, snapshot: &PerformanceSnapshot) -> Option<(usize, f64)> {
        if snapshot.thermal >= ThermalLevel::Critical
            && snapshot.battery_level <= self.config.critical_battery_level
        {
            return Some((self.catalog.len() - 1, 0.0));
        }
        best_level(self.catalog.levels(), snapshot, &self.config.weights)
            .map(|(index, score)| (index, score.total))
    }

    fn apply(
        &mut self,
        index: usize,
        snapshot: &PerformanceSnapshot,
        forced: bool,
        reason: AdaptationReason,
    ) -> AdaptationDecision {
        let level = self.catalog.levels()[index].clone();
        let mut configuration = derive_from_base(&self.base, &level.configuration());
        let adjustments = apply_chain(&mut configuration, snapshot);

        let previous = self.current_level().name.clone();
        self.current = index;
        self.configuration = configuration;
        self.last_adaptation = Some(snapshot.timestamp);

        let decision = AdaptationDecision {
            level,
            configuration,
            snapshot: snapshot.clone(),
            timestamp: snapshot.timestamp,
            forced,
            reason,
            adjustments,
        };

        observability::record_adaptation(&decision);
        info!(
            from = %previous,
            to = %decision.level.name,
            configuration = %decision.configuration,
            reason = %reason,
            forced,
            adjustments = decision.adjustments.len(),
            "Quality adapted"
        );

        self.last_decision = Some(decision.clone());
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Resolution, ThermalLevel};

    fn controller() -> QualityController {
        QualityController::new(
            ControllerConfig::default(),
            QualityCatalog::builtin(),
            CaptureConfiguration {
                resolution: Resolution::Uhd4k,
                frame_rate: 60,
                features: contracts::FeatureSet {
                    hdr: true,
                    stabilization: true,
                    low_light_boost: false,
                },
            },
        )
        .unwrap()
    }

    fn snapshot(timestamp: f64, composite: f64) -> PerformanceSnapshot {
        PerformanceSnapshot {
            composite_score: composite,
            ..PerformanceSnapshot::healthy(timestamp, 30.0)
        }
    }

    fn critical(timestamp: f64) -> PerformanceSnapshot {
        PerformanceSnapshot {
            thermal: ThermalLevel::Critical,
            battery_level: 0.05,
            composite_score: 0.6,
            status: PerformanceStatus::Critical,
            ..PerformanceSnapshot::healthy(timestamp, 30.0)
        }
    }

    #[test]
    fn starts_at_base_level() {
        let controller = controller();
        assert_eq!(controller.current_level().name, "ultra");
        assert_eq!(controller.current_configuration().resolution, Resolution::Uhd4k);
        assert!(controller.last_decision().is_none());
    }

    #[test]
    fn one_adaptation_per_cooldown() {
        let mut controller = controller();
        let decisions: Vec<_> = [0.9, 0.9, 0.5, 0.5]
            .into_iter()
            .enumerate()
            .filter_map(|(i, composite)| controller.on_snapshot(&snapshot(i as f64, composite)))
            .collect();

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].timestamp, 2.0);
        assert_eq!(decisions[0].reason, AdaptationReason::Degraded);
        assert!(!decisions[0].forced);
    }

    #[test]
    fn non_forced_adaptations_respect_cooldown() {
        let mut controller = controller();
        let mut times = Vec::new();
        for i in 0..60 {
            let composite = if i % 2 == 0 { 0.3 } else { 0.95 };
            if let Some(decision) = controller.on_snapshot(&snapshot(f64::from(i), composite)) {
                times.push(decision.timestamp);
            }
        }
        assert!(times.len() >= 2);
        assert!(times.windows(2).all(|w| w[1] - w[0] >= 10.0));
    }

    #[test]
    fn critical_thermal_and_battery_select_floor() {
        let mut controller = controller();
        let decision = controller.force(&critical(0.0));
        assert_eq!(decision.level.name, "minimal");
        assert!(decision.forced);
        assert_eq!(decision.configuration.resolution, Resolution::Hd720);
        assert_eq!(decision.configuration.frame_rate, 24);
        assert_eq!(decision.configuration.features, contracts::FeatureSet::default());
        assert_eq!(controller.current_level().name, "minimal");
    }

    #[test]
    fn floor_holds_with_high_composite() {
        let mut controller = controller();
        let decision = controller.force(&PerformanceSnapshot {
            composite_score: 0.95,
            ..critical(0.0)
        });
        assert_eq!(decision.level.name, "minimal");
    }

    #[test]
    fn floor_holds_when_several_levels_tolerate_heat() {
        let mut levels = crate::catalog::default_levels();
        levels[1].constraints = contracts::QualityConstraints::unconstrained();
        let mut controller = QualityController::new(
            ControllerConfig::default(),
            QualityCatalog::new(levels).unwrap(),
            CaptureConfiguration::default(),
        )
        .unwrap();
        let decision = controller.force(&PerformanceSnapshot {
            composite_score: 0.9,
            ..critical(0.0)
        });
        assert_eq!(decision.level.name, "minimal");
    }

    #[test]
    fn critical_cascade_forces_through_cooldown() {
        let mut controller = controller();
        assert!(controller.on_snapshot(&snapshot(0.0, 0.5)).is_some());

        // Within cooldown: the first two critical samples are gated
        assert!(controller.on_snapshot(&critical(1.0)).is_none());
        assert!(controller.on_snapshot(&critical(2.0)).is_none());
        let decision = controller.on_snapshot(&critical(3.0)).unwrap();
        assert_eq!(decision.reason, AdaptationReason::CriticalCascade);
        assert_eq!(decision.level.name, "minimal");
    }

    #[test]
    fn recovers_toward_base_when_healthy() {
        let mut controller = controller();
        controller.on_snapshot(&snapshot(0.0, 0.5)).unwrap();
        assert_ne!(controller.current_level().name, "ultra");

        // Healthy but inside cooldown
        assert!(controller.on_snapshot(&snapshot(5.0, 1.0)).is_none());
        let decision = controller.on_snapshot(&snapshot(11.0, 1.0)).unwrap();
        assert_eq!(decision.reason, AdaptationReason::Recovered);
        assert_eq!(decision.level.name, "ultra");

        // At base and healthy: nothing to do
        assert!(controller.on_snapshot(&snapshot(30.0, 1.0)).is_none());
    }

    #[test]
    fn unknown_base_level_rejected() {
        let config = ControllerConfig {
            base_level: Some("cinema".to_string()),
            ..ControllerConfig::default()
        };
        let err = QualityController::new(
            config,
            QualityCatalog::builtin(),
            CaptureConfiguration::default(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn base_configuration_caps_decisions() {
        let config = ControllerConfig {
            base_level: Some("balanced".to_string()),
            ..ControllerConfig::default()
        };
        let mut controller =
            QualityController::new(config, QualityCatalog::builtin(), CaptureConfiguration::default())
                .unwrap();
        assert_eq!(controller.current_level().name, "balanced");

        // Recovery never climbs above the base level
        controller.force(&snapshot(0.0, 0.3));
        let decision = controller.on_snapshot(&snapshot(20.0, 1.0)).unwrap();
        assert_eq!(decision.level.name, "balanced");
        assert_eq!(decision.configuration.resolution, Resolution::Hd1080);
    }
}
