//! Resource monitor core.
//!
//! Deterministic: the caller supplies session time on every sample. Each
//! dimension is refreshed on its own cadence; between refreshes the last
//! reading is reused.

use std::collections::VecDeque;

use contracts::{
    ContractError, MonitorConfig, MonitorEvent, PerformanceSnapshot, PerformanceStatus,
    ResourceDimension, ResourceProbe, ResourceReadings, ThresholdEvent,
};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::activity::{ActivityTotals, FrameActivity};
use crate::composite::{classify, composite_score, Headroom};

/// Cadence slack for float session timestamps
const CADENCE_EPSILON: f64 = 1e-6;

/// Last refresh time per dimension
#[derive(Debug, Clone, Copy, Default)]
struct RefreshSchedule {
    frame_rate: Option<f64>,
    thermal: Option<f64>,
    memory: Option<f64>,
    battery: Option<f64>,
}

fn due(last: Option<f64>, interval_ms: f64, now: f64) -> bool {
    last.map_or(true, |t| now - t + CADENCE_EPSILON >= interval_ms / 1000.0)
}

/// Samples resources into bounded snapshot history
pub struct ResourceMonitor {
    config: MonitorConfig,
    probe: Box<dyn ResourceProbe>,
    activity: FrameActivity,
    readings: ResourceReadings,
    schedule: RefreshSchedule,
    frame_window: Option<(f64, ActivityTotals)>,
    achieved_frame_rate: f64,
    processing_latency: f64,
    target_frame_rate: f64,
    dimension_status: [PerformanceStatus; 4],
    status: PerformanceStatus,
    history: VecDeque<PerformanceSnapshot>,
    probe_failures: u64,
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMonitor")
            .field("probe", &self.probe.name())
            .field("status", &self.status)
            .field("history", &self.history.len())
            .finish()
    }
}

impl ResourceMonitor {
    /// # Errors
    /// Configuration validation failure.
    pub fn new(config: MonitorConfig, probe: Box<dyn ResourceProbe>) -> Result<Self, ContractError> {
        config
            .validate()
            .map_err(|e| ContractError::from_validation("monitor", e))?;

        let thresholds = &config.thresholds;
        if thresholds.frame_rate_critical > thresholds.frame_rate_warning
            || thresholds.memory_critical < thresholds.memory_warning
            || thresholds.battery_critical > thresholds.battery_warning
            || thresholds.thermal_critical < thresholds.thermal_warning
        {
            return Err(ContractError::config_validation(
                "monitor.thresholds",
                "critical bounds must be at least as severe as warning bounds",
            ));
        }

        Ok(Self {
            target_frame_rate: config.target_frame_rate,
            achieved_frame_rate: config.target_frame_rate,
            history: VecDeque::with_capacity(config.history_size),
            config,
            probe,
            activity: FrameActivity::new(),
            readings: ResourceReadings::default(),
            schedule: RefreshSchedule::default(),
            frame_window: None,
            processing_latency: 0.0,
            dimension_status: [PerformanceStatus::Optimal; 4],
            status: PerformanceStatus::Optimal,
            probe_failures: 0,
        })
    }

    /// Shared counters to feed delivered frames into
    pub fn activity(&self) -> FrameActivity {
        self.activity.clone()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn target_frame_rate(&self) -> f64 {
        self.target_frame_rate
    }

    /// Track a new capture frame rate after a configuration change
    pub fn set_target_frame_rate(&mut self, frame_rate: f64) -> Result<(), ContractError> {
        if !(frame_rate > 0.0) {
            return Err(ContractError::config_validation(
                "monitor.target_frame_rate",
                format!("target frame rate must be positive, got {frame_rate}"),
            ));
        }
        debug!(frame_rate, "Monitor target frame rate updated");
        self.target_frame_rate = frame_rate;
        Ok(())
    }

    pub fn status(&self) -> PerformanceStatus {
        self.status
    }

    pub fn latest(&self) -> Option<&PerformanceSnapshot> {
        self.history.back()
    }

    /// Snapshots oldest first
    pub fn history(&self) -> &VecDeque<PerformanceSnapshot> {
        &self.history
    }

    pub fn probe_failures(&self) -> u64 {
        self.probe_failures
    }

    /// Take one sample at session time `now`
    ///
    /// Samples not strictly after the previous one are skipped so history
    /// stays time-ordered. Returns the snapshot event followed by any
    /// threshold crossings and status change.
    #[instrument(name = "resource_monitor_sample", level = "debug", skip(self))]
    pub fn sample(&mut self, now: f64) -> Vec<MonitorEvent> {
        if self.latest().is_some_and(|last| now <= last.timestamp) {
            return Vec::new();
        }

        self.refresh(now);

        let efficiency = (self.achieved_frame_rate / self.target_frame_rate).clamp(0.0, 1.0);
        let ResourceReadings {
            memory_usage,
            thermal,
            battery_level,
        } = self.readings;

        let headroom = Headroom::from_readings(efficiency, memory_usage, thermal, battery_level);
        let composite = composite_score(&headroom, &self.config.weights);

        let mut crossings = Vec::new();
        for (index, dimension) in ResourceDimension::ALL.into_iter().enumerate() {
            let (current, value) = classify(
                dimension,
                efficiency,
                memory_usage,
                thermal,
                battery_level,
                &self.config.thresholds,
            );
            let previous = self.dimension_status[index];
            if current != previous {
                self.dimension_status[index] = current;
                crossings.push(ThresholdEvent {
                    dimension,
                    previous,
                    current,
                    value,
                    timestamp: now,
                });
            }
        }

        let status = self
            .dimension_status
            .iter()
            .copied()
            .max()
            .unwrap_or_default();

        let snapshot = PerformanceSnapshot {
            timestamp: now,
            frame_rate_efficiency: efficiency,
            achieved_frame_rate: self.achieved_frame_rate,
            target_frame_rate: self.target_frame_rate,
            memory_usage,
            thermal,
            battery_level,
            processing_latency: self.processing_latency,
            composite_score: composite,
            status,
        };

        if self.history.len() == self.config.history_size {
            self.history.pop_front();
        }
        self.history.push_back(snapshot.clone());
        observability::record_snapshot(&snapshot);

        let mut events = Vec::with_capacity(2 + crossings.len());
        events.push(MonitorEvent::Snapshot(snapshot));
        for event in crossings {
            observability::record_threshold_event(&event);
            info!(
                dimension = event.dimension.as_str(),
                previous = %event.previous,
                current = %event.current,
                value = event.value,
                "Resource threshold crossed"
            );
            events.push(MonitorEvent::Threshold(event));
        }

        if status != self.status {
            let previous = self.status;
            self.status = status;
            events.push(MonitorEvent::StatusChanged {
                previous,
                current: status,
            });
        }

        events
    }

    fn refresh(&mut self, now: f64) {
        if due(self.schedule.frame_rate, self.config.frame_rate_interval_ms, now) {
            self.refresh_frame_rate(now);
            self.schedule.frame_rate = Some(now);
        }

        if due(self.schedule.thermal, self.config.thermal_interval_ms, now) {
            match self.probe.read_thermal() {
                Ok(thermal) => self.readings.thermal = thermal,
                Err(err) => self.probe_failed(ResourceDimension::Thermal, &err),
            }
            self.schedule.thermal = Some(now);
        }

        if due(self.schedule.memory, self.config.memory_interval_ms, now) {
            match self.probe.read_memory() {
                Ok(memory) => self.readings.memory_usage = memory.clamp(0.0, 1.0),
                Err(err) => self.probe_failed(ResourceDimension::Memory, &err),
            }
            self.schedule.memory = Some(now);
        }

        if due(self.schedule.battery, self.config.battery_interval_ms, now) {
            match self.probe.read_battery() {
                Ok(battery) => self.readings.battery_level = battery.clamp(0.0, 1.0),
                Err(err) => self.probe_failed(ResourceDimension::Battery, &err),
            }
            self.schedule.battery = Some(now);
        }
    }

    /// Achieved rate over the window since the previous refresh
    ///
    /// The first refresh has no window and assumes the target rate.
    fn refresh_frame_rate(&mut self, now: f64) {
        let totals = self.activity.totals();
        if let Some((started, baseline)) = self.frame_window {
            let elapsed = now - started;
            if elapsed > 0.0 {
                let frames = totals.frames.saturating_sub(baseline.frames);
                self.achieved_frame_rate = frames as f64 / elapsed;
            }
            if let Some(latency) = totals.mean_latency_since(&baseline) {
                self.processing_latency = latency;
            }
        } else {
            self.achieved_frame_rate = self.target_frame_rate;
        }
        self.frame_window = Some((now, totals));
    }

    /// Probe failures are transient: keep the previous reading
    fn probe_failed(&mut self, dimension: ResourceDimension, err: &ContractError) {
        self.probe_failures += 1;
        metrics::counter!(
            "dualcam_probe_failures_total",
            "dimension" => dimension.as_str()
        )
        .increment(1);
        warn!(
            probe = self.probe.name(),
            dimension = dimension.as_str(),
            error = %err,
            "Probe read failed, keeping previous reading"
        );
    }
}
