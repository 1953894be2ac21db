//! Frame sync coordinator.
//!
//! Owns both stream buffers, the drift estimator, the clock synchronizer and
//! the output buffer. Deterministic: callers pass session time explicitly,
//! the async runtime in [`crate::runtime`] drives it from a tick interval.

use contracts::{
    ClockMode, ClockReport, ContractError, DriftState, Frame, StreamId, SyncCoordinatorConfig,
    SyncEvent, SyncQuality, SyncStatistics, SynchronizedPair,
};
use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};
use validator::Validate;

use crate::buffer::{PushOutcome, StreamBuffer};
use crate::clock::{ClockSynchronizer, SoftwareClockSync};
use crate::drift::DriftEstimator;
use crate::output::{PairOutput, PairReceiver};

/// Calibration attempts before falling back to software timestamps
const CALIBRATION_ATTEMPTS: u32 = 2;

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Stopped,
    Running,
}

/// One-shot diagnostics view
#[derive(Debug, Clone, Serialize)]
pub struct SyncDiagnostics {
    pub state: CoordinatorState,
    pub front_depth: usize,
    pub back_depth: usize,
    pub output_depth: usize,
    pub sync_window: f64,
    pub drift: DriftState,
    pub clock: ClockReport,
    pub statistics: SyncStatistics,
}

/// Best candidate found during one selection pass
#[derive(Debug, Clone, Copy)]
struct Candidate {
    front_timestamp: f64,
    back_timestamp: f64,
    raw_difference: f64,
    compensated: f64,
    score: f64,
}

/// Pairs frames from the two streams into time-aligned units
pub struct FrameSyncCoordinator {
    config: SyncCoordinatorConfig,
    state: CoordinatorState,
    front: StreamBuffer,
    back: StreamBuffer,
    drift: DriftEstimator,
    clock: Box<dyn ClockSynchronizer>,
    output: PairOutput,
    statistics: SyncStatistics,
    difference_sum: f64,
    /// Frames removed for a pair whose partner was missing
    orphaned: u64,
    next_pair_id: u64,
    ticks: u64,
}

impl std::fmt::Debug for FrameSyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSyncCoordinator")
            .field("state", &self.state)
            .field("front", &self.front)
            .field("back", &self.back)
            .field("clock", &self.clock.mode())
            .finish()
    }
}

impl FrameSyncCoordinator {
    /// Create a stopped coordinator
    ///
    /// # Errors
    /// Configuration validation failure.
    pub fn new(
        config: SyncCoordinatorConfig,
        clock: Box<dyn ClockSynchronizer>,
    ) -> Result<Self, ContractError> {
        config
            .validate()
            .map_err(|e| ContractError::from_validation("sync", e))?;

        let thresholds = &config.quality_thresholds;
        if !(thresholds.excellent_ms < thresholds.good_ms && thresholds.good_ms < thresholds.fair_ms)
        {
            return Err(ContractError::config_validation(
                "sync.quality_thresholds",
                "thresholds must be strictly increasing (excellent < good < fair)",
            ));
        }

        Ok(Self {
            front: StreamBuffer::new(StreamId::Front, config.buffer_capacity),
            back: StreamBuffer::new(StreamId::Back, config.buffer_capacity),
            drift: DriftEstimator::new(config.drift_history),
            output: PairOutput::new(config.output_capacity),
            clock,
            config,
            state: CoordinatorState::Stopped,
            statistics: SyncStatistics::default(),
            difference_sum: 0.0,
            orphaned: 0,
            next_pair_id: 0,
            ticks: 0,
        })
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == CoordinatorState::Running
    }

    pub fn config(&self) -> &SyncCoordinatorConfig {
        &self.config
    }

    /// Consumer handle for emitted pairs
    pub fn receiver(&self) -> PairReceiver {
        self.output.receiver()
    }

    /// Stopped -> Running
    ///
    /// Configures and calibrates the clock. A calibration failure is retried
    /// once; if it persists an error event is emitted and the coordinator
    /// continues in software timestamp mode. Returns the events produced.
    #[instrument(name = "sync_coordinator_start", skip(self))]
    pub fn start(&mut self, now: f64) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        if self.is_running() {
            return events;
        }

        self.reset_session();
        self.output.reopen();

        let target = self.clock.report().target_latency;
        if let Err(err) = self.clock.configure(target) {
            // Shared clock unavailable: transient, degrade quietly
            debug!(error = %err, "Shared clock unavailable, using software timestamps");
            self.degrade_clock(err.to_string(), now, &mut events);
        } else {
            self.calibrate_with_retry(now, &mut events);
        }

        self.state = CoordinatorState::Running;
        let clock = self.clock.report();
        observability::record_clock_report(&clock);
        info!(mode = %clock.mode, quality = clock.quality, "Frame sync coordinator started");
        events.push(SyncEvent::Started { clock });
        events
    }

    /// Running -> Stopped
    ///
    /// Flushes both stream buffers and the output buffer before returning.
    #[instrument(name = "sync_coordinator_stop", skip(self))]
    pub fn stop(&mut self) -> SyncStatistics {
        if self.is_running() {
            self.state = CoordinatorState::Stopped;
            self.clock.release();
            info!(
                paired = self.statistics.paired,
                sync_rate = self.statistics.sync_rate,
                "Frame sync coordinator stopped"
            );
        }
        self.front.clear();
        self.back.clear();
        self.output.clear();
        self.output.close();
        self.refresh_statistics();
        self.statistics.clone()
    }

    /// Hand a frame to its stream buffer
    ///
    /// Ignored while stopped. Returns whether the frame was buffered.
    pub fn push_frame(&mut self, frame: Frame) -> bool {
        if !self.is_running() {
            trace!(stream = %frame.stream, "Frame ignored while stopped");
            return false;
        }

        let stream = frame.stream;
        observability::record_frame_received(stream);

        let buffer = self.buffer_mut(stream);
        let outcome = buffer.push(frame);
        let depth = buffer.len();

        match stream {
            StreamId::Front => self.statistics.front_frames += 1,
            StreamId::Back => self.statistics.back_frames += 1,
        }

        match outcome {
            PushOutcome::Stored => {}
            PushOutcome::EvictedOldest | PushOutcome::DroppedIncoming => {
                observability::record_frames_evicted(stream, "overflow", 1);
            }
            PushOutcome::RejectedLate => {
                trace!(stream = %stream, "Frame behind last paired frame rejected");
                observability::record_frames_evicted(stream, "late", 1);
            }
        }
        observability::record_buffer_depth(stream, depth);

        matches!(outcome, PushOutcome::Stored | PushOutcome::EvictedOldest)
    }

    /// One sync tick: evict, select, emit
    ///
    /// Returns the number of pairs emitted.
    #[instrument(name = "sync_coordinator_tick", level = "trace", skip(self))]
    pub fn tick(&mut self, now: f64) -> usize {
        if !self.is_running() {
            return 0;
        }
        self.ticks += 1;

        self.evict_expired(now);

        let mut emitted = 0;
        while emitted < self.config.max_pairs_per_tick {
            if self.front.is_empty() || self.back.is_empty() {
                break;
            }
            let Some(candidate) = self.select_candidate(now) else {
                break;
            };
            if !self.emit_pair(candidate, now) {
                break;
            }
            emitted += 1;
        }

        self.refresh_statistics();
        emitted
    }

    /// Whether a statistics event is due on this tick
    pub fn statistics_due(&self) -> bool {
        self.ticks > 0 && self.ticks % u64::from(self.config.statistics_interval_ticks) == 0
    }

    /// Change the pairing tolerance (and tick period)
    pub fn set_sync_window(&mut self, sync_window_ms: f64) -> Result<(), ContractError> {
        if !(sync_window_ms > 0.0 && sync_window_ms <= 1000.0) {
            return Err(ContractError::config_validation(
                "sync.sync_window_ms",
                format!("sync window must be in (0, 1000] ms, got {sync_window_ms}"),
            ));
        }
        self.config.sync_window_ms = sync_window_ms;
        debug!(sync_window_ms, "Sync window updated");
        Ok(())
    }

    /// Change the clock target latency, recalibrating while running
    pub fn adjust_target_latency(
        &mut self,
        target_latency_ms: f64,
        now: f64,
    ) -> Result<Vec<SyncEvent>, ContractError> {
        let mut events = Vec::new();
        match self
            .clock
            .adjust_target_latency(target_latency_ms / 1000.0, now)
        {
            Ok(Some(report)) => {
                observability::record_clock_report(&report);
                events.push(SyncEvent::ClockCalibrated(report));
            }
            Ok(None) => {}
            Err(err) if err.is_configuration() => return Err(err),
            Err(err @ ContractError::CalibrationFailed { .. }) => {
                warn!(error = %err, "Recalibration after latency change failed");
                self.retry_calibration(1, Some(err), now, &mut events);
                if self.clock.mode() == ClockMode::Software {
                    self.clock.configure(target_latency_ms / 1000.0)?;
                }
            }
            Err(err) => {
                warn!(error = %err, "Shared clock rejected latency change");
                events.push(SyncEvent::Error {
                    message: err.to_string(),
                });
                self.degrade_clock(err.to_string(), now, &mut events);
                self.clock.configure(target_latency_ms / 1000.0)?;
            }
        }
        Ok(events)
    }

    pub fn statistics(&self) -> &SyncStatistics {
        &self.statistics
    }

    pub fn drift_state(&self) -> DriftState {
        self.drift.state()
    }

    pub fn clock_report(&self) -> ClockReport {
        self.clock.report()
    }

    pub fn diagnostics(&self) -> SyncDiagnostics {
        SyncDiagnostics {
            state: self.state,
            front_depth: self.front.len(),
            back_depth: self.back.len(),
            output_depth: self.output.len(),
            sync_window: self.config.sync_window_secs(),
            drift: self.drift.state(),
            clock: self.clock.report(),
            statistics: self.statistics.clone(),
        }
    }

    /// Read-only view of a stream buffer
    pub fn buffer(&self, stream: StreamId) -> &StreamBuffer {
        match stream {
            StreamId::Front => &self.front,
            StreamId::Back => &self.back,
        }
    }

    fn buffer_mut(&mut self, stream: StreamId) -> &mut StreamBuffer {
        match stream {
            StreamId::Front => &mut self.front,
            StreamId::Back => &mut self.back,
        }
    }

    fn reset_session(&mut self) {
        self.front.reset();
        self.back.reset();
        self.drift.reset();
        self.output.clear();
        self.statistics = SyncStatistics::default();
        self.difference_sum = 0.0;
        self.orphaned = 0;
        self.next_pair_id = 0;
        self.ticks = 0;
    }

    fn calibrate_with_retry(&mut self, now: f64, events: &mut Vec<SyncEvent>) {
        self.retry_calibration(0, None, now, events);
    }

    /// Calibrate until two attempts in total have been made
    fn retry_calibration(
        &mut self,
        attempts_made: u32,
        mut last_error: Option<ContractError>,
        now: f64,
        events: &mut Vec<SyncEvent>,
    ) {
        for attempt in attempts_made + 1..=CALIBRATION_ATTEMPTS {
            match self.clock.calibrate(now) {
                Ok(report) => {
                    debug!(attempt, "Clock calibrated");
                    events.push(SyncEvent::ClockCalibrated(report));
                    return;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Clock calibration failed");
                    last_error = Some(err);
                }
            }
        }

        let message = ContractError::CalibrationFailed {
            attempts: CALIBRATION_ATTEMPTS,
            message: last_error.map(|e| e.to_string()).unwrap_or_default(),
        }
        .to_string();
        events.push(SyncEvent::Error {
            message: message.clone(),
        });
        self.degrade_clock(message, now, events);
    }

    fn degrade_clock(&mut self, reason: String, now: f64, events: &mut Vec<SyncEvent>) {
        if self.clock.mode() == ClockMode::Software {
            return;
        }
        let previous = self.clock.report();
        let mut software = SoftwareClockSync::new(contracts::ClockConfig {
            target_latency_ms: previous.target_latency * 1000.0,
            ..contracts::ClockConfig::default()
        });
        // Software mode cannot fail to calibrate
        let _ = software.calibrate(now);
        self.clock = Box::new(software);

        let clock = self.clock.report();
        metrics::counter!("dualcam_clock_degraded_total").increment(1);
        events.push(SyncEvent::ClockDegraded { reason, clock });
    }

    fn evict_expired(&mut self, now: f64) {
        let cutoff = now - self.config.max_frame_age_secs();
        for stream in StreamId::ALL {
            let expired = self.buffer_mut(stream).pop_older_than(cutoff);
            if !expired.is_empty() {
                trace!(stream = %stream, count = expired.len(), "Evicted expired frames");
                observability::record_frames_evicted(stream, "expired", expired.len() as u64);
            }
        }
    }

    /// Lowest-score candidate within the sync window
    fn select_candidate(&self, now: f64) -> Option<Candidate> {
        let window = self.config.sync_window_secs();
        let max_age = self.config.max_frame_age_secs();
        let penalty_scale = self.config.age_penalty_weight * window;

        let backs = self.back.peek_all();
        let mut best: Option<Candidate> = None;

        for front in self.front.peek_all() {
            for back in &backs {
                let raw_difference = front.timestamp - back.timestamp;
                if raw_difference.abs() > window {
                    continue;
                }

                let compensated = self.drift.compensate(raw_difference, StreamId::Back).abs();
                let oldest_age = front.age(now).max(back.age(now));
                let age_ratio = (oldest_age / max_age).clamp(0.0, 1.0);
                let score = compensated + penalty_scale * age_ratio;

                if best.map_or(true, |b| score < b.score) {
                    best = Some(Candidate {
                        front_timestamp: front.timestamp,
                        back_timestamp: back.timestamp,
                        raw_difference,
                        compensated,
                        score,
                    });
                }
            }
        }

        best
    }

    /// Returns false when a candidate frame was missing and nothing was emitted
    fn emit_pair(&mut self, candidate: Candidate, now: f64) -> bool {
        let front = self.front.remove_through(candidate.front_timestamp);
        let back = self.back.remove_through(candidate.back_timestamp);
        let (front, back) = match (front, back) {
            (Some(front), Some(back)) => (front, back),
            (front, back) => {
                let lost = u64::from(front.is_some()) + u64::from(back.is_some());
                self.orphaned += lost;
                warn!(lost, "Pair candidate missing from its buffer, frames discarded");
                metrics::counter!("dualcam_orphaned_frames_total").increment(lost);
                return false;
            }
        };

        let time_difference = candidate.raw_difference.abs();
        let quality = SyncQuality::classify(time_difference, &self.config.quality_thresholds);

        let pair = SynchronizedPair {
            pair_id: self.next_pair_id,
            presentation_timestamp: (front.timestamp + back.timestamp) / 2.0,
            front,
            back,
            time_difference,
            compensated_difference: candidate.compensated,
            quality,
            created_at: now,
        };
        self.next_pair_id += 1;

        trace!(
            pair_id = pair.pair_id,
            diff_ms = time_difference * 1000.0,
            score = candidate.score,
            quality = %quality,
            "Pair emitted"
        );

        self.drift
            .record(pair.front.timestamp, pair.back.timestamp, now);
        observability::record_drift(self.drift.average_drift());

        self.statistics.paired += 1;
        self.statistics.quality.record(quality);
        self.difference_sum += time_difference;

        observability::record_pair_metrics(&pair);
        if self.output.push(pair) {
            metrics::counter!("dualcam_output_dropped_total").increment(1);
        }
        true
    }

    fn refresh_statistics(&mut self) {
        let stats = &mut self.statistics;
        stats.front_dropped = self.front.dropped_count();
        stats.back_dropped = self.back.dropped_count();
        stats.expired = self.front.expired_count() + self.back.expired_count();
        stats.superseded =
            self.front.superseded_count() + self.back.superseded_count() + self.orphaned;
        stats.late = self.front.late_count() + self.back.late_count();
        stats.output_dropped = self.output.dropped();
        stats.average_time_difference = if stats.paired == 0 {
            0.0
        } else {
            self.difference_sum / stats.paired as f64
        };
        let total = stats.front_frames.max(stats.back_frames);
        stats.sync_rate = if total == 0 {
            0.0
        } else {
            stats.paired as f64 / total as f64
        };
    }
}
