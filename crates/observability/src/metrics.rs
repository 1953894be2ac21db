//! Pipeline metrics
//!
//! `metrics` facade recorders for pairs, sync statistics, resource snapshots
//! and adaptation decisions, plus an in-memory aggregator for run summaries.

use std::collections::HashMap;

use contracts::{
    AdaptationDecision, ClockReport, PerformanceSnapshot, StreamId, SyncQuality, SyncStatistics,
    SynchronizedPair, ThresholdEvent,
};
use metrics::{counter, gauge, histogram};

/// Record metrics for one emitted pair
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_pair_metrics;
///
/// while let Some(pair) = pairs.recv().await {
///     record_pair_metrics(&pair);
///     // ...
/// }
/// ```
pub fn record_pair_metrics(pair: &SynchronizedPair) {
    counter!("dualcam_pairs_total", "quality" => pair.quality.as_str()).increment(1);

    gauge!("dualcam_last_pair_id").set(pair.pair_id as f64);

    histogram!("dualcam_time_difference_ms").record(pair.time_difference * 1000.0);
    histogram!("dualcam_compensated_difference_ms").record(pair.compensated_difference * 1000.0);

    let latency = (pair.created_at - pair.presentation_timestamp).max(0.0);
    histogram!("dualcam_pair_latency_ms").record(latency * 1000.0);
}

/// Record a periodic statistics update
pub fn record_sync_statistics(stats: &SyncStatistics) {
    gauge!("dualcam_sync_rate").set(stats.sync_rate);
    gauge!("dualcam_average_time_difference_ms").set(stats.average_time_difference * 1000.0);

    gauge!("dualcam_frames_dropped", "stream" => StreamId::Front.as_str())
        .set(stats.front_dropped as f64);
    gauge!("dualcam_frames_dropped", "stream" => StreamId::Back.as_str())
        .set(stats.back_dropped as f64);
    gauge!("dualcam_frames_expired").set(stats.expired as f64);
    gauge!("dualcam_frames_superseded").set(stats.superseded as f64);
    gauge!("dualcam_frames_late").set(stats.late as f64);
    gauge!("dualcam_output_dropped").set(stats.output_dropped as f64);
}

/// Record a frame arriving at the coordinator
pub fn record_frame_received(stream: StreamId) {
    counter!("dualcam_frames_received_total", "stream" => stream.as_str()).increment(1);
}

/// Record frames leaving a stream buffer without being paired
pub fn record_frames_evicted(stream: StreamId, reason: &'static str, count: u64) {
    if count > 0 {
        counter!(
            "dualcam_frames_evicted_total",
            "stream" => stream.as_str(),
            "reason" => reason
        )
        .increment(count);
    }
}

/// Record stream buffer depth
pub fn record_buffer_depth(stream: StreamId, depth: usize) {
    gauge!("dualcam_buffer_depth", "stream" => stream.as_str()).set(depth as f64);
}

/// Record the current drift estimate
pub fn record_drift(average_drift: f64) {
    gauge!("dualcam_drift_ms").set(average_drift * 1000.0);
}

/// Record a clock calibration or mode change
pub fn record_clock_report(report: &ClockReport) {
    gauge!("dualcam_clock_quality").set(report.quality);
    gauge!("dualcam_clock_target_latency_ms").set(report.target_latency * 1000.0);
    if let Some(latency) = report.measured_latency {
        gauge!("dualcam_clock_measured_latency_ms").set(latency * 1000.0);
    }
    histogram!("dualcam_clock_calibration_ms").record(report.calibration_duration_ms);
}

/// Record a resource snapshot
pub fn record_snapshot(snapshot: &PerformanceSnapshot) {
    gauge!("dualcam_composite_score").set(snapshot.composite_score);
    gauge!("dualcam_frame_rate_efficiency").set(snapshot.frame_rate_efficiency);
    gauge!("dualcam_achieved_frame_rate").set(snapshot.achieved_frame_rate);
    gauge!("dualcam_memory_usage").set(snapshot.memory_usage);
    gauge!("dualcam_battery_level").set(snapshot.battery_level);
    gauge!("dualcam_thermal_level").set(snapshot.thermal.headroom());
    histogram!("dualcam_processing_latency_ms").record(snapshot.processing_latency * 1000.0);
}

/// Record a threshold crossing
pub fn record_threshold_event(event: &ThresholdEvent) {
    counter!(
        "dualcam_threshold_events_total",
        "dimension" => event.dimension.as_str(),
        "status" => event.current.as_str()
    )
    .increment(1);
}

/// Record an adaptation decision
pub fn record_adaptation(decision: &AdaptationDecision) {
    counter!(
        "dualcam_adaptations_total",
        "reason" => decision.reason.as_str(),
        "level" => decision.level.name.clone()
    )
    .increment(1);
    gauge!("dualcam_quality_frame_rate").set(f64::from(decision.configuration.frame_rate));
}

/// Record pair dispatch
pub fn record_pair_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "dualcam_pairs_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Run metrics aggregator
///
/// Aggregates in memory for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    /// Pairs observed
    pub total_pairs: u64,

    /// Pairs per quality class
    pub quality_counts: HashMap<SyncQuality, u64>,

    /// Uncompensated difference (ms)
    pub time_difference_stats: RunningStats,

    /// Compensated difference (ms)
    pub compensated_stats: RunningStats,

    /// Composite score per snapshot
    pub composite_stats: RunningStats,

    /// Adaptations per level name
    pub adaptation_counts: HashMap<String, u64>,

    /// Last statistics update from the coordinator
    pub last_statistics: Option<SyncStatistics>,
}

impl SyncMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with one pair
    pub fn update(&mut self, pair: &SynchronizedPair) {
        self.total_pairs += 1;
        *self.quality_counts.entry(pair.quality).or_insert(0) += 1;
        self.time_difference_stats.push(pair.time_difference * 1000.0);
        self.compensated_stats
            .push(pair.compensated_difference * 1000.0);
    }

    pub fn update_snapshot(&mut self, snapshot: &PerformanceSnapshot) {
        self.composite_stats.push(snapshot.composite_score);
    }

    pub fn update_adaptation(&mut self, decision: &AdaptationDecision) {
        *self
            .adaptation_counts
            .entry(decision.level.name.clone())
            .or_insert(0) += 1;
    }

    pub fn update_statistics(&mut self, statistics: &SyncStatistics) {
        self.last_statistics = Some(statistics.clone());
    }

    /// Build the summary report
    pub fn summary(&self) -> MetricsSummary {
        let ratio = |quality: SyncQuality| {
            if self.total_pairs == 0 {
                0.0
            } else {
                *self.quality_counts.get(&quality).unwrap_or(&0) as f64 / self.total_pairs as f64
                    * 100.0
            }
        };

        MetricsSummary {
            total_pairs: self.total_pairs,
            excellent_rate: ratio(SyncQuality::Excellent),
            poor_rate: ratio(SyncQuality::Poor),
            sync_rate: self
                .last_statistics
                .as_ref()
                .map(|s| s.sync_rate * 100.0)
                .unwrap_or(0.0),
            frames_dropped: self
                .last_statistics
                .as_ref()
                .map(|s| s.front_dropped + s.back_dropped + s.expired)
                .unwrap_or(0),
            time_difference_ms: StatsSummary::from(&self.time_difference_stats),
            compensated_ms: StatsSummary::from(&self.compensated_stats),
            composite_score: StatsSummary::from(&self.composite_stats),
            adaptation_counts: self.adaptation_counts.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_pairs: u64,
    pub excellent_rate: f64,
    pub poor_rate: f64,
    pub sync_rate: f64,
    pub frames_dropped: u64,
    pub time_difference_ms: StatsSummary,
    pub compensated_ms: StatsSummary,
    pub composite_score: StatsSummary,
    pub adaptation_counts: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== DualCam Sync Summary ===")?;
        writeln!(f, "Total pairs: {}", self.total_pairs)?;
        writeln!(f, "Sync rate: {:.2}%", self.sync_rate)?;
        writeln!(
            f,
            "Excellent: {:.2}%, poor: {:.2}%",
            self.excellent_rate, self.poor_rate
        )?;
        writeln!(f, "Frames dropped unpaired: {}", self.frames_dropped)?;
        writeln!(f, "Time difference (ms): {}", self.time_difference_ms)?;
        writeln!(f, "Compensated difference (ms): {}", self.compensated_ms)?;
        writeln!(f, "Composite score: {}", self.composite_score)?;

        if !self.adaptation_counts.is_empty() {
            writeln!(f, "Adaptations:")?;
            let mut levels: Vec<_> = self.adaptation_counts.iter().collect();
            levels.sort();
            for (level, count) in levels {
                writeln!(f, "  {}: {}", level, count)?;
            }
        }

        Ok(())
    }
}

/// Stats summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
