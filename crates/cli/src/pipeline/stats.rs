//! Pipeline statistics and metrics.

use std::time::Duration;

use capture::CaptureMetricsSnapshot;
use dispatcher::SinkMetricsSnapshot;
use observability::SyncMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Frames forwarded from capture to the coordinator
    pub frames_forwarded: u64,

    /// Pairs handed to the dispatcher
    pub pairs_dispatched: u64,

    /// Quality adaptations applied to the cameras
    pub adaptations: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Quality level in effect at shutdown
    pub final_level: String,

    /// Capture-side counters at shutdown
    pub capture: CaptureMetricsSnapshot,

    /// Per-sink counters at shutdown
    pub sinks: Vec<(String, SinkMetricsSnapshot)>,

    /// Pair, snapshot and adaptation aggregates
    pub sync_metrics: SyncMetricsAggregator,
}

impl PipelineStats {
    /// Dispatched pairs per second
    pub fn pair_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.pairs_dispatched as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Frames forwarded: {}", self.frames_forwarded);
        println!("   ├─ Pairs dispatched: {}", self.pairs_dispatched);
        println!("   ├─ Pair rate: {:.2}/s", self.pair_rate());
        println!("   ├─ Adaptations: {}", self.adaptations);
        println!("   └─ Final quality level: {}", self.final_level);

        println!("\n📷 Capture");
        println!(
            "   ├─ Front: {} received, {} dropped",
            self.capture.front_received, self.capture.front_dropped
        );
        println!(
            "   └─ Back: {} received, {} dropped",
            self.capture.back_received, self.capture.back_dropped
        );

        println!("\n{}", self.sync_metrics.summary());

        if !self.sinks.is_empty() {
            println!("📤 Sinks");
            for (i, (name, metrics)) in self.sinks.iter().enumerate() {
                let prefix = if i == self.sinks.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} written, {} failed, {} dropped",
                    prefix, name, metrics.written, metrics.failed, metrics.dropped
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_rate_guards_zero_duration() {
        let stats = PipelineStats {
            pairs_dispatched: 10,
            ..PipelineStats::default()
        };
        assert_eq!(stats.pair_rate(), 0.0);

        let stats = PipelineStats {
            pairs_dispatched: 10,
            duration: Duration::from_secs(2),
            ..PipelineStats::default()
        };
        assert_eq!(stats.pair_rate(), 5.0);
    }
}
