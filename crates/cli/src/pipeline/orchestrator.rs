//! Pipeline orchestrator - coordinates all components.
//!
//! Data path: mock cameras → capture channel → sync coordinator → dispatcher.
//! Control path: resource monitor → quality controller → cameras.

use std::future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use capture::{BackpressureConfig, CapturePipeline, MockCamera, MockClockDevice};
use contracts::{
    AdaptationDecision, CaptureConfiguration, Frame, FrameCallback, MonitorEvent,
    PipelineBlueprint, SessionClock, SharedClockDevice, StreamId, SyncEvent, SynchronizedPair,
};
use quality_control::{ControllerHandle, QualityController};
use resource_monitor::{FrameActivity, LinuxProbe, MonitorHandle, ResourceMonitor};
use sync_engine::{select_clock, FrameSyncCoordinator, PairReceiver, SyncHandle};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Upper bound on waiting for sinks to flush at shutdown
const DISPATCHER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded and validated blueprint
    pub blueprint: PipelineBlueprint,

    /// Maximum number of pairs to dispatch (None = unlimited)
    pub max_pairs: Option<u64>,

    /// Run duration (None = until shutdown)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Mock camera RNG seed
    pub seed: Option<u64>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

/// Event streams the run loop consumes
struct Channels {
    pairs: PairReceiver,
    pair_tx: mpsc::Sender<SynchronizedPair>,
    sync_events: broadcast::Receiver<SyncEvent>,
    monitor_events: broadcast::Receiver<MonitorEvent>,
    decisions: broadcast::Receiver<AdaptationDecision>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the duration or pair limit is reached, or `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let clock = SessionClock::new();
        let cancel = shutdown.child_token();

        // Quality controller
        let catalog = config_loader::build_catalog(blueprint).map_err(CliError::Config)?;
        let controller =
            QualityController::new(blueprint.controller.clone(), catalog, blueprint.capture.base)
                .map_err(CliError::Config)?;
        let initial = controller.current_configuration();
        info!(
            level = %controller.current_level().name,
            configuration = %initial,
            "Quality controller configured"
        );

        // Capture
        let mut capture = build_capture(blueprint, initial, clock, self.config.seed)?;
        let frames_rx = capture
            .take_receiver()
            .context("Failed to get capture receiver")?;

        // Sync coordinator
        let device = blueprint.capture.shared_clock.then(|| {
            Box::new(MockClockDevice::new(
                clock,
                blueprint.capture.front.clone(),
                blueprint.capture.back.clone(),
            )) as Box<dyn SharedClockDevice>
        });
        let clock_sync = select_clock(&blueprint.clock, device).map_err(CliError::Setup)?;
        let coordinator = FrameSyncCoordinator::new(blueprint.sync.clone(), clock_sync)
            .map_err(CliError::Setup)?;
        let mut sync = SyncHandle::spawn(coordinator, clock, cancel.child_token());
        let sync_events = sync.subscribe();

        info!(
            sync_window_ms = blueprint.sync.sync_window_ms,
            max_frame_age_ms = blueprint.sync.max_frame_age_ms,
            "Sync coordinator started"
        );

        // Resource monitor and controller task
        let mut monitor_config = blueprint.effective_monitor_config();
        monitor_config.target_frame_rate = f64::from(initial.frame_rate);
        let monitor = ResourceMonitor::new(monitor_config, Box::new(LinuxProbe::new()))
            .map_err(CliError::Setup)?;
        let monitor = MonitorHandle::spawn(monitor, clock, cancel.child_token());
        let controller =
            ControllerHandle::spawn(controller, monitor.subscribe(), cancel.child_token());

        // Dispatcher
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - pairs will be dropped");
        }
        let (pair_tx, pair_rx) = mpsc::channel(blueprint.sync.output_capacity.max(1));
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), pair_rx)
            .await
            .map_err(CliError::from)?;
        let active_sinks = dispatcher.sink_names().len();
        let dispatcher_handle = dispatcher.spawn();
        info!(active_sinks, "Dispatcher started");

        // Start capture
        capture.start().map_err(CliError::from)?;
        let forward_cancel = cancel.child_token();
        let forward = tokio::spawn(forward_frames(
            frames_rx,
            sync.frame_callback(),
            forward_cancel.clone(),
        ));

        info!(
            max_pairs = ?self.config.max_pairs,
            duration = ?self.config.duration,
            "Pipeline running"
        );

        let channels = Channels {
            pairs: sync.pairs(),
            pair_tx,
            sync_events,
            monitor_events: monitor.subscribe(),
            decisions: controller.subscribe(),
        };
        let mut stats = self
            .process(channels, &capture, &monitor, monitor.activity(), clock, &cancel)
            .await;

        // Shutdown, upstream first
        info!("Shutting down pipeline...");
        capture.stop();
        forward_cancel.cancel();
        stats.frames_forwarded = forward.await.unwrap_or_default();
        stats.capture = capture.metrics().snapshot();

        let statistics = sync
            .stop()
            .await
            .context("Sync coordinator did not stop cleanly")?;
        stats.sync_metrics.update_statistics(&statistics);

        if let Some(controller) = controller.stop().await {
            stats.final_level = controller.current_level().name.clone();
        }
        monitor.stop().await;

        match tokio::time::timeout(DISPATCHER_SHUTDOWN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(sinks)) => stats.sinks = sinks,
            Ok(Err(e)) => warn!(error = %e, "Dispatcher task failed"),
            Err(_) => warn!("Dispatcher did not flush in time"),
        }

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            pairs = stats.pairs_dispatched,
            pair_rate = format!("{:.2}", stats.pair_rate()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    /// Consume pairs and events until a stop condition is met
    async fn process(
        &self,
        mut channels: Channels,
        capture: &CapturePipeline,
        monitor: &MonitorHandle,
        activity: FrameActivity,
        clock: SessionClock,
        cancel: &CancellationToken,
    ) -> PipelineStats {
        let mut stats = PipelineStats::default();

        let deadline = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut sync_open = true;
        let mut monitor_open = true;
        let mut decisions_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = &mut deadline => {
                    info!("Run duration elapsed");
                    break;
                }
                pair = channels.pairs.recv() => {
                    let Some(pair) = pair else {
                        warn!("Pair output closed");
                        break;
                    };
                    activity.record_frame();
                    activity.record_latency(clock.now() - pair.presentation_timestamp);
                    stats.sync_metrics.update(&pair);

                    if channels.pair_tx.send(pair).await.is_err() {
                        warn!("Dispatcher channel closed");
                        break;
                    }
                    stats.pairs_dispatched += 1;

                    if let Some(max) = self.config.max_pairs {
                        if stats.pairs_dispatched >= max {
                            info!(pairs = stats.pairs_dispatched, "Reached max pairs limit");
                            break;
                        }
                    }
                }
                decision = channels.decisions.recv(), if decisions_open => match decision {
                    Ok(decision) => {
                        apply_decision(&decision, capture, monitor).await;
                        stats.adaptations += 1;
                        stats.sync_metrics.update_adaptation(&decision);
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed quality decisions"),
                    Err(RecvError::Closed) => decisions_open = false,
                },
                event = channels.sync_events.recv(), if sync_open => match event {
                    Ok(event) => on_sync_event(event, &mut stats),
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "Missed sync events"),
                    Err(RecvError::Closed) => sync_open = false,
                },
                event = channels.monitor_events.recv(), if monitor_open => match event {
                    Ok(MonitorEvent::Snapshot(snapshot)) => {
                        stats.sync_metrics.update_snapshot(&snapshot);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "Missed monitor events"),
                    Err(RecvError::Closed) => monitor_open = false,
                },
            }
        }

        stats
    }
}

/// Register a mock camera per stream, both starting at `initial`
fn build_capture(
    blueprint: &PipelineBlueprint,
    initial: CaptureConfiguration,
    clock: SessionClock,
    seed: Option<u64>,
) -> Result<CapturePipeline, CliError> {
    let mut capture = CapturePipeline::new(BackpressureConfig {
        channel_capacity: blueprint.capture.channel_capacity,
    });

    for (index, stream) in StreamId::ALL.into_iter().enumerate() {
        let mut camera = MockCamera::new(
            stream,
            blueprint.capture.camera(stream).clone(),
            initial,
            clock,
        );
        // Distinct per-stream seeds so the two jitter sequences differ
        if let Some(seed) = seed {
            camera = camera.with_seed(seed.wrapping_add(index as u64));
        }
        capture.register(Box::new(camera))?;
    }

    Ok(capture)
}

/// Move frames from the capture channel into the coordinator's ingress
async fn forward_frames(
    frames: async_channel::Receiver<Frame>,
    push: FrameCallback,
    cancel: CancellationToken,
) -> u64 {
    let mut forwarded = 0u64;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.recv() => {
                let Ok(frame) = frame else { break };
                push(frame);
                forwarded += 1;
            }
        }
    }
    debug!(forwarded, "Frame forwarding stopped");
    forwarded
}

async fn apply_decision(
    decision: &AdaptationDecision,
    capture: &CapturePipeline,
    monitor: &MonitorHandle,
) {
    info!(
        level = %decision.level.name,
        configuration = %decision.configuration,
        reason = %decision.reason,
        "Applying quality decision"
    );
    capture.apply_configuration(&decision.configuration);

    if let Err(e) = monitor
        .set_target_frame_rate(f64::from(decision.configuration.frame_rate))
        .await
    {
        warn!(error = %e, "Failed to update monitor target frame rate");
    }
}

fn on_sync_event(event: SyncEvent, stats: &mut PipelineStats) {
    match event {
        SyncEvent::Started { clock } | SyncEvent::ClockCalibrated(clock) => {
            info!(
                mode = %clock.mode,
                measured_latency = ?clock.measured_latency,
                "Clock ready"
            );
        }
        SyncEvent::ClockDegraded { reason, clock } => {
            warn!(%reason, mode = %clock.mode, "Clock degraded to software timestamps");
        }
        SyncEvent::Error { message } => warn!(%message, "Sync coordinator error"),
        SyncEvent::Statistics(statistics) => {
            debug!(
                paired = statistics.paired,
                sync_rate = format!("{:.3}", statistics.sync_rate),
                "Sync statistics"
            );
            stats.sync_metrics.update_statistics(&statistics);
        }
        SyncEvent::Stopped { .. } => {}
    }
}
