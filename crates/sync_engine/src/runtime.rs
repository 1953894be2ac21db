//! Async driver for [`FrameSyncCoordinator`].
//!
//! One task owns the coordinator. Frames arrive over a bounded mpsc queue,
//! control requests over a command queue, and ticks come from an interval
//! whose period equals the sync window.

use std::time::Duration;

use contracts::{
    duration_from_ms, ContractError, Frame, FrameCallback, SessionClock, SyncEvent,
    SyncStatistics,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::coordinator::{FrameSyncCoordinator, SyncDiagnostics};
use crate::output::PairReceiver;

const EVENT_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 16;

enum SyncCommand {
    SetSyncWindow {
        sync_window_ms: f64,
        reply: oneshot::Sender<Result<(), ContractError>>,
    },
    AdjustTargetLatency {
        target_latency_ms: f64,
        reply: oneshot::Sender<Result<(), ContractError>>,
    },
    Diagnostics {
        reply: oneshot::Sender<SyncDiagnostics>,
    },
}

/// Handle to a running coordinator task
pub struct SyncHandle {
    frames_tx: mpsc::Sender<Frame>,
    commands_tx: mpsc::Sender<SyncCommand>,
    events_tx: broadcast::Sender<SyncEvent>,
    initial_events: Option<broadcast::Receiver<SyncEvent>>,
    pairs: PairReceiver,
    clock: SessionClock,
    cancel: CancellationToken,
    task: JoinHandle<SyncStatistics>,
}

impl SyncHandle {
    /// Start the coordinator and spawn its task
    ///
    /// Clock calibration runs before this returns; the resulting events are
    /// delivered to the first [`subscribe`](Self::subscribe) call.
    #[instrument(name = "sync_handle_spawn", skip_all)]
    pub fn spawn(
        mut coordinator: FrameSyncCoordinator,
        clock: SessionClock,
        cancel: CancellationToken,
    ) -> Self {
        let ingress_capacity = coordinator.config().ingress_capacity;
        let (frames_tx, frames_rx) = mpsc::channel(ingress_capacity);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events_tx, initial_events) = broadcast::channel(EVENT_CAPACITY);

        for event in coordinator.start(clock.now()) {
            let _ = events_tx.send(event);
        }
        let pairs = coordinator.receiver();

        let worker = SyncWorker {
            coordinator,
            clock,
            frames_rx,
            commands_rx,
            events_tx: events_tx.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        Self {
            frames_tx,
            commands_tx,
            events_tx,
            initial_events: Some(initial_events),
            pairs,
            clock,
            cancel,
            task,
        }
    }

    /// Coordinator event stream
    pub fn subscribe(&mut self) -> broadcast::Receiver<SyncEvent> {
        self.initial_events
            .take()
            .unwrap_or_else(|| self.events_tx.subscribe())
    }

    /// Consumer side of the pair output
    pub fn pairs(&self) -> PairReceiver {
        self.pairs.clone()
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Non-blocking frame ingress
    ///
    /// Returns `false` if the ingress queue is full or the task is gone.
    pub fn try_push(&self, frame: Frame) -> bool {
        push_frame(&self.frames_tx, frame)
    }

    /// Callback suitable for [`contracts::FrameSource::listen`]
    pub fn frame_callback(&self) -> FrameCallback {
        let tx = self.frames_tx.clone();
        std::sync::Arc::new(move |frame: Frame| {
            push_frame(&tx, frame);
        })
    }

    /// Change the pairing tolerance and tick period
    pub async fn set_sync_window(&self, sync_window_ms: f64) -> Result<(), ContractError> {
        let (reply, rx) = oneshot::channel();
        self.request(SyncCommand::SetSyncWindow {
            sync_window_ms,
            reply,
        })
        .await?;
        rx.await.map_err(|_| not_running())?
    }

    /// Change the clock target latency (recalibrates while running)
    pub async fn adjust_target_latency(&self, target_latency_ms: f64) -> Result<(), ContractError> {
        let (reply, rx) = oneshot::channel();
        self.request(SyncCommand::AdjustTargetLatency {
            target_latency_ms,
            reply,
        })
        .await?;
        rx.await.map_err(|_| not_running())?
    }

    pub async fn diagnostics(&self) -> Result<SyncDiagnostics, ContractError> {
        let (reply, rx) = oneshot::channel();
        self.request(SyncCommand::Diagnostics { reply }).await?;
        rx.await.map_err(|_| not_running())
    }

    /// Stop the coordinator and wait for its final statistics
    #[instrument(name = "sync_handle_stop", skip(self))]
    pub async fn stop(self) -> Result<SyncStatistics, ContractError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| ContractError::Other(format!("sync task failed: {e}")))
    }

    async fn request(&self, command: SyncCommand) -> Result<(), ContractError> {
        self.commands_tx
            .send(command)
            .await
            .map_err(|_| not_running())
    }
}

fn not_running() -> ContractError {
    ContractError::not_running("sync coordinator")
}

fn push_frame(tx: &mpsc::Sender<Frame>, frame: Frame) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(frame)) => {
            metrics::counter!("dualcam_ingress_dropped_total", "stream" => frame.stream.as_str())
                .increment(1);
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

fn tick_interval(sync_window_ms: f64) -> Interval {
    let period = duration_from_ms(sync_window_ms).max(Duration::from_millis(1));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

struct SyncWorker {
    coordinator: FrameSyncCoordinator,
    clock: SessionClock,
    frames_rx: mpsc::Receiver<Frame>,
    commands_rx: mpsc::Receiver<SyncCommand>,
    events_tx: broadcast::Sender<SyncEvent>,
    cancel: CancellationToken,
}

impl SyncWorker {
    #[instrument(name = "sync_worker_loop", skip(self))]
    async fn run(mut self) -> SyncStatistics {
        let mut ticker = tick_interval(self.coordinator.config().sync_window_ms);
        debug!("Sync worker started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                command = self.commands_rx.recv() => {
                    // Handle dropped without stop
                    let Some(command) = command else { break };
                    if let Some(new_ticker) = self.handle_command(command) {
                        ticker = new_ticker;
                    }
                }
                Some(frame) = self.frames_rx.recv() => {
                    self.coordinator.push_frame(frame);
                }
                _ = ticker.tick() => self.on_tick(),
            }
        }

        // Pairs still buffered at shutdown are discarded
        let statistics = self.coordinator.stop();
        observability::record_sync_statistics(&statistics);
        let _ = self.events_tx.send(SyncEvent::Stopped {
            statistics: statistics.clone(),
        });
        info!(paired = statistics.paired, "Sync worker stopped");
        statistics
    }

    fn on_tick(&mut self) {
        self.coordinator.tick(self.clock.now());
        if self.coordinator.statistics_due() {
            let statistics = self.coordinator.statistics().clone();
            observability::record_sync_statistics(&statistics);
            let _ = self.events_tx.send(SyncEvent::Statistics(statistics));
        }
    }

    /// Apply a command; returns a replacement ticker when the window changed
    fn handle_command(&mut self, command: SyncCommand) -> Option<Interval> {
        match command {
            SyncCommand::SetSyncWindow {
                sync_window_ms,
                reply,
            } => {
                let result = self.coordinator.set_sync_window(sync_window_ms);
                let changed = result.is_ok();
                let _ = reply.send(result);
                changed.then(|| tick_interval(sync_window_ms))
            }
            SyncCommand::AdjustTargetLatency {
                target_latency_ms,
                reply,
            } => {
                let result = self
                    .coordinator
                    .adjust_target_latency(target_latency_ms, self.clock.now())
                    .map(|events| {
                        for event in events {
                            let _ = self.events_tx.send(event);
                        }
                    });
                if let Err(err) = &result {
                    warn!(error = %err, target_latency_ms, "Target latency rejected");
                }
                let _ = reply.send(result);
                None
            }
            SyncCommand::Diagnostics { reply } => {
                let _ = reply.send(self.coordinator.diagnostics());
                None
            }
        }
    }
}
