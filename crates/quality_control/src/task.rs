//! Controller task driven by monitor events.

use contracts::{AdaptationDecision, ContractError, MonitorEvent, PerformanceSnapshot};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::controller::QualityController;

const DECISION_CAPACITY: usize = 32;

enum ControllerCommand {
    /// Forced evaluation against the latest snapshot
    Force {
        reply: oneshot::Sender<Result<AdaptationDecision, ContractError>>,
    },
}

/// Handle to a running controller task
pub struct ControllerHandle {
    commands_tx: mpsc::Sender<ControllerCommand>,
    decisions_tx: broadcast::Sender<AdaptationDecision>,
    latest: watch::Receiver<Option<AdaptationDecision>>,
    cancel: CancellationToken,
    task: JoinHandle<QualityController>,
}

impl ControllerHandle {
    #[instrument(name = "controller_handle_spawn", skip_all)]
    pub fn spawn(
        controller: QualityController,
        events: broadcast::Receiver<MonitorEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let (decisions_tx, _) = broadcast::channel(DECISION_CAPACITY);
        let (latest_tx, latest) = watch::channel(None);

        let worker = ControllerWorker {
            controller,
            events,
            commands_rx,
            decisions_tx: decisions_tx.clone(),
            latest_tx,
            last_snapshot: None,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        Self {
            commands_tx,
            decisions_tx,
            latest,
            cancel,
            task,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AdaptationDecision> {
        self.decisions_tx.subscribe()
    }

    /// Most recent decision; stays readable after the task stops
    pub fn latest(&self) -> Option<AdaptationDecision> {
        self.latest.borrow().clone()
    }

    pub fn watch_latest(&self) -> watch::Receiver<Option<AdaptationDecision>> {
        self.latest.clone()
    }

    /// Force an evaluation, bypassing cooldown
    ///
    /// # Errors
    /// `NotRunning` when the task is gone or no snapshot has arrived yet.
    pub async fn force(&self) -> Result<AdaptationDecision, ContractError> {
        let (reply, rx) = oneshot::channel();
        self.commands_tx
            .send(ControllerCommand::Force { reply })
            .await
            .map_err(|_| not_running())?;
        rx.await.map_err(|_| not_running())?
    }

    /// Stop the task and hand back the controller
    #[instrument(name = "controller_handle_stop", skip(self))]
    pub async fn stop(self) -> Option<QualityController> {
        self.cancel.cancel();
        self.task.await.ok()
    }
}

fn not_running() -> ContractError {
    ContractError::not_running("quality controller")
}

struct ControllerWorker {
    controller: QualityController,
    events: broadcast::Receiver<MonitorEvent>,
    commands_rx: mpsc::Receiver<ControllerCommand>,
    decisions_tx: broadcast::Sender<AdaptationDecision>,
    latest_tx: watch::Sender<Option<AdaptationDecision>>,
    last_snapshot: Option<PerformanceSnapshot>,
    cancel: CancellationToken,
}

impl ControllerWorker {
    #[instrument(name = "controller_worker_loop", skip(self))]
    async fn run(mut self) -> QualityController {
        debug!(level = %self.controller.current_level().name, "Quality controller started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                command = self.commands_rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command);
                }
                event = self.events.recv() => match event {
                    Ok(MonitorEvent::Snapshot(snapshot)) => self.on_snapshot(snapshot),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Controller lagged behind monitor events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        debug!(level = %self.controller.current_level().name, "Quality controller stopped");
        self.controller
    }

    fn on_snapshot(&mut self, snapshot: PerformanceSnapshot) {
        if let Some(decision) = self.controller.on_snapshot(&snapshot) {
            self.publish(decision);
        }
        self.last_snapshot = Some(snapshot);
    }

    fn handle_command(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Force { reply } => {
                let result = match &self.last_snapshot {
                    Some(snapshot) => {
                        let decision = self.controller.force(snapshot);
                        self.publish(decision.clone());
                        Ok(decision)
                    }
                    None => Err(ContractError::not_running(
                        "quality controller (no snapshot yet)",
                    )),
                };
                let _ = reply.send(result);
            }
        }
    }

    fn publish(&mut self, decision: AdaptationDecision) {
        self.latest_tx.send_replace(Some(decision.clone()));
        let _ = self.decisions_tx.send(decision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::QualityCatalog;
    use contracts::{AdaptationReason, CaptureConfiguration, ControllerConfig};
    use std::time::Duration;
    use tokio::time::timeout;

    fn spawn() -> (broadcast::Sender<MonitorEvent>, ControllerHandle) {
        let controller = QualityController::new(
            ControllerConfig::default(),
            QualityCatalog::builtin(),
            CaptureConfiguration::default(),
        )
        .unwrap();
        let (events_tx, events_rx) = broadcast::channel(16);
        let handle = ControllerHandle::spawn(controller, events_rx, CancellationToken::new());
        (events_tx, handle)
    }

    fn snapshot(timestamp: f64, composite: f64) -> MonitorEvent {
        MonitorEvent::Snapshot(PerformanceSnapshot {
            composite_score: composite,
            ..PerformanceSnapshot::healthy(timestamp, 30.0)
        })
    }

    #[tokio::test]
    async fn degraded_snapshot_publishes_decision() {
        let (events_tx, handle) = spawn();
        let mut decisions = handle.subscribe();

        events_tx.send(snapshot(0.0, 0.95)).unwrap();
        events_tx.send(snapshot(1.0, 0.5)).unwrap();

        let decision = timeout(Duration::from_secs(1), decisions.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.reason, AdaptationReason::Degraded);
        assert_eq!(decision.level.name, "efficient");

        let latest = handle.watch_latest();
        let controller = handle.stop().await.unwrap();
        assert_eq!(controller.current_level().name, "efficient");
        assert_eq!(latest.borrow().as_ref().unwrap().level.name, "efficient");
    }

    #[tokio::test]
    async fn force_uses_latest_snapshot() {
        let (events_tx, handle) = spawn();
        assert!(handle.force().await.is_err());

        let mut decisions = handle.subscribe();
        events_tx.send(snapshot(0.0, 0.95)).unwrap();
        // Healthy snapshot publishes nothing; wait until the worker has seen it
        tokio::time::sleep(Duration::from_millis(50)).await;

        let decision = handle.force().await.unwrap();
        assert!(decision.forced);
        assert_eq!(decision.reason, AdaptationReason::Forced);
        assert_eq!(decision.snapshot.timestamp, 0.0);
        assert!(decisions.try_recv().is_ok());

        handle.stop().await;
    }

    #[tokio::test]
    async fn closed_event_stream_ends_task() {
        let (events_tx, handle) = spawn();
        drop(events_tx);
        let controller = timeout(Duration::from_secs(1), handle.stop())
            .await
            .unwrap();
        assert!(controller.is_some());
    }
}
