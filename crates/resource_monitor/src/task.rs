//! Periodic sampling task.

use contracts::{
    duration_from_ms, ContractError, MonitorEvent, PerformanceSnapshot, SessionClock,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::activity::FrameActivity;
use crate::monitor::ResourceMonitor;

const EVENT_CAPACITY: usize = 128;

enum MonitorCommand {
    SetTargetFrameRate {
        frame_rate: f64,
        reply: oneshot::Sender<Result<(), ContractError>>,
    },
    History {
        reply: oneshot::Sender<Vec<PerformanceSnapshot>>,
    },
}

/// Handle to a running monitor task
pub struct MonitorHandle {
    commands_tx: mpsc::Sender<MonitorCommand>,
    events_tx: broadcast::Sender<MonitorEvent>,
    latest: watch::Receiver<Option<PerformanceSnapshot>>,
    activity: FrameActivity,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    #[instrument(name = "monitor_handle_spawn", skip_all)]
    pub fn spawn(monitor: ResourceMonitor, clock: SessionClock, cancel: CancellationToken) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (latest_tx, latest) = watch::channel(None);
        let activity = monitor.activity();

        let worker = MonitorWorker {
            monitor,
            clock,
            commands_rx,
            events_tx: events_tx.clone(),
            latest_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        Self {
            commands_tx,
            events_tx,
            latest,
            activity,
            cancel,
            task,
        }
    }

    /// Snapshot, threshold and status events
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events_tx.subscribe()
    }

    /// Most recent snapshot
    pub fn latest(&self) -> Option<PerformanceSnapshot> {
        self.latest.borrow().clone()
    }

    /// Watch channel of the most recent snapshot; keeps its last value
    /// after the task stops
    pub fn watch_latest(&self) -> watch::Receiver<Option<PerformanceSnapshot>> {
        self.latest.clone()
    }

    /// Counters to feed delivered frames into
    pub fn activity(&self) -> FrameActivity {
        self.activity.clone()
    }

    pub async fn set_target_frame_rate(&self, frame_rate: f64) -> Result<(), ContractError> {
        let (reply, rx) = oneshot::channel();
        self.commands_tx
            .send(MonitorCommand::SetTargetFrameRate { frame_rate, reply })
            .await
            .map_err(|_| not_running())?;
        rx.await.map_err(|_| not_running())?
    }

    /// Snapshot history, oldest first
    pub async fn history(&self) -> Result<Vec<PerformanceSnapshot>, ContractError> {
        let (reply, rx) = oneshot::channel();
        self.commands_tx
            .send(MonitorCommand::History { reply })
            .await
            .map_err(|_| not_running())?;
        rx.await.map_err(|_| not_running())
    }

    #[instrument(name = "monitor_handle_stop", skip(self))]
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

fn not_running() -> ContractError {
    ContractError::not_running("resource monitor")
}

struct MonitorWorker {
    monitor: ResourceMonitor,
    clock: SessionClock,
    commands_rx: mpsc::Receiver<MonitorCommand>,
    events_tx: broadcast::Sender<MonitorEvent>,
    latest_tx: watch::Sender<Option<PerformanceSnapshot>>,
    cancel: CancellationToken,
}

impl MonitorWorker {
    #[instrument(name = "monitor_worker_loop", skip(self))]
    async fn run(mut self) {
        let period = duration_from_ms(self.monitor.config().sample_interval_ms);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(?period, "Resource monitor started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                command = self.commands_rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command);
                }
                _ = ticker.tick() => self.on_tick(),
            }
        }

        debug!(samples = self.monitor.history().len(), "Resource monitor stopped");
    }

    fn on_tick(&mut self) {
        for event in self.monitor.sample(self.clock.now()) {
            if let MonitorEvent::Snapshot(snapshot) = &event {
                self.latest_tx.send_replace(Some(snapshot.clone()));
            }
            let _ = self.events_tx.send(event);
        }
    }

    fn handle_command(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::SetTargetFrameRate { frame_rate, reply } => {
                let _ = reply.send(self.monitor.set_target_frame_rate(frame_rate));
            }
            MonitorCommand::History { reply } => {
                let _ = reply.send(self.monitor.history().iter().cloned().collect());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ScriptedProbe;
    use contracts::{MonitorConfig, ResourceReadings, ThermalLevel};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            sample_interval_ms: 20.0,
            frame_rate_interval_ms: 20.0,
            thermal_interval_ms: 20.0,
            memory_interval_ms: 20.0,
            battery_interval_ms: 20.0,
            ..MonitorConfig::default()
        }
    }

    #[tokio::test]
    async fn publishes_snapshots_periodically() {
        let monitor =
            ResourceMonitor::new(fast_config(), Box::new(ScriptedProbe::nominal())).unwrap();
        let handle = MonitorHandle::spawn(monitor, SessionClock::new(), CancellationToken::new());
        let mut events = handle.subscribe();

        let mut snapshots = 0;
        while snapshots < 3 {
            let event = timeout(Duration::from_secs(1), events.recv())
                .await
                .unwrap()
                .unwrap();
            if matches!(event, MonitorEvent::Snapshot(_)) {
                snapshots += 1;
            }
        }

        assert!(handle.latest().is_some());
        let history = handle.history().await.unwrap();
        assert!(history.len() >= 3);
        assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        handle.stop().await;
    }

    #[tokio::test]
    async fn probe_changes_reach_latest_snapshot() {
        let probe = ScriptedProbe::nominal();
        let control = probe.control();
        let monitor = ResourceMonitor::new(fast_config(), Box::new(probe)).unwrap();
        let handle = MonitorHandle::spawn(monitor, SessionClock::new(), CancellationToken::new());

        control.set(ResourceReadings {
            thermal: ThermalLevel::Critical,
            ..ResourceReadings::default()
        });
        sleep(Duration::from_millis(100)).await;

        let latest = handle.latest().unwrap();
        assert_eq!(latest.thermal, ThermalLevel::Critical);
        handle.stop().await;
    }

    #[tokio::test]
    async fn last_snapshot_survives_stop() {
        let monitor =
            ResourceMonitor::new(fast_config(), Box::new(ScriptedProbe::nominal())).unwrap();
        let cancel = CancellationToken::new();
        let handle = MonitorHandle::spawn(monitor, SessionClock::new(), cancel.child_token());
        let latest = handle.watch_latest();

        sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        handle.stop().await;

        assert!(latest.borrow().is_some());
    }

    #[tokio::test]
    async fn target_frame_rate_is_validated() {
        let monitor =
            ResourceMonitor::new(fast_config(), Box::new(ScriptedProbe::nominal())).unwrap();
        let handle = MonitorHandle::spawn(monitor, SessionClock::new(), CancellationToken::new());

        assert!(handle.set_target_frame_rate(-1.0).await.is_err());
        handle.set_target_frame_rate(24.0).await.unwrap();
        handle.stop().await;
    }
}
