//! # Integration Tests
//!
//! End-to-end tests across crates.
//!
//! Covers:
//! - Contract and configuration smoke tests
//! - capture → coordinator → dispatcher data path
//! - monitor → controller control path

#[cfg(test)]
mod contract_tests {
    use contracts::PipelineBlueprint;

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_default_blueprint_validates() {
        let blueprint = PipelineBlueprint::with_log_sink();
        config_loader::validate(&blueprint).unwrap();
        assert_eq!(config_loader::build_catalog(&blueprint).unwrap().len(), 5);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;

    use capture::{BackpressureConfig, CapturePipeline, MockCamera, MockClockDevice};
    use contracts::{
        CaptureConfiguration, ClockConfig, ClockMode, ControllerConfig, FrameSource,
        MockCameraConfig, MonitorConfig, PerformanceStatus, ResourceReadings, Resolution,
        SessionClock, SinkConfig, SinkType, StreamId, SyncCoordinatorConfig, SyncEvent,
        SynchronizedPair, ThermalLevel,
    };
    use dispatcher::create_dispatcher;
    use observability::SyncMetricsAggregator;
    use quality_control::{ControllerHandle, QualityCatalog, QualityController};
    use resource_monitor::{MonitorHandle, ResourceMonitor, ScriptedProbe};
    use sync_engine::{select_clock, FrameSyncCoordinator, SyncHandle};
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    fn camera_timing(offset_ms: f64) -> MockCameraConfig {
        MockCameraConfig {
            offset_ms,
            jitter_ms: 0.5,
            ..MockCameraConfig::default()
        }
    }

    fn capture_configuration(frame_rate: u32) -> CaptureConfiguration {
        CaptureConfiguration {
            frame_rate,
            ..CaptureConfiguration::default()
        }
    }

    fn spawn_sync(
        clock: SessionClock,
        front: &MockCameraConfig,
        back: &MockCameraConfig,
    ) -> SyncHandle {
        let device = MockClockDevice::new(clock, front.clone(), back.clone());
        let clock_sync = select_clock(&ClockConfig::default(), Some(Box::new(device))).unwrap();
        let coordinator =
            FrameSyncCoordinator::new(SyncCoordinatorConfig::default(), clock_sync).unwrap();
        SyncHandle::spawn(coordinator, clock, CancellationToken::new())
    }

    /// End-to-end: MockCamera x2 -> CapturePipeline -> SyncHandle -> Dispatcher
    #[tokio::test]
    async fn test_e2e_capture_to_file_journal() {
        let clock = SessionClock::new();
        let front = camera_timing(0.0);
        let back = camera_timing(3.0);

        let mut capture = CapturePipeline::new(BackpressureConfig::default());
        capture
            .register(Box::new(
                MockCamera::new(StreamId::Front, front.clone(), capture_configuration(60), clock)
                    .with_seed(1),
            ))
            .unwrap();
        capture
            .register(Box::new(
                MockCamera::new(StreamId::Back, back.clone(), capture_configuration(60), clock)
                    .with_seed(2),
            ))
            .unwrap();
        let frames_rx = capture.take_receiver().unwrap();

        let mut sync = spawn_sync(clock, &front, &back);
        let mut events = sync.subscribe();
        // Calibration runs inside spawn, so its events are already queued
        let mut started = None;
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::Started { clock } = event {
                started = Some(clock);
            }
        }
        assert_eq!(started.unwrap().mode, ClockMode::Hardware);

        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("pairs.jsonl");
        let (pair_tx, pair_rx) = mpsc::channel::<SynchronizedPair>(100);
        let sink_configs = vec![
            SinkConfig {
                name: "journal".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 100,
                params: HashMap::from([("path".to_string(), journal.display().to_string())]),
            },
            SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 100,
                params: HashMap::new(),
            },
        ];
        let dispatcher_handle = create_dispatcher(sink_configs, pair_rx)
            .await
            .unwrap()
            .spawn();

        capture.start().unwrap();
        let push = sync.frame_callback();
        let forward = tokio::spawn(async move {
            while let Ok(frame) = frames_rx.recv().await {
                push(frame);
            }
        });

        let target_pairs = 10usize;
        let pairs = sync.pairs();
        let mut collected = Vec::new();
        let result = timeout(Duration::from_secs(5), async {
            while collected.len() < target_pairs {
                let Some(pair) = pairs.recv().await else { break };
                pair_tx.send(pair.clone()).await.unwrap();
                collected.push(pair);
            }
        })
        .await;

        capture.stop();
        drop(capture);
        let statistics = sync.stop().await.unwrap();
        drop(pair_tx);
        let sinks = timeout(Duration::from_secs(2), dispatcher_handle)
            .await
            .unwrap()
            .unwrap();
        forward.abort();

        assert!(result.is_ok(), "Pipeline timed out");
        assert_eq!(collected.len(), target_pairs);

        // Every pair is within the window and no frame is reused
        let window = SyncCoordinatorConfig::default().sync_window_ms / 1000.0;
        let mut front_seen = HashSet::new();
        let mut back_seen = HashSet::new();
        for pair in &collected {
            assert!((pair.front.timestamp - pair.back.timestamp).abs() <= window + 1e-9);
            assert!(front_seen.insert(pair.front.sequence));
            assert!(back_seen.insert(pair.back.sequence));
        }
        assert!(collected.windows(2).all(|w| w[0].pair_id < w[1].pair_id));

        let mut aggregator = SyncMetricsAggregator::new();
        collected.iter().for_each(|pair| aggregator.update(pair));
        aggregator.update_statistics(&statistics);
        let summary = aggregator.summary();
        assert_eq!(summary.total_pairs, target_pairs as u64);
        assert!(statistics.paired >= target_pairs as u64);

        let (name, journal_metrics) = sinks.iter().find(|(name, _)| name == "journal").unwrap();
        assert_eq!(name, "journal");
        assert_eq!(journal_metrics.written, target_pairs as u64);
        let content = std::fs::read_to_string(&journal).unwrap();
        let records: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), target_pairs);
        assert_eq!(records[0]["pair_id"], collected[0].pair_id);
    }

    /// Cameras feed the coordinator directly through its frame callback
    #[tokio::test]
    async fn test_cameras_listen_into_coordinator() {
        let clock = SessionClock::new();
        let front = camera_timing(0.0);
        let back = camera_timing(3.0);
        let sync = spawn_sync(clock, &front, &back);

        let front_camera =
            MockCamera::new(StreamId::Front, front.clone(), capture_configuration(100), clock);
        let back_camera =
            MockCamera::new(StreamId::Back, back.clone(), capture_configuration(100), clock);
        front_camera.listen(sync.frame_callback());
        back_camera.listen(sync.frame_callback());

        let pairs = sync.pairs();
        let pair = timeout(Duration::from_secs(2), pairs.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pair.front.stream, StreamId::Front);
        assert_eq!(pair.back.stream, StreamId::Back);

        // Offset is fixed, so drift history settles near 3ms
        tokio::time::sleep(Duration::from_millis(200)).await;
        let diagnostics = sync.diagnostics().await.unwrap();
        assert!(diagnostics.statistics.paired > 0);
        assert!(diagnostics.drift.average_drift.abs() < 0.006);

        front_camera.stop();
        back_camera.stop();
        let statistics = sync.stop().await.unwrap();
        assert!(statistics.sync_rate > 0.0);
    }

    fn fast_monitor_config() -> MonitorConfig {
        MonitorConfig {
            sample_interval_ms: 20.0,
            frame_rate_interval_ms: 20.0,
            thermal_interval_ms: 20.0,
            memory_interval_ms: 20.0,
            battery_interval_ms: 20.0,
            ..MonitorConfig::default()
        }
    }

    fn spawn_control_path() -> (MonitorHandle, ControllerHandle, resource_monitor::ProbeControl) {
        let clock = SessionClock::new();
        let probe = ScriptedProbe::nominal();
        let control = probe.control();
        let monitor = ResourceMonitor::new(fast_monitor_config(), Box::new(probe)).unwrap();
        let monitor = MonitorHandle::spawn(monitor, clock, CancellationToken::new());

        let controller = QualityController::new(
            ControllerConfig {
                cooldown_ms: 0.0,
                ..ControllerConfig::default()
            },
            QualityCatalog::builtin(),
            CaptureConfiguration::default(),
        )
        .unwrap();
        let controller =
            ControllerHandle::spawn(controller, monitor.subscribe(), CancellationToken::new());
        (monitor, controller, control)
    }

    /// Critical thermal and battery readings drive the controller to the floor
    #[tokio::test]
    async fn test_critical_readings_cascade_to_minimal() {
        let (monitor, controller, control) = spawn_control_path();
        let mut decisions = controller.subscribe();

        control.set(ResourceReadings {
            memory_usage: 0.5,
            thermal: ThermalLevel::Critical,
            battery_level: 0.05,
        });

        let decision = timeout(Duration::from_secs(3), async {
            loop {
                let decision = decisions.recv().await.unwrap();
                if decision.level.name == "minimal" {
                    return decision;
                }
            }
        })
        .await
        .expect("controller never reached the minimal level");

        assert_eq!(decision.snapshot.status, PerformanceStatus::Critical);
        assert_eq!(decision.configuration.resolution, Resolution::Hd720);
        assert_eq!(decision.configuration.frame_rate, 24);

        monitor.stop().await;
        let controller = controller.stop().await.unwrap();
        assert_eq!(controller.current_level().name, "minimal");
    }

    /// A forced evaluation uses the latest snapshot the monitor published
    #[tokio::test]
    async fn test_forced_evaluation_after_first_snapshot() {
        let (monitor, controller, _control) = spawn_control_path();
        let mut latest = monitor.watch_latest();

        timeout(Duration::from_secs(2), latest.wait_for(Option::is_some))
            .await
            .unwrap()
            .unwrap();
        // Give the controller task a moment to consume the same snapshot
        tokio::time::sleep(Duration::from_millis(50)).await;

        let decision = controller.force().await.unwrap();
        assert!(decision.forced);
        assert_eq!(controller.latest().unwrap().timestamp, decision.timestamp);

        monitor.stop().await;
        controller.stop().await;
    }
}
