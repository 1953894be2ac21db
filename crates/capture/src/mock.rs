//! Mock camera source
//!
//! Produces frames on a tokio task at the configured rate. Reported
//! timestamps follow a simple timing model (constant offset, linear drift,
//! uniform jitter) so pairing and drift estimation see realistic input
//! without hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    CaptureConfiguration, Frame, FrameCallback, FramePayload, FrameSource, MockCameraConfig,
    SessionClock, StreamId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Smallest step between two reported timestamps of one stream
const MIN_TIMESTAMP_STEP: f64 = 1e-6;

/// Timestamp a camera with `timing` reports for a frame captured at `now`
pub fn reported_timestamp(timing: &MockCameraConfig, now: f64, jitter: f64) -> f64 {
    now + timing.offset_ms / 1000.0 + now * timing.drift_ppm * 1e-6 + jitter
}

/// Simulated camera feeding one stream
pub struct MockCamera {
    name: String,
    stream: StreamId,
    timing: MockCameraConfig,
    clock: SessionClock,
    configuration: watch::Sender<CaptureConfiguration>,
    listening: Arc<AtomicBool>,
    cancel: Mutex<Option<CancellationToken>>,
    seed: Option<u64>,
}

impl MockCamera {
    pub fn new(
        stream: StreamId,
        timing: MockCameraConfig,
        configuration: CaptureConfiguration,
        clock: SessionClock,
    ) -> Self {
        let (configuration, _) = watch::channel(configuration);
        Self {
            name: format!("mock_{stream}"),
            stream,
            timing,
            clock,
            configuration,
            listening: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(None),
            seed: None,
        }
    }

    /// Fixed RNG seed for reproducible jitter and drops
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn timing(&self) -> &MockCameraConfig {
        &self.timing
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

impl FrameSource for MockCamera {
    fn stream(&self) -> StreamId {
        self.stream
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&self, callback: FrameCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(source = %self.name, "Mock camera needs a tokio runtime");
            self.listening.store(false, Ordering::SeqCst);
            return;
        };

        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());

        let producer = Producer {
            name: self.name.clone(),
            stream: self.stream,
            timing: self.timing.clone(),
            clock: self.clock,
            configuration: self.configuration.subscribe(),
            payload: Bytes::from(vec![0u8; self.timing.payload_bytes]),
            rng: self.rng(),
            sequence: 0,
            last_timestamp: f64::NEG_INFINITY,
            callback,
            listening: self.listening.clone(),
            cancel,
        };
        runtime.spawn(producer.run());
    }

    fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(source = %self.name, "Stopping mock camera");
        }
        if let Some(cancel) = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            cancel.cancel();
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    fn apply_configuration(&self, configuration: &CaptureConfiguration) {
        let previous = self.configuration.send_replace(*configuration);
        if previous != *configuration {
            debug!(
                source = %self.name,
                from = %previous,
                to = %configuration,
                "Mock camera reconfigured"
            );
        }
    }

    fn configuration(&self) -> CaptureConfiguration {
        *self.configuration.borrow()
    }
}

impl Drop for MockCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Producer {
    name: String,
    stream: StreamId,
    timing: MockCameraConfig,
    clock: SessionClock,
    configuration: watch::Receiver<CaptureConfiguration>,
    payload: Bytes,
    rng: StdRng,
    sequence: u64,
    last_timestamp: f64,
    callback: FrameCallback,
    listening: Arc<AtomicBool>,
    cancel: CancellationToken,
}

fn frame_ticker(frame_rate: u32) -> Interval {
    let period = Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1)));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

impl Producer {
    async fn run(mut self) {
        let mut current = *self.configuration.borrow_and_update();
        let mut ticker = frame_ticker(current.frame_rate);
        debug!(source = %self.name, configuration = %current, "Mock camera started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                changed = self.configuration.changed() => {
                    // Camera handle dropped
                    if changed.is_err() {
                        break;
                    }
                    let next = *self.configuration.borrow_and_update();
                    if next.frame_rate != current.frame_rate {
                        ticker = frame_ticker(next.frame_rate);
                    }
                    current = next;
                }
                _ = ticker.tick() => self.capture(&current),
            }
        }

        self.listening.store(false, Ordering::SeqCst);
        debug!(source = %self.name, frames = self.sequence, "Mock camera stopped");
    }

    fn capture(&mut self, configuration: &CaptureConfiguration) {
        let sequence = self.sequence;
        self.sequence += 1;

        if self.timing.drop_probability > 0.0 && self.rng.random_bool(self.timing.drop_probability)
        {
            metrics::counter!("dualcam_capture_skipped_total", "stream" => self.stream.as_str())
                .increment(1);
            trace!(source = %self.name, sequence, "Frame skipped");
            return;
        }

        let amplitude = self.timing.jitter_ms / 1000.0;
        let jitter = if amplitude > 0.0 {
            self.rng.random_range(-amplitude..=amplitude)
        } else {
            0.0
        };
        let timestamp = reported_timestamp(&self.timing, self.clock.now(), jitter)
            .max(self.last_timestamp + MIN_TIMESTAMP_STEP)
            .max(0.0);
        self.last_timestamp = timestamp;

        let frame = Frame {
            stream: self.stream,
            timestamp,
            sequence,
            payload: FramePayload {
                width: configuration.resolution.width(),
                height: configuration.resolution.height(),
                data: self.payload.clone(),
            },
        };
        trace!(source = %self.name, sequence, timestamp, "Frame captured");
        (self.callback)(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Resolution;

    fn collector() -> (FrameCallback, Arc<Mutex<Vec<Frame>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();
        let callback: FrameCallback = Arc::new(move |frame| sink.lock().unwrap().push(frame));
        (callback, frames)
    }

    fn configuration(frame_rate: u32) -> CaptureConfiguration {
        CaptureConfiguration {
            frame_rate,
            ..CaptureConfiguration::default()
        }
    }

    #[test]
    fn timing_model_applies_offset_and_drift() {
        let timing = MockCameraConfig {
            offset_ms: 3.0,
            drift_ppm: 100.0,
            ..MockCameraConfig::default()
        };
        let ts = reported_timestamp(&timing, 10.0, 0.0);
        assert!((ts - 10.004).abs() < 1e-9);
    }

    #[tokio::test]
    async fn produces_ordered_frames() {
        let camera = MockCamera::new(
            StreamId::Back,
            MockCameraConfig {
                jitter_ms: 2.0,
                payload_bytes: 16,
                ..MockCameraConfig::default()
            },
            configuration(100),
            SessionClock::new(),
        )
        .with_seed(7);
        let (callback, frames) = collector();

        camera.listen(callback);
        assert!(camera.is_listening());
        tokio::time::sleep(Duration::from_millis(150)).await;
        camera.stop();
        assert!(!camera.is_listening());

        let frames = frames.lock().unwrap().clone();
        assert!(frames.len() >= 5);
        assert!(frames.iter().all(|f| f.stream == StreamId::Back));
        assert!(frames.iter().all(|f| f.payload.data.len() == 16));
        assert!(frames.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(frames.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[tokio::test]
    async fn stop_halts_production() {
        let camera = MockCamera::new(
            StreamId::Front,
            MockCameraConfig::default(),
            configuration(200),
            SessionClock::new(),
        );
        let (callback, frames) = collector();
        camera.listen(callback);
        tokio::time::sleep(Duration::from_millis(50)).await;
        camera.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let count = frames.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(frames.lock().unwrap().len(), count);
    }

    #[tokio::test]
    async fn reconfiguration_takes_effect_live() {
        let camera = MockCamera::new(
            StreamId::Front,
            MockCameraConfig::default(),
            configuration(100),
            SessionClock::new(),
        );
        let (callback, frames) = collector();
        camera.listen(callback);
        tokio::time::sleep(Duration::from_millis(40)).await;

        let reduced = CaptureConfiguration {
            resolution: Resolution::Hd720,
            frame_rate: 50,
            ..CaptureConfiguration::default()
        };
        camera.apply_configuration(&reduced);
        assert_eq!(camera.configuration(), reduced);
        tokio::time::sleep(Duration::from_millis(60)).await;
        camera.stop();

        let frames = frames.lock().unwrap();
        let last = frames.last().unwrap();
        assert_eq!(last.payload.width, 1280);
        assert_eq!(last.payload.height, 720);
    }

    #[tokio::test]
    async fn certain_drop_produces_nothing() {
        let camera = MockCamera::new(
            StreamId::Front,
            MockCameraConfig {
                drop_probability: 1.0,
                ..MockCameraConfig::default()
            },
            configuration(200),
            SessionClock::new(),
        );
        let (callback, frames) = collector();
        camera.listen(callback);
        tokio::time::sleep(Duration::from_millis(50)).await;
        camera.stop();
        assert!(frames.lock().unwrap().is_empty());
    }

    #[test]
    fn listen_without_runtime_stays_idle() {
        let camera = MockCamera::new(
            StreamId::Front,
            MockCameraConfig::default(),
            configuration(30),
            SessionClock::new(),
        );
        let (callback, _) = collector();
        camera.listen(callback);
        assert!(!camera.is_listening());
    }
}
