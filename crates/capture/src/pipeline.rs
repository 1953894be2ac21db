//! Capture pipeline: both frame sources merged into one channel.

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{CaptureConfiguration, Frame, FrameCallback, FrameSource, StreamId};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{BackpressureConfig, CaptureMetrics};
use crate::error::{CaptureError, Result};

/// Front and back sources feeding one bounded frame channel
pub struct CapturePipeline {
    sources: [Option<Box<dyn FrameSource>>; 2],
    metrics: Arc<CaptureMetrics>,
    tx: Sender<Frame>,
    rx: Option<Receiver<Frame>>,
}

fn slot(stream: StreamId) -> usize {
    match stream {
        StreamId::Front => 0,
        StreamId::Back => 1,
    }
}

impl CapturePipeline {
    pub fn new(config: BackpressureConfig) -> Self {
        let (tx, rx) = bounded(config.channel_capacity.max(1));
        Self {
            sources: [None, None],
            metrics: Arc::new(CaptureMetrics::new()),
            tx,
            rx: Some(rx),
        }
    }

    /// Register the source for its stream
    #[instrument(
        name = "capture_register_source",
        skip(self, source),
        fields(stream = %source.stream(), name = %source.name())
    )]
    pub fn register(&mut self, source: Box<dyn FrameSource>) -> Result<()> {
        let entry = &mut self.sources[slot(source.stream())];
        if let Some(existing) = entry.as_ref() {
            return Err(CaptureError::DuplicateStream {
                stream: existing.stream(),
                name: existing.name().to_string(),
            });
        }
        debug!("Registered frame source");
        *entry = Some(source);
        Ok(())
    }

    /// Start both sources
    ///
    /// # Errors
    /// A stream has no source, or the pipeline is already running.
    #[instrument(name = "capture_start", skip(self))]
    pub fn start(&self) -> Result<()> {
        for stream in StreamId::ALL {
            let source = self.source(stream).ok_or(CaptureError::MissingStream { stream })?;
            if source.is_listening() {
                return Err(CaptureError::AlreadyRunning);
            }
        }

        for source in self.sources.iter().flatten() {
            info!(stream = %source.stream(), name = %source.name(), "Starting frame source");
            source.listen(self.callback(source.stream()));
        }
        Ok(())
    }

    #[instrument(name = "capture_stop", skip(self))]
    pub fn stop(&self) {
        for source in self.sources.iter().flatten() {
            if source.is_listening() {
                debug!(stream = %source.stream(), "Stopping frame source");
                source.stop();
            }
        }
    }

    /// Push a configuration to both sources
    pub fn apply_configuration(&self, configuration: &CaptureConfiguration) {
        for source in self.sources.iter().flatten() {
            source.apply_configuration(configuration);
        }
    }

    pub fn source(&self, stream: StreamId) -> Option<&dyn FrameSource> {
        self.sources[slot(stream)].as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.sources
            .iter()
            .flatten()
            .any(|source| source.is_listening())
    }

    /// Merged frame stream; only the first call returns it
    pub fn take_receiver(&mut self) -> Option<Receiver<Frame>> {
        self.rx.take()
    }

    pub fn metrics(&self) -> Arc<CaptureMetrics> {
        self.metrics.clone()
    }

    fn callback(&self, stream: StreamId) -> FrameCallback {
        let tx = self.tx.clone();
        let metrics = self.metrics.clone();
        Arc::new(move |frame: Frame| {
            metrics.record_received(stream);
            match tx.try_send(frame) {
                Ok(()) => {
                    metrics.update_queue_len(tx.len());
                    trace!(%stream, "Frame queued");
                }
                Err(TrySendError::Full(frame)) => {
                    metrics.record_dropped(stream);
                    metrics::counter!("dualcam_ingress_dropped_total", "stream" => stream.as_str())
                        .increment(1);
                    warn!(%stream, sequence = frame.sequence, "Frame channel full, dropping newest");
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(%stream, "Frame channel closed");
                }
            }
        })
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCamera;
    use contracts::{MockCameraConfig, SessionClock};
    use std::time::Duration;

    fn camera(stream: StreamId, frame_rate: u32) -> Box<dyn FrameSource> {
        Box::new(MockCamera::new(
            stream,
            MockCameraConfig::default(),
            CaptureConfiguration {
                frame_rate,
                ..CaptureConfiguration::default()
            },
            SessionClock::new(),
        ))
    }

    #[test]
    fn take_receiver_once() {
        let mut pipeline = CapturePipeline::new(BackpressureConfig::default());
        assert!(pipeline.take_receiver().is_some());
        assert!(pipeline.take_receiver().is_none());
    }

    #[test]
    fn duplicate_stream_rejected() {
        let mut pipeline = CapturePipeline::new(BackpressureConfig::default());
        pipeline.register(camera(StreamId::Front, 30)).unwrap();
        let err = pipeline.register(camera(StreamId::Front, 30)).unwrap_err();
        assert!(matches!(err, CaptureError::DuplicateStream { .. }));
    }

    #[test]
    fn start_requires_both_streams() {
        let mut pipeline = CapturePipeline::new(BackpressureConfig::default());
        pipeline.register(camera(StreamId::Front, 30)).unwrap();
        let err = pipeline.start().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::MissingStream {
                stream: StreamId::Back
            }
        ));
    }

    #[tokio::test]
    async fn merges_both_streams() {
        let mut pipeline = CapturePipeline::new(BackpressureConfig::default());
        pipeline.register(camera(StreamId::Front, 100)).unwrap();
        pipeline.register(camera(StreamId::Back, 100)).unwrap();
        let rx = pipeline.take_receiver().unwrap();

        pipeline.start().unwrap();
        assert!(pipeline.is_running());
        assert!(matches!(pipeline.start(), Err(CaptureError::AlreadyRunning)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        pipeline.stop();
        assert!(!pipeline.is_running());

        let mut seen = [0usize; 2];
        while let Ok(frame) = rx.try_recv() {
            seen[slot(frame.stream)] += 1;
        }
        assert!(seen[0] > 0 && seen[1] > 0);
        assert_eq!(pipeline.metrics().snapshot().dropped(), 0);
    }

    #[tokio::test]
    async fn full_channel_drops_newest() {
        let mut pipeline = CapturePipeline::new(BackpressureConfig {
            channel_capacity: 2,
        });
        pipeline.register(camera(StreamId::Front, 200)).unwrap();
        pipeline.register(camera(StreamId::Back, 200)).unwrap();
        let rx = pipeline.take_receiver().unwrap();

        pipeline.start().unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        pipeline.stop();

        let snapshot = pipeline.metrics().snapshot();
        assert!(snapshot.dropped() > 0);
        assert_eq!(rx.len(), 2);
        assert_eq!(snapshot.received() - snapshot.dropped(), 2);
    }

    #[tokio::test]
    async fn configuration_reaches_both_sources() {
        let mut pipeline = CapturePipeline::new(BackpressureConfig::default());
        pipeline.register(camera(StreamId::Front, 30)).unwrap();
        pipeline.register(camera(StreamId::Back, 30)).unwrap();

        let reduced = CaptureConfiguration {
            frame_rate: 24,
            ..CaptureConfiguration::default()
        };
        pipeline.apply_configuration(&reduced);
        for stream in StreamId::ALL {
            assert_eq!(pipeline.source(stream).unwrap().configuration(), reduced);
        }
    }
}
