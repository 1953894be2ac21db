//! SinkHandle - one sink behind its own bounded queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{PairSink, SynchronizedPair};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
///
/// A slow or failing sink only loses its own pairs; it never blocks the
/// dispatcher or other sinks.
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<SynchronizedPair>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    pub fn spawn<S: PairSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = tokio::spawn(sink_worker(sink, rx, metrics.clone(), name.clone()));

        Self {
            name,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a pair without waiting; false when it was dropped
    pub fn try_send(&self, pair: SynchronizedPair) -> bool {
        match self.tx.try_send(pair) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(pair)) => {
                self.metrics.record_dropped();
                warn!(sink = %self.name, pair_id = pair.pair_id, "Sink queue full, pair dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Drain the queue, then flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "Sink worker panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

#[instrument(name = "sink_worker_loop", skip(sink, rx, metrics), fields(sink = %name))]
async fn sink_worker<S: PairSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<SynchronizedPair>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("Sink worker started");

    while let Some(pair) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&pair).await {
            Ok(()) => {
                metrics.record_written();
                observability::record_pair_dispatched(&name, true);
            }
            Err(e) => {
                metrics.record_failed();
                observability::record_pair_dispatched(&name, false);
                error!(pair_id = pair.pair_id, error = %e, "Sink write failed");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "Close failed on shutdown");
    }

    debug!(written = metrics.written(), "Sink worker stopped");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::tests::sample_pair;
    use contracts::ContractError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    /// Sink counting writes, optionally slow or failing
    pub(crate) struct CountingSink {
        pub name: String,
        pub writes: Arc<AtomicU64>,
        pub fail: bool,
        pub delay_ms: u64,
    }

    impl CountingSink {
        pub fn new(name: &str) -> (Self, Arc<AtomicU64>) {
            let writes = Arc::new(AtomicU64::new(0));
            (
                Self {
                    name: name.to_string(),
                    writes: writes.clone(),
                    fail: false,
                    delay_ms: 0,
                },
                writes,
            )
        }
    }

    impl PairSink for CountingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _pair: &SynchronizedPair) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.writes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn shutdown_drains_queue() {
        let (sink, writes) = CountingSink::new("test");
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..5 {
            assert!(handle.try_send(sample_pair(i, i as f64)));
        }

        let metrics = handle.metrics().clone();
        handle.shutdown().await;
        assert_eq!(writes.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.written(), 5);
    }

    #[tokio::test]
    async fn full_queue_drops_pairs() {
        let (mut sink, _) = CountingSink::new("slow");
        sink.delay_ms = 100;
        let handle = SinkHandle::spawn(sink, 2);

        for i in 0..10 {
            handle.try_send(sample_pair(i, i as f64));
        }

        assert!(handle.metrics().dropped() > 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let (mut sink, _) = CountingSink::new("failing");
        sink.fail = true;
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..3 {
            handle.try_send(sample_pair(i, i as f64));
        }
        sleep(Duration::from_millis(50)).await;

        assert_eq!(handle.metrics().failed(), 3);
        handle.shutdown().await;
    }
}
