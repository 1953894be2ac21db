//! Dispatcher - fans pairs out to every sink

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{SinkConfig, SinkType, SynchronizedPair};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::SinkMetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Builds sink handles from configuration
pub struct DispatcherBuilder {
    sinks: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<SynchronizedPair>,
}

impl DispatcherBuilder {
    pub fn new(sinks: Vec<SinkConfig>, input_rx: mpsc::Receiver<SynchronizedPair>) -> Self {
        Self { sinks, input_rx }
    }

    #[instrument(name = "dispatcher_builder_build", skip(self), fields(sink_count = self.sinks.len()))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut names = HashSet::new();
        let mut handles = Vec::with_capacity(self.sinks.len());
        for config in &self.sinks {
            if !names.insert(config.name.as_str()) {
                return Err(DispatcherError::DuplicateSink {
                    name: config.name.clone(),
                });
            }
            handles.push(create_sink_handle(config).await?);
        }

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::spawn(
            LogSink::new(&config.name),
            config.queue_capacity,
        )),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Consumes pairs and hands a clone to each sink queue
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<SynchronizedPair>,
}

impl Dispatcher {
    pub fn with_handles(
        handles: Vec<SinkHandle>,
        input_rx: mpsc::Receiver<SynchronizedPair>,
    ) -> Self {
        Self { handles, input_rx }
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.name().to_string()).collect()
    }

    pub fn metrics(&self) -> Vec<(String, SinkMetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run until the input closes, then drain and close every sink
    ///
    /// Returns final per-sink metrics.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> Vec<(String, SinkMetricsSnapshot)> {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut pairs: u64 = 0;
        while let Some(pair) = self.input_rx.recv().await {
            pairs += 1;
            for handle in &self.handles {
                handle.try_send(pair.clone());
            }
            if pairs % 100 == 0 {
                debug!(pairs, "Dispatcher progress");
            }
        }

        info!(pairs, "Dispatcher input closed, shutting down");

        let mut report = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let name = handle.name().to_string();
            let metrics = handle.metrics().clone();
            handle.shutdown().await;
            report.push((name, metrics.snapshot()));
        }

        info!("Dispatcher shutdown complete");
        report
    }

    pub fn spawn(self) -> JoinHandle<Vec<(String, SinkMetricsSnapshot)>> {
        tokio::spawn(self.run())
    }
}

/// Build a dispatcher from sink configs
pub async fn create_dispatcher(
    sinks: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<SynchronizedPair>,
) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(sinks, input_rx).build().await
}
