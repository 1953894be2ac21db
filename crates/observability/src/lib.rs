//! # Observability
//!
//! Tracing initialisation and Prometheus metrics for the dual-camera
//! pipeline.
//!
//! - [`init_with_config`]: subscriber (JSON / pretty / compact) plus optional exporter
//! - [`init_metrics_only`]: exporter for callers that already own a subscriber
//! - [`metrics`]: pair, snapshot and adaptation recorders plus the run summary
//!
//! ## Example
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig {
//!     log_format: LogFormat::Compact,
//!     metrics_port: None,
//!     ..ObservabilityConfig::default()
//! })?;
//!
//! while let Some(pair) = pairs.recv().await {
//!     aggregator.update(&pair);
//! }
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

pub use crate::metrics::{
    record_adaptation, record_buffer_depth, record_clock_report, record_drift,
    record_frame_received, record_frames_evicted, record_pair_dispatched, record_pair_metrics,
    record_snapshot, record_sync_statistics, record_threshold_event, MetricsSummary,
    RunningStats, StatsSummary, SyncMetricsAggregator,
};

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON with thread and source location
    #[default]
    Json,
    Pretty,
    /// Single line per event
    Compact,
}

/// JSON logs and Prometheus on 0.0.0.0:9000
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Install the tracing subscriber, then the exporter if a port is set
///
/// `RUST_LOG` takes precedence over `default_log_level`.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    tracing_subscriber::registry()
        .with(fmt_layer(config.log_format))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        install_exporter(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// Install only the Prometheus exporter
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_exporter(port)
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

fn install_exporter(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on port {port}"))?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}
