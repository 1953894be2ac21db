//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let blueprint = load_blueprint(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to build default configuration".to_string(),
    })?;

    info!(
        base = %blueprint.capture.base,
        sync_window_ms = blueprint.sync.sync_window_ms,
        shared_clock = blueprint.capture.shared_clock,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        max_pairs: (args.max_pairs > 0).then_some(args.max_pairs),
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        seed: args.seed,
    };

    let shutdown = CancellationToken::new();
    let signal_guard = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping pipeline...");
        signal_guard.cancel();
    });

    info!("Starting pipeline...");
    let stats = Pipeline::new(pipeline_config)
        .run(shutdown)
        .await
        .context("Pipeline execution failed")?;

    info!(
        pairs = stats.pairs_dispatched,
        adaptations = stats.adaptations,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed successfully"
    );
    stats.print_summary();

    info!("DualCam Sync finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Capture:");
    println!("  Base: {}", blueprint.capture.base);
    println!("  Shared clock: {}", blueprint.capture.shared_clock);
    for stream in contracts::StreamId::ALL {
        let camera = blueprint.capture.camera(stream);
        println!(
            "  {}: offset {:.2}ms, jitter {:.2}ms, drift {:.1}ppm",
            stream, camera.offset_ms, camera.jitter_ms, camera.drift_ppm
        );
    }

    println!("\nSync:");
    println!("  Window: {}ms", blueprint.sync.sync_window_ms);
    println!("  Max frame age: {}ms", blueprint.sync.max_frame_age_ms);
    println!("  Buffer capacity: {}", blueprint.sync.buffer_capacity);

    println!("\nController:");
    println!("  Cooldown: {}ms", blueprint.controller.cooldown_ms);
    println!("  Threshold: {}", blueprint.controller.adaptation_threshold);
    if let Some(ref base_level) = blueprint.controller.base_level {
        println!("  Base level: {}", base_level);
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
