//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{
    ClockConfig, ControllerConfig, PipelineBlueprint, QualityConstraints, SyncCoordinatorConfig,
};
use quality_control::QualityCatalog;
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    base_configuration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_level: Option<String>,
    quality_levels: Vec<LevelInfo>,
    sync: SyncCoordinatorConfig,
    clock: ClockConfig,
    controller: ControllerConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct LevelInfo {
    name: String,
    configuration: String,
    preference_weight: f64,
    target_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraints: Option<QualityConstraints>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    if let Some(path) = &args.config {
        info!(config = %path.display(), "Loading configuration info");
    }

    let blueprint = load_blueprint(args.config.as_deref()).context("Failed to load config")?;
    let catalog = config_loader::build_catalog(&blueprint).context("Invalid quality catalog")?;

    if args.json {
        let info = build_config_info(&blueprint, &catalog, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, &catalog, args);
    }

    Ok(())
}

fn build_config_info(
    blueprint: &PipelineBlueprint,
    catalog: &QualityCatalog,
    args: &InfoArgs,
) -> ConfigInfo {
    let quality_levels = catalog
        .levels()
        .iter()
        .map(|level| LevelInfo {
            name: level.name.clone(),
            configuration: level.configuration().to_string(),
            preference_weight: level.preference_weight,
            target_score: level.target_score,
            constraints: args.constraints.then_some(level.constraints),
        })
        .collect();

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        base_configuration: blueprint.capture.base.to_string(),
        base_level: blueprint.controller.base_level.clone(),
        quality_levels,
        sync: blueprint.sync.clone(),
        clock: blueprint.clock.clone(),
        controller: blueprint.controller.clone(),
        sinks,
    }
}

fn print_config_info(blueprint: &PipelineBlueprint, catalog: &QualityCatalog, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               DualCam Sync Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📷 Capture");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Base: {}", blueprint.capture.base);
    println!("   └─ Shared clock: {}", blueprint.capture.shared_clock);

    let base_level = blueprint
        .controller
        .base_level
        .as_deref()
        .unwrap_or_else(|| catalog.highest().name.as_str());

    println!("\n🎚  Quality Levels ({})", catalog.len());
    for (i, level) in catalog.levels().iter().enumerate() {
        let is_last = i == catalog.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };
        let marker = if level.name == base_level { " (base)" } else { "" };

        println!(
            "   {} {}{}: {} [preference {:.2}, target {:.2}]",
            prefix,
            level.name,
            marker,
            level.configuration(),
            level.preference_weight,
            level.target_score
        );

        if args.constraints {
            let c = &level.constraints;
            println!(
                "   {}  └─ memory ≤ {:.0}%, thermal ≤ {}, battery ≥ {:.0}%, frame rate ≥ {:.0}%",
                child_prefix,
                c.max_memory_usage * 100.0,
                c.max_thermal,
                c.min_battery_level * 100.0,
                c.min_frame_rate_efficiency * 100.0
            );
        }
    }

    let sync = &blueprint.sync;
    println!("\n⚙️  Sync Coordinator");
    println!("   ├─ Sync window: {}ms", sync.sync_window_ms);
    println!("   ├─ Max frame age: {}ms", sync.max_frame_age_ms);
    println!(
        "   ├─ Buffers: {} per stream, {} pairs out",
        sync.buffer_capacity, sync.output_capacity
    );
    println!("   ├─ Drift history: {}", sync.drift_history);
    println!(
        "   ├─ Quality thresholds: {} / {} / {}ms",
        sync.quality_thresholds.excellent_ms,
        sync.quality_thresholds.good_ms,
        sync.quality_thresholds.fair_ms
    );
    println!(
        "   └─ Clock: target latency {}ms, {} calibration samples, prefer hardware {}",
        blueprint.clock.target_latency_ms,
        blueprint.clock.calibration_samples,
        blueprint.clock.prefer_hardware
    );

    let controller = &blueprint.controller;
    println!("\n🧭 Controller");
    println!("   ├─ Cooldown: {}ms", controller.cooldown_ms);
    println!("   ├─ Adaptation threshold: {}", controller.adaptation_threshold);
    println!(
        "   ├─ Critical cascade: {} snapshots",
        controller.critical_cascade_count
    );
    println!(
        "   └─ Floor battery level: {}",
        controller.critical_battery_level
    );

    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            println!(
                "   {} {} ({:?}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(constraints: bool, sinks: bool) -> InfoArgs {
        InfoArgs {
            config: None,
            json: true,
            constraints,
            sinks,
        }
    }

    #[test]
    fn default_info_lists_builtin_catalog() {
        let blueprint = PipelineBlueprint::with_log_sink();
        let catalog = config_loader::build_catalog(&blueprint).unwrap();
        let info = build_config_info(&blueprint, &catalog, &args(false, false));

        let names: Vec<_> = info.quality_levels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["ultra", "high", "balanced", "efficient", "minimal"]);
        assert!(info.quality_levels.iter().all(|l| l.constraints.is_none()));
        assert!(info.sinks.is_empty());
        assert_eq!(info.sync.sync_window_ms, 16.0);
    }

    #[test]
    fn optional_sections_follow_flags() {
        let blueprint = PipelineBlueprint::with_log_sink();
        let catalog = config_loader::build_catalog(&blueprint).unwrap();
        let info = build_config_info(&blueprint, &catalog, &args(true, true));

        assert!(info.quality_levels.iter().all(|l| l.constraints.is_some()));
        assert_eq!(info.sinks.len(), 1);
        assert_eq!(info.sinks[0].sink_type, "Log");
    }

    #[test]
    fn info_reads_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[controller]\nbase_level = \"balanced\"").unwrap();

        let blueprint = load_blueprint(Some(file.path())).unwrap();
        let catalog = config_loader::build_catalog(&blueprint).unwrap();
        let info = build_config_info(&blueprint, &catalog, &args(false, false));
        assert_eq!(info.base_level.as_deref(), Some("balanced"));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["quality_levels"].as_array().unwrap().len(), 5);
    }
}
