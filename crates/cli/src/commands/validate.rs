//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{PipelineBlueprint, SinkType};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Debug, Serialize)]
struct ConfigSummary {
    version: String,
    base_configuration: String,
    sync_window_ms: f64,
    quality_levels: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_blueprint(Some(&args.config)) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let quality_levels = config_loader::build_catalog(&blueprint)
                .map(|catalog| catalog.len())
                .unwrap_or_default();

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    base_configuration: blueprint.capture.base.to_string(),
                    sync_window_ms: blueprint.sync.sync_window_ms,
                    quality_levels,
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - pairs will be dropped".to_string());
    }

    if !blueprint.sinks.is_empty()
        && blueprint
            .sinks
            .iter()
            .all(|sink| sink.sink_type == SinkType::Network)
    {
        warnings.push("Only network sinks configured - no local log or debug journal".to_string());
    }

    let offset_ms = (blueprint.capture.back.offset_ms - blueprint.capture.front.offset_ms).abs();
    if offset_ms > blueprint.sync.sync_window_ms {
        warnings.push(format!(
            "Camera offset difference {:.1}ms exceeds sync window {:.1}ms - pairing relies on drift compensation",
            offset_ms, blueprint.sync.sync_window_ms
        ));
    }

    if !blueprint.capture.shared_clock && blueprint.clock.prefer_hardware {
        warnings.push(
            "clock.prefer_hardware is set but capture.shared_clock is off - software timestamps will be used"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Base configuration: {}", summary.base_configuration);
            println!("  Sync window: {}ms", summary.sync_window_ms);
            println!("  Quality levels: {}", summary.quality_levels);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args(config: PathBuf) -> ValidateArgs {
        ValidateArgs { config, json: true }
    }

    #[test]
    fn valid_config_has_summary() {
        let file = write_config(
            r#"
            [capture.base]
            resolution = "hd720"
            frame_rate = 24

            [[sinks]]
            name = "log"
            sink_type = "log"
            "#,
        );
        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(result.valid, "{:?}", result.error);
        let summary = result.summary.unwrap();
        assert_eq!(summary.quality_levels, 5);
        assert_eq!(summary.sink_count, 1);
        assert!(result.warnings.is_none());
    }

    #[test]
    fn empty_sinks_warned() {
        let file = write_config("[sync]\nsync_window_ms = 20.0\n");
        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("No sinks")));
    }

    #[test]
    fn invalid_config_reports_error() {
        let file = write_config("[controller]\nadaptation_threshold = 3.0\n");
        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(!result.valid);
        assert!(result.error.is_some());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["valid"], false);
        assert!(json.get("summary").is_none());
    }

    #[test]
    fn missing_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate_config(&args(dir.path().join("nope.toml")));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }
}
