//! # Config Loader
//!
//! Loads a [`PipelineBlueprint`] from TOML or JSON and validates it,
//! including the cross-field rules the contract derives cannot express.
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("dualcam.toml")).unwrap();
//! println!("sync window: {} ms", blueprint.sync.sync_window_ms);
//! ```

mod parser;
mod validator;

pub use contracts::PipelineBlueprint;
pub use parser::ConfigFormat;
pub use validator::{build_catalog, validate};

use contracts::ContractError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from a `.toml` or `.json` file
    ///
    /// # Errors
    /// Unreadable file, unknown extension, parse or validation failure.
    pub fn load_from_path(path: &Path) -> Result<PipelineBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    pub fn to_toml(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_TOML: &str = r#"
[capture]
channel_capacity = 32

[capture.back]
offset_ms = 3.0
drift_ppm = 50.0

[sync]
sync_window_ms = 16.0
buffer_capacity = 10

[controller]
base_level = "high"

[[sinks]]
name = "log"
sink_type = "log"
"#;

    #[test]
    fn loads_toml() {
        let blueprint = ConfigLoader::load_from_str(SESSION_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.capture.channel_capacity, 32);
        assert_eq!(blueprint.capture.back.drift_ppm, 50.0);
        assert_eq!(blueprint.sinks.len(), 1);
    }

    #[test]
    fn round_trips_through_toml_and_json() {
        let blueprint = ConfigLoader::load_from_str(SESSION_TOML, ConfigFormat::Toml).unwrap();

        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let again = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(again.controller.base_level.as_deref(), Some("high"));

        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(again.capture.back.offset_ms, 3.0);
    }

    #[test]
    fn validation_runs_after_parse() {
        let content = format!("{SESSION_TOML}\n[[sinks]]\nname = \"log\"\nsink_type = \"log\"\n");
        let err = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("duplicate sink name"));
    }

    #[test]
    fn unknown_extension_rejected() {
        let err = ConfigLoader::load_from_path(Path::new("session.yaml")).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
