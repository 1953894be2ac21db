//! Blueprint parsing
//!
//! TOML is the primary format, JSON is accepted as well.

use contracts::{ContractError, PipelineBlueprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<PipelineBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<PipelineBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Resolution, SinkType};

    #[test]
    fn empty_document_uses_defaults() {
        let blueprint = parse_toml("").unwrap();
        assert_eq!(blueprint.sync.sync_window_ms, 16.0);
        assert_eq!(blueprint.capture.back.offset_ms, 3.0);
        assert!(blueprint.sinks.is_empty());
    }

    #[test]
    fn parses_sections() {
        let content = r#"
[capture.base]
resolution = "uhd4k"
frame_rate = 60

[capture.back]
offset_ms = 4.5
drift_ppm = 20.0

[sync]
sync_window_ms = 20.0

[controller]
cooldown_ms = 5000.0
base_level = "high"

[[sinks]]
name = "journal"
sink_type = "file"
params = { path = "out/pairs.jsonl" }
"#;
        let blueprint = parse_toml(content).unwrap();
        assert_eq!(blueprint.capture.base.resolution, Resolution::Uhd4k);
        assert_eq!(blueprint.capture.base.frame_rate, 60);
        assert_eq!(blueprint.capture.back.offset_ms, 4.5);
        assert_eq!(blueprint.capture.back.jitter_ms, 0.5);
        assert_eq!(blueprint.sync.sync_window_ms, 20.0);
        assert_eq!(blueprint.sync.max_frame_age_ms, 100.0);
        assert_eq!(blueprint.controller.base_level.as_deref(), Some("high"));
        assert_eq!(blueprint.sinks[0].sink_type, SinkType::File);
        assert_eq!(blueprint.sinks[0].params["path"], "out/pairs.jsonl");
    }

    #[test]
    fn parses_json() {
        let content = r#"{
            "clock": { "target_latency_ms": 5.0, "prefer_hardware": false },
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let blueprint = parse_json(content).unwrap();
        assert_eq!(blueprint.clock.target_latency_ms, 5.0);
        assert!(!blueprint.clock.prefer_hardware);
        assert_eq!(blueprint.sinks[0].queue_capacity, 100);
    }

    #[test]
    fn syntax_error_is_parse_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
