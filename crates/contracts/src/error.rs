//! Layered error definitions
//!
//! Categorized by source: config / hardware / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Hardware Errors =====
    /// Shared clock or capture session not available
    #[error("hardware unavailable: {message}")]
    HardwareUnavailable { message: String },

    /// Clock calibration failed
    #[error("clock calibration failed after {attempts} attempt(s): {message}")]
    CalibrationFailed { attempts: u32, message: String },

    /// Resource probe read failure
    #[error("probe '{probe}' failed to read {dimension}: {message}")]
    ProbeRead {
        probe: String,
        dimension: String,
        message: String,
    },

    // ===== Runtime Errors =====
    /// Component task is gone
    #[error("{component} is not running")]
    NotRunning { component: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap `validator` range/length failures for a config section
    pub fn from_validation(section: impl Into<String>, errors: validator::ValidationErrors) -> Self {
        Self::ConfigValidation {
            field: section.into(),
            message: errors.to_string().replace('\n', "; "),
        }
    }

    pub fn hardware_unavailable(message: impl Into<String>) -> Self {
        Self::HardwareUnavailable {
            message: message.into(),
        }
    }

    pub fn probe_read(
        probe: impl Into<String>,
        dimension: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ProbeRead {
            probe: probe.into(),
            dimension: dimension.into(),
            message: message.into(),
        }
    }

    pub fn not_running(component: impl Into<String>) -> Self {
        Self::NotRunning {
            component: component.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Configuration errors are not recoverable at runtime
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn validation_errors_keep_section() {
        let config = crate::ClockConfig {
            target_latency_ms: 500.0,
            ..Default::default()
        };
        let err = ContractError::from_validation("clock", config.validate().unwrap_err());
        assert!(err.is_configuration());
        let text = err.to_string();
        assert!(text.contains("'clock'"), "got: {text}");
        assert!(text.contains("target_latency_ms"), "got: {text}");
    }
}
