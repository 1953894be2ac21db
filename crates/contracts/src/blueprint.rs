//! PipelineBlueprint - Config Loader output
//!
//! Describes a complete capture session: base configuration, mock camera
//! parameters, sync/clock/monitor/controller tuning, quality catalog and
//! output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{
    CaptureConfiguration, ClockConfig, ControllerConfig, MonitorConfig, QualityLevel, StreamId,
    SyncCoordinatorConfig,
};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PipelineBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Capture settings
    #[serde(default)]
    #[validate(nested)]
    pub capture: CaptureSection,

    /// Frame sync coordinator tuning
    #[serde(default)]
    #[validate(nested)]
    pub sync: SyncCoordinatorConfig,

    /// Clock synchronizer tuning
    #[serde(default)]
    #[validate(nested)]
    pub clock: ClockConfig,

    /// Resource monitor tuning
    #[serde(default)]
    #[validate(nested)]
    pub monitor: MonitorConfig,

    /// Quality controller tuning
    #[serde(default)]
    #[validate(nested)]
    pub controller: ControllerConfig,

    /// Quality catalog override; the built-in catalog is used when empty
    #[serde(default)]
    #[validate(nested)]
    pub quality_levels: Vec<QualityLevel>,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Capture section
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CaptureSection {
    /// User base configuration
    #[validate(nested)]
    pub base: CaptureConfiguration,

    /// Front camera parameters
    #[validate(nested)]
    pub front: MockCameraConfig,

    /// Back camera parameters
    #[validate(nested)]
    pub back: MockCameraConfig,

    /// Merged capture channel capacity
    #[validate(range(min = 1))]
    pub channel_capacity: usize,

    /// Simulate shared-clock capture hardware
    pub shared_clock: bool,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            base: CaptureConfiguration::default(),
            front: MockCameraConfig::default(),
            back: MockCameraConfig {
                offset_ms: 3.0,
                ..MockCameraConfig::default()
            },
            channel_capacity: 64,
            shared_clock: true,
        }
    }
}

impl CaptureSection {
    pub fn camera(&self, stream: StreamId) -> &MockCameraConfig {
        match stream {
            StreamId::Front => &self.front,
            StreamId::Back => &self.back,
        }
    }
}

/// Mock camera timing model
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MockCameraConfig {
    /// Constant timestamp offset relative to the session clock (ms)
    pub offset_ms: f64,

    /// Uniform timestamp jitter amplitude (ms)
    #[validate(range(min = 0.0, max = 1000.0))]
    pub jitter_ms: f64,

    /// Linear clock drift (parts per million)
    pub drift_ppm: f64,

    /// Probability of silently skipping a frame (0-1)
    #[validate(range(min = 0.0, max = 1.0))]
    pub drop_probability: f64,

    /// Payload bytes per frame (0 for metadata-only frames)
    pub payload_bytes: usize,
}

impl Default for MockCameraConfig {
    fn default() -> Self {
        Self {
            offset_ms: 0.0,
            jitter_ms: 0.5,
            drift_ppm: 0.0,
            drop_probability: 0.0,
            payload_bytes: 0,
        }
    }
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON-lines debug journal of pair metadata
    File,
    /// UDP pair metadata stream to an external renderer
    Network,
}

impl PipelineBlueprint {
    /// Default blueprint with a single log sink
    pub fn with_log_sink() -> Self {
        Self {
            sinks: vec![SinkConfig {
                name: "log".into(),
                sink_type: SinkType::Log,
                queue_capacity: default_queue_capacity(),
                params: HashMap::new(),
            }],
            ..Self::default()
        }
    }

    /// Monitor config with the target frame rate taken from the base
    /// configuration
    pub fn effective_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            target_frame_rate: f64::from(self.capture.base.frame_rate),
            ..self.monitor.clone()
        }
    }
}
