//! Blueprint validation
//!
//! Range checks come from the `validator` derives on the contract types.
//! Cross-field rules:
//! - quality thresholds strictly increasing, max frame age covers the window
//! - camera offsets and drift within simulation bounds
//! - monitor critical bounds at least as severe as warning bounds
//! - quality catalog valid (non-empty, unique names, degraded floor level)
//! - controller base level present in the catalog
//! - sink names non-empty and unique, network sinks carry an address

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{
    ContractError, MockCameraConfig, PipelineBlueprint, SinkType, StreamId,
};
use quality_control::QualityCatalog;
use validator::Validate;

/// Largest camera offset accepted (ms)
const MAX_OFFSET_MS: f64 = 1000.0;
/// Largest clock drift accepted (ppm)
const MAX_DRIFT_PPM: f64 = 10_000.0;

/// Validate a blueprint; returns the first error found
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::from_validation("blueprint", e))?;
    validate_sync(blueprint)?;
    validate_capture(blueprint)?;
    validate_monitor(blueprint)?;
    validate_quality(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// Catalog described by the blueprint: the override, or the built-in one
pub fn build_catalog(blueprint: &PipelineBlueprint) -> Result<QualityCatalog, ContractError> {
    if blueprint.quality_levels.is_empty() {
        Ok(QualityCatalog::builtin())
    } else {
        QualityCatalog::new(blueprint.quality_levels.clone())
    }
}

fn validate_sync(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let sync = &blueprint.sync;
    let thresholds = &sync.quality_thresholds;
    if !(thresholds.excellent_ms < thresholds.good_ms && thresholds.good_ms < thresholds.fair_ms) {
        return Err(ContractError::config_validation(
            "sync.quality_thresholds",
            format!(
                "thresholds must increase: excellent ({}) < good ({}) < fair ({})",
                thresholds.excellent_ms, thresholds.good_ms, thresholds.fair_ms
            ),
        ));
    }

    if sync.max_frame_age_ms < sync.sync_window_ms {
        return Err(ContractError::config_validation(
            "sync.max_frame_age_ms",
            format!(
                "max_frame_age_ms ({}) must be >= sync_window_ms ({})",
                sync.max_frame_age_ms, sync.sync_window_ms
            ),
        ));
    }
    Ok(())
}

fn validate_capture(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    for stream in StreamId::ALL {
        validate_camera(stream, blueprint.capture.camera(stream))?;
    }
    Ok(())
}

fn validate_camera(stream: StreamId, camera: &MockCameraConfig) -> Result<(), ContractError> {
    if !camera.offset_ms.is_finite() || camera.offset_ms.abs() > MAX_OFFSET_MS {
        return Err(ContractError::config_validation(
            format!("capture.{stream}.offset_ms"),
            format!("offset must lie within ±{MAX_OFFSET_MS} ms, got {}", camera.offset_ms),
        ));
    }
    if !camera.drift_ppm.is_finite() || camera.drift_ppm.abs() > MAX_DRIFT_PPM {
        return Err(ContractError::config_validation(
            format!("capture.{stream}.drift_ppm"),
            format!("drift must lie within ±{MAX_DRIFT_PPM} ppm, got {}", camera.drift_ppm),
        ));
    }
    Ok(())
}

fn validate_monitor(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let t = &blueprint.monitor.thresholds;
    let ordered = [
        ("frame_rate", t.frame_rate_critical <= t.frame_rate_warning),
        ("memory", t.memory_critical >= t.memory_warning),
        ("battery", t.battery_critical <= t.battery_warning),
        ("thermal", t.thermal_critical >= t.thermal_warning),
    ];
    for (dimension, ok) in ordered {
        if !ok {
            return Err(ContractError::config_validation(
                format!("monitor.thresholds.{dimension}"),
                "critical bound must be at least as severe as the warning bound",
            ));
        }
    }
    Ok(())
}

fn validate_quality(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let catalog = build_catalog(blueprint)?;
    if let Some(base) = &blueprint.controller.base_level {
        if catalog.get(base).is_none() {
            return Err(ContractError::config_validation(
                "controller.base_level",
                format!("base level '{base}' not found in the quality catalog"),
            ));
        }
    }
    Ok(())
}

fn validate_sinks(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue capacity must be >= 1",
            ));
        }
        if sink.sink_type == SinkType::Network {
            let addr = sink.params.get("addr").ok_or_else(|| {
                ContractError::config_validation(
                    format!("sinks[{}].params.addr", sink.name),
                    "network sink requires an 'addr' parameter",
                )
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(
                    format!("sinks[{}].params.addr", sink.name),
                    format!("invalid address '{addr}': {e}"),
                )
            })?;
        }
    }
    Ok(())
}
