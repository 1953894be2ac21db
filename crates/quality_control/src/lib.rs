//! # Quality Control
//!
//! Adaptive capture-quality controller.
//!
//! - [`QualityCatalog`]: preference-ordered operating points
//! - [`QualityController`]: gate, cooldown and level selection over snapshots
//! - [`apply_chain`]: thermal, battery, memory and frame-rate clamps
//! - [`ControllerHandle`]: task consuming monitor events

mod catalog;
mod controller;
mod scoring;
mod strategy;
mod task;

pub use catalog::{default_levels, QualityCatalog};
pub use controller::QualityController;
pub use scoring::{best_level, score_level, LevelScore};
pub use strategy::{apply, apply_chain, derive_from_base};
pub use task::ControllerHandle;

pub use contracts::{
    AdaptationDecision, AdaptationReason, CaptureConfiguration, ControllerConfig, QualityLevel,
    StrategyKind,
};
