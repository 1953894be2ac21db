//! # Resource Monitor
//!
//! Samples frame-rate efficiency, memory pressure, thermal state and battery
//! level on fixed cadences and condenses them into [`PerformanceSnapshot`]s.
//!
//! - [`ResourceMonitor`]: deterministic core, driven with explicit session time
//! - [`MonitorHandle`]: cancellable periodic task publishing events
//! - [`LinuxProbe`] / [`ScriptedProbe`]: reading sources

mod activity;
mod composite;
mod monitor;
mod probe;
mod task;

pub use activity::{ActivityTotals, FrameActivity};
pub use composite::{classify, composite_score, Headroom};
pub use monitor::ResourceMonitor;
pub use probe::{thermal_level_for, LinuxProbe, ProbeControl, ScriptedProbe};
pub use task::MonitorHandle;

pub use contracts::{MonitorConfig, MonitorEvent, PerformanceSnapshot, PerformanceStatus};
