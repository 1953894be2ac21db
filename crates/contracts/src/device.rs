//! Hardware collaborator traits
//!
//! Shared-clock capture hardware and resource readings. Both are called
//! from the owning component's task and are expected to return quickly.

use crate::{ContractError, ThermalLevel};

/// Capture hardware able to drive both camera paths from one time base
pub trait SharedClockDevice: Send {
    /// Whether the hardware supports a shared capture clock at all
    fn supports_shared_clock(&self) -> bool;

    /// Prepare both capture paths to share a time base with the given
    /// target cross-path latency (seconds)
    fn configure_shared_clock(&mut self, target_latency: f64) -> Result<(), ContractError>;

    /// Capture one test frame on each path and return their timestamps
    /// (front, back) in session seconds
    fn capture_test_pair(&mut self) -> Result<(f64, f64), ContractError>;
}

/// Source of thermal, memory and battery readings
pub trait ResourceProbe: Send {
    /// Probe name (logging)
    fn name(&self) -> &str;

    /// Current thermal state
    fn read_thermal(&mut self) -> Result<ThermalLevel, ContractError>;

    /// Used / total memory (0-1)
    fn read_memory(&mut self) -> Result<f64, ContractError>;

    /// Remaining battery (0-1)
    fn read_battery(&mut self) -> Result<f64, ContractError>;
}
