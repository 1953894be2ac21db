//! Resource probes.
//!
//! - [`LinuxProbe`] reads `/proc` and `/sys`
//! - [`ScriptedProbe`] returns readings set from the outside (tests, demo)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use contracts::{ContractError, ResourceProbe, ResourceReadings, ThermalLevel};
use tracing::debug;

/// Zone temperature (°C) at which each thermal level starts
const THERMAL_FAIR_CELSIUS: f64 = 60.0;
const THERMAL_SERIOUS_CELSIUS: f64 = 75.0;
const THERMAL_CRITICAL_CELSIUS: f64 = 90.0;

/// Map a temperature to a thermal level
pub fn thermal_level_for(celsius: f64) -> ThermalLevel {
    if celsius >= THERMAL_CRITICAL_CELSIUS {
        ThermalLevel::Critical
    } else if celsius >= THERMAL_SERIOUS_CELSIUS {
        ThermalLevel::Serious
    } else if celsius >= THERMAL_FAIR_CELSIUS {
        ThermalLevel::Fair
    } else {
        ThermalLevel::Nominal
    }
}

/// Host probe backed by procfs and sysfs
///
/// Hosts without thermal zones report nominal; hosts without a battery
/// report a full one.
#[derive(Debug, Clone)]
pub struct LinuxProbe {
    root: PathBuf,
}

impl Default for LinuxProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxProbe {
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Probe reading from an alternate filesystem root
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn read_meminfo(&self) -> Result<f64> {
        let path = self.path("proc/meminfo");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut total: Option<u64> = None;
        let mut available: Option<u64> = None;
        for line in content.lines() {
            if line.starts_with("MemTotal:") {
                total = Some(parse_meminfo_value(line)?);
            } else if line.starts_with("MemAvailable:") {
                available = Some(parse_meminfo_value(line)?);
            }
        }

        let total = total.context("No MemTotal in meminfo")?;
        let available = available.context("No MemAvailable in meminfo")?;
        if total == 0 {
            anyhow::bail!("MemTotal is zero");
        }
        Ok(total.saturating_sub(available) as f64 / total as f64)
    }

    /// Hottest thermal zone, `None` when the host exposes none
    fn read_max_temperature(&self) -> Result<Option<f64>> {
        let dir = self.path("sys/class/thermal");
        let Ok(entries) = fs::read_dir(&dir) else {
            return Ok(None);
        };

        let mut hottest: Option<f64> = None;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with("thermal_zone") {
                continue;
            }
            let temp_path = entry.path().join("temp");
            let Ok(content) = fs::read_to_string(&temp_path) else {
                continue;
            };
            let millidegrees: i64 = content
                .trim()
                .parse()
                .with_context(|| format!("Invalid temperature in {}", temp_path.display()))?;
            let celsius = millidegrees as f64 / 1000.0;
            hottest = Some(hottest.map_or(celsius, |h| h.max(celsius)));
        }
        Ok(hottest)
    }

    /// First battery's capacity, `None` on mains-only hosts
    fn read_battery_capacity(&self) -> Result<Option<f64>> {
        let dir = self.path("sys/class/power_supply");
        let Ok(entries) = fs::read_dir(&dir) else {
            return Ok(None);
        };

        let mut supplies: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        supplies.sort();

        for supply in supplies {
            if !is_battery(&supply) {
                continue;
            }
            let capacity_path = supply.join("capacity");
            let content = fs::read_to_string(&capacity_path)
                .with_context(|| format!("Failed to read {}", capacity_path.display()))?;
            let percent: f64 = content
                .trim()
                .parse()
                .with_context(|| format!("Invalid capacity in {}", capacity_path.display()))?;
            return Ok(Some((percent / 100.0).clamp(0.0, 1.0)));
        }
        Ok(None)
    }

    fn read_error(&self, dimension: &str, err: anyhow::Error) -> ContractError {
        ContractError::probe_read(self.name(), dimension, format!("{err:#}"))
    }
}

fn is_battery(supply: &Path) -> bool {
    fs::read_to_string(supply.join("type"))
        .map(|kind| kind.trim() == "Battery")
        .unwrap_or(false)
}

fn parse_meminfo_value(line: &str) -> Result<u64> {
    line.split_whitespace()
        .nth(1)
        .context("Invalid meminfo line")?
        .parse()
        .context("Invalid meminfo value")
}

impl ResourceProbe for LinuxProbe {
    fn name(&self) -> &str {
        "linux"
    }

    fn read_thermal(&mut self) -> Result<ThermalLevel, ContractError> {
        match self.read_max_temperature() {
            Ok(Some(celsius)) => Ok(thermal_level_for(celsius)),
            Ok(None) => Ok(ThermalLevel::Nominal),
            Err(err) => Err(self.read_error("thermal", err)),
        }
    }

    fn read_memory(&mut self) -> Result<f64, ContractError> {
        self.read_meminfo()
            .map_err(|err| self.read_error("memory", err))
    }

    fn read_battery(&mut self) -> Result<f64, ContractError> {
        match self.read_battery_capacity() {
            Ok(Some(level)) => Ok(level),
            Ok(None) => {
                debug!("No battery found, assuming mains power");
                Ok(1.0)
            }
            Err(err) => Err(self.read_error("battery", err)),
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    readings: ResourceReadings,
    failures_left: u32,
}

/// Probe returning externally controlled readings
#[derive(Debug)]
pub struct ScriptedProbe {
    script: Arc<Mutex<Script>>,
}

/// Remote control for a [`ScriptedProbe`] owned by a monitor
#[derive(Debug, Clone)]
pub struct ProbeControl {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProbe {
    pub fn new(readings: ResourceReadings) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                readings,
                failures_left: 0,
            })),
        }
    }

    /// Cool device, no memory pressure, full battery
    pub fn nominal() -> Self {
        Self::new(ResourceReadings::default())
    }

    pub fn control(&self) -> ProbeControl {
        ProbeControl {
            script: Arc::clone(&self.script),
        }
    }

    fn read<T>(&self, dimension: &str, pick: impl FnOnce(&ResourceReadings) -> T) -> Result<T, ContractError> {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        if script.failures_left > 0 {
            script.failures_left -= 1;
            return Err(ContractError::probe_read("scripted", dimension, "scripted failure"));
        }
        Ok(pick(&script.readings))
    }
}

impl ProbeControl {
    /// Replace the readings returned from now on
    pub fn set(&self, readings: ResourceReadings) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .readings = readings;
    }

    /// Make the next `count` reads fail
    pub fn fail_next(&self, count: u32) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failures_left = count;
    }

    pub fn readings(&self) -> ResourceReadings {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .readings
    }
}

impl ResourceProbe for ScriptedProbe {
    fn name(&self) -> &str {
        "scripted"
    }

    fn read_thermal(&mut self) -> Result<ThermalLevel, ContractError> {
        self.read("thermal", |r| r.thermal)
    }

    fn read_memory(&mut self) -> Result<f64, ContractError> {
        self.read("memory", |r| r.memory_usage)
    }

    fn read_battery(&mut self) -> Result<f64, ContractError> {
        self.read("battery", |r| r.battery_level)
    }
}
