//! Shared time reference across the two capture paths.
//!
//! Two variants behind one interface, chosen at configuration time:
//! - [`HardwareClockSync`] drives a [`SharedClockDevice`] and measures the
//!   real cross-path delay
//! - [`SoftwareClockSync`] relies on capture timestamps only and reports a
//!   fixed, lower quality

use std::time::Instant;

use contracts::{ClockConfig, ClockMode, ClockReport, ContractError, SharedClockDevice};
use tracing::{debug, instrument, warn};
use validator::Validate;

/// Clock synchronizer interface
pub trait ClockSynchronizer: Send {
    fn mode(&self) -> ClockMode;

    /// Prepare the capture paths for `target_latency` (seconds)
    fn configure(&mut self, target_latency: f64) -> Result<(), ContractError>;

    /// Measure the cross-path latency and store the result
    fn calibrate(&mut self, now: f64) -> Result<ClockReport, ContractError>;

    /// Change the target latency live
    ///
    /// Returns the new report when a recalibration ran because the
    /// synchronizer was active.
    fn adjust_target_latency(
        &mut self,
        target_latency: f64,
        now: f64,
    ) -> Result<Option<ClockReport>, ContractError>;

    /// Mark the synchronizer inactive (coordinator stopped)
    fn release(&mut self);

    /// Last known state
    fn report(&self) -> ClockReport;
}

/// Reject target latencies outside (0, 100] ms
pub fn validate_target_latency(target_latency: f64) -> Result<(), ContractError> {
    let ms = target_latency * 1000.0;
    if !(ms > 0.0 && ms <= contracts::MAX_TARGET_LATENCY_MS) {
        return Err(ContractError::config_validation(
            "clock.target_latency_ms",
            format!(
                "target latency must be in (0, {}] ms, got {ms}",
                contracts::MAX_TARGET_LATENCY_MS
            ),
        ));
    }
    Ok(())
}

/// Build the synchronizer matching the configuration and hardware
///
/// Falls back to software mode when no device is given, hardware is not
/// preferred, or the device has no shared clock.
pub fn select_clock(
    config: &ClockConfig,
    device: Option<Box<dyn SharedClockDevice>>,
) -> Result<Box<dyn ClockSynchronizer>, ContractError> {
    config
        .validate()
        .map_err(|e| ContractError::from_validation("clock", e))?;

    match device {
        Some(device) if config.prefer_hardware && device.supports_shared_clock() => {
            debug!("Using hardware shared clock");
            Ok(Box::new(HardwareClockSync::new(config.clone(), device)))
        }
        Some(_) if config.prefer_hardware => {
            debug!("Device has no shared clock, using software timestamps");
            Ok(Box::new(SoftwareClockSync::new(config.clone())))
        }
        _ => Ok(Box::new(SoftwareClockSync::new(config.clone()))),
    }
}

/// Hardware shared-clock synchronizer
pub struct HardwareClockSync {
    config: ClockConfig,
    device: Box<dyn SharedClockDevice>,
    target_latency: f64,
    report: ClockReport,
    active: bool,
}

impl HardwareClockSync {
    pub fn new(config: ClockConfig, device: Box<dyn SharedClockDevice>) -> Self {
        let target_latency = config.target_latency_secs();
        Self {
            config,
            device,
            target_latency,
            report: ClockReport {
                mode: ClockMode::Hardware,
                target_latency,
                measured_latency: None,
                calibration_duration_ms: 0.0,
                calibrated_at: None,
                quality: 0.0,
            },
            active: false,
        }
    }

    /// Quality from how well the measured delay meets the target
    fn quality_for(&self, measured: f64) -> f64 {
        if measured <= self.target_latency {
            1.0
        } else {
            (self.target_latency / measured).clamp(0.0, 1.0)
        }
    }
}

impl ClockSynchronizer for HardwareClockSync {
    fn mode(&self) -> ClockMode {
        ClockMode::Hardware
    }

    #[instrument(name = "hardware_clock_configure", skip(self))]
    fn configure(&mut self, target_latency: f64) -> Result<(), ContractError> {
        validate_target_latency(target_latency)?;
        if !self.device.supports_shared_clock() {
            return Err(ContractError::hardware_unavailable(
                "device does not support a shared capture clock",
            ));
        }
        self.device.configure_shared_clock(target_latency)?;
        self.target_latency = target_latency;
        self.report.target_latency = target_latency;
        Ok(())
    }

    #[instrument(
        name = "hardware_clock_calibrate",
        skip(self),
        fields(samples = self.config.calibration_samples)
    )]
    fn calibrate(&mut self, now: f64) -> Result<ClockReport, ContractError> {
        let started = Instant::now();
        let samples = self.config.calibration_samples.max(1);

        let mut total_delay = 0.0;
        for _ in 0..samples {
            let (front, back) =
                self.device
                    .capture_test_pair()
                    .map_err(|e| ContractError::CalibrationFailed {
                        attempts: 1,
                        message: e.to_string(),
                    })?;
            total_delay += (front - back).abs();
        }

        let measured = total_delay / f64::from(samples);
        self.report = ClockReport {
            mode: ClockMode::Hardware,
            target_latency: self.target_latency,
            measured_latency: Some(measured),
            calibration_duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            calibrated_at: Some(now),
            quality: self.quality_for(measured),
        };
        self.active = true;

        if measured > self.target_latency {
            warn!(
                measured_ms = measured * 1000.0,
                target_ms = self.target_latency * 1000.0,
                "Measured cross-path latency exceeds target"
            );
        }

        Ok(self.report.clone())
    }

    fn adjust_target_latency(
        &mut self,
        target_latency: f64,
        now: f64,
    ) -> Result<Option<ClockReport>, ContractError> {
        self.configure(target_latency)?;
        if self.active {
            return self.calibrate(now).map(Some);
        }
        Ok(None)
    }

    fn release(&mut self) {
        self.active = false;
    }

    fn report(&self) -> ClockReport {
        self.report.clone()
    }
}

/// Timestamp-only synchronizer
#[derive(Debug, Clone)]
pub struct SoftwareClockSync {
    config: ClockConfig,
    report: ClockReport,
    active: bool,
}

impl SoftwareClockSync {
    pub fn new(config: ClockConfig) -> Self {
        let report = ClockReport {
            mode: ClockMode::Software,
            target_latency: config.target_latency_secs(),
            measured_latency: None,
            calibration_duration_ms: 0.0,
            calibrated_at: None,
            quality: config.software_quality,
        };
        Self {
            config,
            report,
            active: false,
        }
    }
}

impl ClockSynchronizer for SoftwareClockSync {
    fn mode(&self) -> ClockMode {
        ClockMode::Software
    }

    fn configure(&mut self, target_latency: f64) -> Result<(), ContractError> {
        validate_target_latency(target_latency)?;
        self.report.target_latency = target_latency;
        Ok(())
    }

    fn calibrate(&mut self, now: f64) -> Result<ClockReport, ContractError> {
        self.report.calibrated_at = Some(now);
        self.report.quality = self.config.software_quality;
        self.active = true;
        Ok(self.report.clone())
    }

    fn adjust_target_latency(
        &mut self,
        target_latency: f64,
        now: f64,
    ) -> Result<Option<ClockReport>, ContractError> {
        self.configure(target_latency)?;
        if self.active {
            return self.calibrate(now).map(Some);
        }
        Ok(None)
    }

    fn release(&mut self) {
        self.active = false;
    }

    fn report(&self) -> ClockReport {
        self.report.clone()
    }
}
