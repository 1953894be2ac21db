//! Simulated shared-clock capture hardware.

use contracts::{ContractError, MockCameraConfig, SessionClock, SharedClockDevice};
use tracing::debug;

use crate::mock::reported_timestamp;

/// Shared-clock device backed by the two mock camera timing models
///
/// Test pairs are stamped with each camera's offset and drift at the same
/// instant, so calibration measures the configured skew.
pub struct MockClockDevice {
    clock: SessionClock,
    front: MockCameraConfig,
    back: MockCameraConfig,
    supported: bool,
    target_latency: Option<f64>,
}

impl MockClockDevice {
    pub fn new(clock: SessionClock, front: MockCameraConfig, back: MockCameraConfig) -> Self {
        Self {
            clock,
            front,
            back,
            supported: true,
            target_latency: None,
        }
    }

    /// Device reporting no shared-clock capability
    pub fn unsupported(clock: SessionClock) -> Self {
        Self {
            supported: false,
            ..Self::new(clock, MockCameraConfig::default(), MockCameraConfig::default())
        }
    }

    /// Latency requested by the last successful configure call
    pub fn target_latency(&self) -> Option<f64> {
        self.target_latency
    }
}

impl SharedClockDevice for MockClockDevice {
    fn supports_shared_clock(&self) -> bool {
        self.supported
    }

    fn configure_shared_clock(&mut self, target_latency: f64) -> Result<(), ContractError> {
        if !self.supported {
            return Err(ContractError::hardware_unavailable(
                "mock device has no shared clock",
            ));
        }
        debug!(target_latency, "Mock shared clock configured");
        self.target_latency = Some(target_latency);
        Ok(())
    }

    fn capture_test_pair(&mut self) -> Result<(f64, f64), ContractError> {
        if self.target_latency.is_none() {
            return Err(ContractError::hardware_unavailable(
                "shared clock not configured",
            ));
        }
        let now = self.clock.now();
        Ok((
            reported_timestamp(&self.front, now, 0.0),
            reported_timestamp(&self.back, now, 0.0),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_reflects_offsets() {
        let mut device = MockClockDevice::new(
            SessionClock::new(),
            MockCameraConfig::default(),
            MockCameraConfig {
                offset_ms: 3.0,
                ..MockCameraConfig::default()
            },
        );
        assert!(device.capture_test_pair().is_err());

        device.configure_shared_clock(0.005).unwrap();
        assert_eq!(device.target_latency(), Some(0.005));
        let (front, back) = device.capture_test_pair().unwrap();
        assert!((back - front - 0.003).abs() < 1e-9);
    }

    #[test]
    fn unsupported_device_refuses_configuration() {
        let mut device = MockClockDevice::unsupported(SessionClock::new());
        assert!(!device.supports_shared_clock());
        assert!(device.configure_shared_clock(0.005).is_err());
    }
}
