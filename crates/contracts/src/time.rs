//! Session clock
//!
//! Every timestamp in the pipeline is `f64` seconds since the session origin.

use std::time::{Duration, Instant};

/// Monotonic session time base
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Seconds elapsed since the origin
    #[inline]
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds (config unit) to a `Duration`, clamped at zero
pub fn duration_from_ms(ms: f64) -> Duration {
    Duration::from_secs_f64((ms / 1000.0).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = SessionClock::new();
        let first = clock.now();
        assert!(clock.now() >= first);
    }

    #[test]
    fn duration_from_ms_clamps_negative() {
        assert_eq!(duration_from_ms(-5.0), Duration::ZERO);
        assert_eq!(duration_from_ms(16.0), Duration::from_millis(16));
    }
}
