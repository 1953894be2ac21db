//! Inter-stream drift estimation.
//!
//! Keeps a bounded history of signed `front - back` timestamp differences
//! observed on emitted pairs and exposes their arithmetic mean as the drift
//! estimate.

use std::collections::VecDeque;

use contracts::{DriftState, StreamId};

/// Smoothed clock offset between the two streams
#[derive(Debug, Clone)]
pub struct DriftEstimator {
    history: VecDeque<f64>,
    capacity: usize,
    average: f64,
    last_update: Option<f64>,
}

impl DriftEstimator {
    /// Create an estimator keeping at most `capacity` samples (minimum one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            average: 0.0,
            last_update: None,
        }
    }

    /// Record one pairing observed at session time `now`
    pub fn record(&mut self, front_timestamp: f64, back_timestamp: f64, now: f64) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(front_timestamp - back_timestamp);
        self.average = self.history.iter().sum::<f64>() / self.history.len() as f64;
        self.last_update = Some(now);
    }

    /// Drift-corrected difference for `stream`
    ///
    /// Adds half the drift for the front stream and subtracts it for the
    /// back stream, so applying both corrections cancels out. An empty
    /// history yields no correction.
    #[inline]
    pub fn compensate(&self, raw_difference: f64, stream: StreamId) -> f64 {
        let half = self.average / 2.0;
        match stream {
            StreamId::Front => raw_difference + half,
            StreamId::Back => raw_difference - half,
        }
    }

    /// Current mean drift (seconds)
    #[inline]
    pub fn average_drift(&self) -> f64 {
        self.average
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Copy of the estimator state for diagnostics
    pub fn state(&self) -> DriftState {
        DriftState {
            history: self.history.clone(),
            average_drift: self.average,
            last_update: self.last_update,
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.average = 0.0;
        self.last_update = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_is_identity() {
        let estimator = DriftEstimator::new(100);
        assert_eq!(estimator.compensate(0.004, StreamId::Front), 0.004);
        assert_eq!(estimator.compensate(-0.004, StreamId::Back), -0.004);
    }

    #[test]
    fn mean_of_signed_differences() {
        let mut estimator = DriftEstimator::new(100);
        estimator.record(1.004, 1.000, 1.01);
        estimator.record(2.000, 1.998, 2.01);

        assert!((estimator.average_drift() - 0.003).abs() < 1e-9);
        assert_eq!(estimator.state().last_update, Some(2.01));
    }

    #[test]
    fn history_is_bounded() {
        let mut estimator = DriftEstimator::new(3);
        for i in 0..10 {
            estimator.record(i as f64 + 0.001 * i as f64, i as f64, i as f64);
        }
        assert_eq!(estimator.len(), 3);
        // Mean of 0.007, 0.008, 0.009
        assert!((estimator.average_drift() - 0.008).abs() < 1e-9);
    }

    #[test]
    fn stream_corrections_cancel() {
        let mut estimator = DriftEstimator::new(10);
        estimator.record(0.006, 0.0, 0.01);

        let raw = 0.005;
        let front = estimator.compensate(raw, StreamId::Front);
        let back = estimator.compensate(raw, StreamId::Back);
        assert!(((front - raw) + (back - raw)).abs() < 1e-12);
        assert!((back - 0.002).abs() < 1e-12);
    }

    #[test]
    fn compensate_is_idempotent_on_fixed_history() {
        let mut estimator = DriftEstimator::new(10);
        estimator.record(0.010, 0.004, 0.02);
        let first = estimator.compensate(0.007, StreamId::Back);
        let second = estimator.compensate(0.007, StreamId::Back);
        assert_eq!(first, second);
    }

    #[test]
    fn reset_clears_state() {
        let mut estimator = DriftEstimator::new(10);
        estimator.record(0.010, 0.0, 0.02);
        estimator.reset();
        assert!(estimator.is_empty());
        assert_eq!(estimator.average_drift(), 0.0);
        assert_eq!(estimator.state().last_update, None);
    }
}
