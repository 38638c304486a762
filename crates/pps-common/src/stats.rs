//! Streaming jitter statistics over successive PPS timestamps.
//!
//! Each pulse after the first yields the interval to its predecessor, the
//! deviation of that interval from the nominal one-second period, and the
//! running mean and population standard deviation of all deviations so far.
//!
//! The accumulator keeps only the raw sums `S1 = Σd` and `S2 = Σd²` and
//! derives the variance as `S2/n - (S1/n)²`. That identity loses precision
//! through cancellation on very long runs or large deviations, so the result
//! is clamped at zero before the square root.

use crate::time::{Timestamp, NANOS_PER_SEC};
use serde::Serialize;
use std::fmt;

/// Nominal interval between two pulses in nanoseconds.
pub const NOMINAL_PERIOD_NS: i64 = NANOS_PER_SEC;

/// Statistics for one observed interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Report {
    /// Raw interval to the previous pulse in nanoseconds.
    pub delta_ns: i64,
    /// Deviation of the interval from the nominal period in microseconds.
    pub deviation_us: f64,
    /// Running mean of the deviation in microseconds.
    pub mean_us: f64,
    /// Running population standard deviation of the deviation in microseconds.
    pub std_dev_us: f64,
    /// Set when the interval is zero or negative, which only a misbehaving
    /// source can produce. The interval is still counted.
    pub anomalous: bool,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "diff {} ns - pps {:.2} - avg {:.2} - std {:.2}",
            self.delta_ns,
            self.deviation_us,
            self.mean_us,
            self.std_dev_us
        )
    }
}

/// Running state for one capture run.
#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    /// Last timestamp seen; `None` until the first pulse.
    previous: Option<Timestamp>,
    /// Intervals observed (pulses after the first).
    count: u64,
    /// Sum of deviations in microseconds.
    sum: f64,
    /// Sum of squared deviations.
    sum_sq: f64,
}

impl CaptureSession {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next pulse timestamp.
    ///
    /// Returns `None` for the very first pulse, which only seeds the session.
    pub fn observe(&mut self, timestamp: Timestamp) -> Option<Report> {
        let Some(previous) = self.previous.replace(timestamp) else {
            return None;
        };

        let delta_ns = timestamp - previous;
        #[allow(clippy::cast_precision_loss)]
        let deviation_us = delta_ns.saturating_sub(NOMINAL_PERIOD_NS) as f64 / 1000.0;

        self.count += 1;
        self.sum += deviation_us;
        self.sum_sq += deviation_us * deviation_us;

        Some(Report {
            delta_ns,
            deviation_us,
            mean_us: self.raw_mean(),
            std_dev_us: self.raw_variance().sqrt(),
            anomalous: delta_ns <= 0,
        })
    }

    /// Last timestamp fed into the session.
    #[must_use]
    pub fn previous(&self) -> Option<Timestamp> {
        self.previous
    }

    /// Number of intervals accumulated.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Running mean deviation in microseconds.
    #[must_use]
    pub fn mean_us(&self) -> Option<f64> {
        (self.count > 0).then(|| self.raw_mean())
    }

    /// Running standard deviation in microseconds.
    #[must_use]
    pub fn std_dev_us(&self) -> Option<f64> {
        (self.count > 0).then(|| self.raw_variance().sqrt())
    }

    /// Discard all accumulated state, including the previous timestamp.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[allow(clippy::cast_precision_loss)]
    fn raw_mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    #[allow(clippy::cast_precision_loss)]
    fn raw_variance(&self) -> f64 {
        let mean = self.raw_mean();
        (self.sum_sq / self.count as f64 - mean * mean).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn ts(nanos: i64) -> Timestamp {
        Timestamp::from_nanos(nanos)
    }

    #[test]
    fn test_first_pulse_seeds_only() {
        let mut session = CaptureSession::new();
        assert!(session.observe(ts(5 * NANOS_PER_SEC)).is_none());
        assert_eq!(session.previous(), Some(ts(5 * NANOS_PER_SEC)));
        assert_eq!(session.count(), 0);
        assert!(session.mean_us().is_none());
        assert!(session.std_dev_us().is_none());
    }

    #[test]
    fn test_zero_jitter() {
        let mut session = CaptureSession::new();
        session.observe(ts(0));
        for i in 1..=20 {
            let report = session.observe(ts(i * NANOS_PER_SEC)).unwrap();
            assert_eq!(report.delta_ns, NANOS_PER_SEC);
            assert!(report.deviation_us.abs() < EPS);
            assert!(report.mean_us.abs() < EPS);
            assert!(report.std_dev_us.abs() < EPS);
            assert!(!report.anomalous);
        }
        assert_eq!(session.count(), 20);
    }

    #[test]
    fn test_late_then_on_time() {
        let mut session = CaptureSession::new();
        assert!(session.observe(ts(0)).is_none());

        let first = session.observe(ts(1_000_010_000)).unwrap();
        assert_eq!(first.delta_ns, 1_000_010_000);
        assert!((first.deviation_us - 10.0).abs() < EPS);
        assert!((first.mean_us - 10.0).abs() < EPS);
        assert!(first.std_dev_us.abs() < EPS);
        assert_eq!(
            first.to_string(),
            "diff 1000010000 ns - pps 10.00 - avg 10.00 - std 0.00"
        );

        let second = session.observe(ts(2_000_000_000)).unwrap();
        assert_eq!(second.delta_ns, 999_990_000);
        assert!((second.deviation_us + 10.0).abs() < EPS);
        assert!(second.mean_us.abs() < EPS);
        assert!((second.std_dev_us - 10.0).abs() < EPS);
        assert_eq!(
            second.to_string(),
            "diff 999990000 ns - pps -10.00 - avg 0.00 - std 10.00"
        );
    }

    #[test]
    fn test_matches_direct_population_moments() {
        let deviations_ns: [i64; 8] = [3_000, -1_250, 17, 42_000, -9_999, 0, 512, -77_000];
        let mut session = CaptureSession::new();
        let mut now = 1_700_000_000 * NANOS_PER_SEC;
        session.observe(ts(now));

        let mut seen = Vec::new();
        for dev in deviations_ns {
            now += NANOS_PER_SEC + dev;
            let report = session.observe(ts(now)).unwrap();
            seen.push(dev as f64 / 1000.0);

            let n = seen.len() as f64;
            let mean = seen.iter().sum::<f64>() / n;
            let var = seen.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

            assert!((report.mean_us - mean).abs() < 1e-6, "mean after {n}");
            assert!((report.std_dev_us - var.sqrt()).abs() < 1e-6, "std after {n}");
        }
    }

    #[test]
    fn test_negative_variance_clamped() {
        // Sums as left behind by cancellation: S2/n is just below mean².
        let mut session = CaptureSession {
            previous: Some(ts(0)),
            count: 1,
            sum: 1.0,
            sum_sq: 0.999_999_999_9,
        };
        assert_eq!(session.std_dev_us(), Some(0.0));

        session.count = 0;
        session.sum = 0.0;
        session.sum_sq = 0.0;
        let mut now = 0;
        for _ in 0..1000 {
            now += NANOS_PER_SEC + 100;
            let report = session.observe(ts(now)).unwrap();
            assert!(!report.std_dev_us.is_nan());
            assert_eq!(format!("{:.2}", report.std_dev_us), "0.00");
        }
    }

    #[test]
    fn test_negative_interval_flagged_and_counted() {
        let mut session = CaptureSession::new();
        session.observe(ts(10 * NANOS_PER_SEC));
        let report = session.observe(ts(9 * NANOS_PER_SEC)).unwrap();
        assert!(report.anomalous);
        assert_eq!(report.delta_ns, -NANOS_PER_SEC);
        assert!((report.deviation_us + 2_000_000.0).abs() < EPS);
        assert_eq!(session.count(), 1);
        // Previous is replaced even for anomalous samples.
        assert_eq!(session.previous(), Some(ts(9 * NANOS_PER_SEC)));

        let same = session.observe(ts(9 * NANOS_PER_SEC)).unwrap();
        assert!(same.anomalous);
        assert_eq!(same.delta_ns, 0);
    }

    #[test]
    fn test_extreme_backwards_jump_saturates() {
        let mut session = CaptureSession::new();
        session.observe(Timestamp::new(i64::MAX, 0));
        let report = session.observe(Timestamp::new(i64::MIN, 0)).unwrap();
        assert!(report.anomalous);
        assert_eq!(report.delta_ns, i64::MIN);
        assert!(report.deviation_us < 0.0);
        assert!(report.deviation_us.is_finite());
        assert!(report.std_dev_us.is_finite());
        assert_eq!(session.count(), 1);
    }

    #[test]
    fn test_reset() {
        let mut session = CaptureSession::new();
        session.observe(ts(0));
        session.observe(ts(NANOS_PER_SEC));
        session.reset();
        assert_eq!(session.count(), 0);
        assert!(session.previous().is_none());
        assert!(session.observe(ts(0)).is_none());
    }

    #[test]
    fn test_report_serializes() {
        let report = Report {
            delta_ns: 1_000_000_500,
            deviation_us: 0.5,
            mean_us: 0.5,
            std_dev_us: 0.0,
            anomalous: false,
        };
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["delta_ns"], 1_000_000_500_i64);
        assert_eq!(json["deviation_us"], 0.5);
        assert_eq!(json["anomalous"], false);
    }
}
