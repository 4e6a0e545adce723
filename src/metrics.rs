use crate::histogram::{BucketLayout, Histogram, COUNT_LAYOUT, KB_LAYOUT, MS_LAYOUT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Measurement dimension tracked by a [`LabelMonitor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Response time in milliseconds, one observation per request
    Milliseconds,
    /// Received payload size in kilobytes
    Kilobytes,
    /// Failure count per original label, weight 1 per failure
    Exception,
    /// Response time of failed requests keyed by the error label
    JMeterErrors,
}

pub const UNIT_MS: Unit = Unit::Milliseconds;
pub const UNIT_KB: Unit = Unit::Kilobytes;
pub const UNIT_EXCEPTION: Unit = Unit::Exception;
pub const UNIT_JMETER_ERRORS: Unit = Unit::JMeterErrors;

impl Unit {
    /// Bucket layout used for monitors of this unit
    pub fn layout(self) -> &'static BucketLayout {
        match self {
            Unit::Milliseconds | Unit::JMeterErrors => &MS_LAYOUT,
            Unit::Kilobytes => &KB_LAYOUT,
            Unit::Exception => &COUNT_LAYOUT,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Milliseconds => write!(f, "ms."),
            Unit::Kilobytes => write!(f, "kb."),
            Unit::Exception => write!(f, "Exception"),
            Unit::JMeterErrors => write!(f, "JMeter Errors"),
        }
    }
}

/// Running statistics for one `(label, unit)` pair
///
/// `sum` and `sum_of_squares` are plain `f64` accumulators. They are independent of
/// arrival order only while every partial sum stays exact in 53 bits. Millisecond
/// durations stay well inside that range, but `kb.` squares of responses above roughly
/// 90 MB lose low bits and may then differ by rounding between orderings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelMonitor {
    pub label: String,
    pub unit: Unit,
    pub count: u64,
    pub sum: f64,
    pub sum_of_squares: f64,
    pub min: f64,
    pub max: f64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub histogram: Histogram,
}

impl LabelMonitor {
    /// Create a zero-valued monitor
    pub fn new(label: impl Into<String>, unit: Unit) -> Self {
        Self {
            label: label.into(),
            unit,
            count: 0,
            sum: 0.0,
            sum_of_squares: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            first_seen: None,
            last_seen: None,
            histogram: Histogram::new(unit.layout()),
        }
    }

    /// Fold one observation into the running statistics
    pub fn update(&mut self, timestamp: DateTime<Utc>, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_of_squares += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.observe_time(timestamp, timestamp);
        self.histogram.observe(value);
    }

    fn observe_time(&mut self, first: DateTime<Utc>, last: DateTime<Utc>) {
        self.first_seen = Some(self.first_seen.map_or(first, |seen| seen.min(first)));
        self.last_seen = Some(self.last_seen.map_or(last, |seen| seen.max(last)));
    }

    /// Fold another monitor for the same key into this one
    pub fn merge(&mut self, other: &LabelMonitor) {
        debug_assert_eq!(self.unit, other.unit);
        if other.count == 0 {
            return;
        }
        self.count += other.count;
        self.sum += other.sum;
        self.sum_of_squares += other.sum_of_squares;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        if let (Some(first), Some(last)) = (other.first_seen, other.last_seen) {
            self.observe_time(first, last);
        }
        self.histogram.merge(&other.histogram);
    }

    pub fn hits(&self) -> u64 {
        self.count
    }

    pub fn total(&self) -> f64 {
        self.sum
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Population standard deviation, clamped at zero against rounding error
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let variance = self.sum_of_squares / n - mean * mean;
        variance.max(0.0).sqrt()
    }

    /// Smallest observed value, `None` before the first update
    pub fn min_value(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    /// Largest observed value, `None` before the first update
    pub fn max_value(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_update_tracks_statistics() {
        let mut monitor = LabelMonitor::new("Login", UNIT_MS);
        monitor.update(at(1_000), 10.0);
        monitor.update(at(2_000), 30.0);
        monitor.update(at(3_000), 20.0);

        assert_eq!(monitor.hits(), 3);
        assert_eq!(monitor.total(), 60.0);
        assert_eq!(monitor.mean(), 20.0);
        assert_eq!(monitor.min_value(), Some(10.0));
        assert_eq!(monitor.max_value(), Some(30.0));
        assert_eq!(monitor.histogram.total(), 3);
    }

    #[test]
    fn test_std_dev() {
        let mut monitor = LabelMonitor::new("Login", UNIT_MS);
        for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            monitor.update(at(0), value);
        }
        assert!((monitor.std_dev() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_std_dev_never_negative() {
        let mut monitor = LabelMonitor::new("Login", UNIT_MS);
        for _ in 0..1000 {
            monitor.update(at(0), 0.1);
        }
        assert!(monitor.std_dev() >= 0.0);
        assert!(!monitor.std_dev().is_nan());
    }

    #[test]
    fn test_first_and_last_seen_are_order_independent() {
        let mut forward = LabelMonitor::new("Login", UNIT_MS);
        let mut backward = LabelMonitor::new("Login", UNIT_MS);
        let samples = [(5_000, 1.0), (1_000, 2.0), (9_000, 3.0), (3_000, 4.0)];

        for (ts, value) in samples {
            forward.update(at(ts), value);
        }
        for (ts, value) in samples.iter().rev() {
            backward.update(at(*ts), *value);
        }

        assert_eq!(forward.first_seen, Some(at(1_000)));
        assert_eq!(forward.last_seen, Some(at(9_000)));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_large_kb_values_agree_within_rounding() {
        let values: Vec<f64> = (0..500u64)
            .map(|i| (300_000_000 + i * 7_919_123) as f64 / 1024.0)
            .collect();
        let mut forward = LabelMonitor::new("Download", UNIT_KB);
        let mut backward = LabelMonitor::new("Download", UNIT_KB);
        for value in &values {
            forward.update(at(0), *value);
        }
        for value in values.iter().rev() {
            backward.update(at(0), *value);
        }

        assert_eq!(forward.count, backward.count);
        assert_eq!(forward.min, backward.min);
        assert_eq!(forward.max, backward.max);
        assert_eq!(forward.histogram, backward.histogram);
        let relative = |a: f64, b: f64| (a - b).abs() / a.abs().max(b.abs());
        assert!(relative(forward.sum, backward.sum) < 1e-12);
        assert!(relative(forward.sum_of_squares, backward.sum_of_squares) < 1e-12);
        assert!(relative(forward.std_dev(), backward.std_dev()) < 1e-6);
    }

    #[test]
    fn test_empty_monitor() {
        let monitor = LabelMonitor::new("Login", UNIT_KB);
        assert!(monitor.is_empty());
        assert_eq!(monitor.mean(), 0.0);
        assert_eq!(monitor.std_dev(), 0.0);
        assert_eq!(monitor.min_value(), None);
        assert_eq!(monitor.first_seen, None);
    }

    #[test]
    fn test_merge_matches_sequential_updates() {
        let mut combined = LabelMonitor::new("Login", UNIT_MS);
        let mut left = LabelMonitor::new("Login", UNIT_MS);
        let mut right = LabelMonitor::new("Login", UNIT_MS);

        for (i, value) in [15.0, 250.0, 3.0, 7000.0, 42.0].iter().enumerate() {
            let ts = at(i as i64 * 100);
            combined.update(ts, *value);
            if i % 2 == 0 {
                left.update(ts, *value);
            } else {
                right.update(ts, *value);
            }
        }

        left.merge(&right);
        assert_eq!(left, combined);
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let mut monitor = LabelMonitor::new("Login", UNIT_MS);
        monitor.update(at(10), 12.0);
        let before = monitor.clone();

        monitor.merge(&LabelMonitor::new("Login", UNIT_MS));
        assert_eq!(monitor, before);
    }

    #[test]
    fn test_unit_layouts() {
        assert_eq!(UNIT_MS.layout().slots(), 13);
        assert_eq!(UNIT_JMETER_ERRORS.layout().slots(), 13);
        assert_eq!(UNIT_KB.layout().slots(), 13);
        assert_eq!(UNIT_EXCEPTION.layout().slots(), 1);
        assert_eq!(UNIT_JMETER_ERRORS.to_string(), "JMeter Errors");
    }
}
