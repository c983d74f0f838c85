//! Core domain models for GoldVault

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// A single stored price observation, raw or compacted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the sample was taken, or the start of the day a compacted sample stands for
    pub timestamp: DateTime<Utc>,
    /// USD per troy ounce
    pub raw_price: f64,
    /// KWD per gram, fixed at ingestion time
    pub derived_value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, raw_price: f64, derived_value: f64) -> Self {
        Self {
            timestamp,
            raw_price,
            derived_value,
        }
    }
}

/// Half-open time range `[start, end)` used for store queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Range with both bounds: `start <= t < end`
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end,
        }
    }

    /// Everything strictly older than `end`
    pub fn before(end: DateTime<Utc>) -> Self {
        Self { start: None, end }
    }

    #[inline]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| ts >= start) && ts < self.end
    }
}

/// How long raw detail is kept and when a day is folded into one average.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Samples older than this are deleted outright
    pub max_age: Duration,
    /// A day is compacted only when it holds strictly more samples than this
    pub compaction_threshold: usize,
    /// Offset used to decide where calendar days begin
    pub utc_offset: FixedOffset,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::days(7),
            compaction_threshold: 10,
            utc_offset: Utc.fix(),
        }
    }
}

/// Daily mean of a set of samples, produced by compaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyAverage {
    pub raw_price: f64,
    pub derived_value: f64,
    pub count: usize,
}

impl DailyAverage {
    /// Arithmetic mean of both price columns. `None` for an empty slice.
    pub fn from_samples(samples: &[Sample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let (raw_sum, derived_sum) = samples.iter().fold((0.0, 0.0), |(raw, derived), s| {
            (raw + s.raw_price, derived + s.derived_value)
        });
        let count = samples.len();

        Some(Self {
            raw_price: raw_sum / count as f64,
            derived_value: derived_sum / count as f64,
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_range_is_half_open() {
        let range = TimeRange::between(at(0), at(12));
        assert!(range.contains(at(0)));
        assert!(range.contains(at(11)));
        assert!(!range.contains(at(12)));
    }

    #[test]
    fn test_before_range_is_strict() {
        let range = TimeRange::before(at(6));
        assert!(range.contains(at(5)));
        assert!(!range.contains(at(6)));
    }

    #[test]
    fn test_daily_average_means() {
        let mut samples: Vec<Sample> = (0..11).map(|_| Sample::new(at(1), 2000.0, 10.0)).collect();
        samples.push(Sample::new(at(2), 2600.0, 20.0));

        let avg = DailyAverage::from_samples(&samples).unwrap();
        assert_eq!(avg.count, 12);
        assert!((avg.derived_value - 10.8333).abs() < 1e-3);
        assert!((avg.raw_price - 2050.0).abs() < 1e-9);
    }

    #[test]
    fn test_daily_average_empty() {
        assert!(DailyAverage::from_samples(&[]).is_none());
    }

    #[test]
    fn test_default_policy() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.max_age, Duration::days(7));
        assert_eq!(policy.compaction_threshold, 10);
        assert_eq!(policy.utc_offset.local_minus_utc(), 0);
    }
}
