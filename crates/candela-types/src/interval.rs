//! Candle interval definitions and bucket alignment.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Default share of an interval, in percent, after which a tick is folded
/// into the next bucket.
pub const DEFAULT_LATE_TOLERANCE_PCT: u32 = 10;

/// Candle aggregation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// 1-second candles.
    #[serde(rename = "1s")]
    Second1,
    /// 5-second candles.
    #[serde(rename = "5s")]
    Second5,
    /// 1-minute candles.
    #[serde(rename = "1m")]
    Minute1,
    /// 5-minute candles.
    #[serde(rename = "5m")]
    Minute5,
    /// 15-minute candles.
    #[serde(rename = "15m")]
    Minute15,
    /// 1-hour candles.
    #[serde(rename = "1h")]
    Hour1,
    /// 4-hour candles.
    #[serde(rename = "4h")]
    Hour4,
    /// Daily candles.
    #[serde(rename = "1d")]
    Day1,
}

impl Interval {
    /// Returns the bucket duration in seconds.
    #[must_use]
    pub const fn seconds(&self) -> i64 {
        match self {
            Self::Second1 => 1,
            Self::Second5 => 5,
            Self::Minute1 => 60,
            Self::Minute5 => 300,
            Self::Minute15 => 900,
            Self::Hour1 => 3600,
            Self::Hour4 => 14400,
            Self::Day1 => 86400,
        }
    }

    /// Returns the interval as its canonical string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Second1 => "1s",
            Self::Second5 => "5s",
            Self::Minute1 => "1m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
        }
    }

    /// Returns all supported intervals, shortest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Second1,
            Self::Second5,
            Self::Minute1,
            Self::Minute5,
            Self::Minute15,
            Self::Hour1,
            Self::Hour4,
            Self::Day1,
        ]
    }

    /// Returns the start of the bucket `timestamp` naturally falls into.
    #[must_use]
    pub const fn floor(&self, timestamp: i64) -> i64 {
        let duration = self.seconds();
        timestamp.div_euclid(duration) * duration
    }

    /// Aligns a timestamp to its bucket using the default late tolerance.
    ///
    /// Returns `None` only if the next bucket start would overflow `i64`.
    #[must_use]
    pub const fn align(&self, timestamp: i64) -> Option<i64> {
        self.align_with_tolerance(timestamp, DEFAULT_LATE_TOLERANCE_PCT)
    }

    /// Aligns a timestamp to its bucket, folding late ticks forward.
    ///
    /// A tick whose offset into its natural bucket is strictly greater than
    /// `tolerance_pct` percent of the interval is assigned to the following
    /// bucket. A tick exactly at the threshold stays where it is.
    ///
    /// Returns `None` only if the next bucket start would overflow `i64`.
    #[must_use]
    pub const fn align_with_tolerance(&self, timestamp: i64, tolerance_pct: u32) -> Option<i64> {
        let duration = self.seconds();
        let start = self.floor(timestamp);
        let offset = (timestamp - start) as i128;
        let threshold = duration as i128 * tolerance_pct as i128;

        if offset * 100 > threshold {
            start.checked_add(duration)
        } else {
            Some(start)
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Interval {
    type Err = UnsupportedInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1s" | "s1" => Ok(Self::Second1),
            "5s" | "s5" => Ok(Self::Second5),
            "1m" | "m1" => Ok(Self::Minute1),
            "5m" | "m5" => Ok(Self::Minute5),
            "15m" | "m15" => Ok(Self::Minute15),
            "1h" | "h1" => Ok(Self::Hour1),
            "4h" | "h4" => Ok(Self::Hour4),
            "1d" | "d1" => Ok(Self::Day1),
            _ => Err(UnsupportedInterval(s.to_string())),
        }
    }
}

/// Error returned when an interval string names no supported interval.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported interval '{0}', expected one of: 1s, 5s, 1m, 5m, 15m, 1h, 4h, 1d")]
pub struct UnsupportedInterval(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_seconds() {
        assert_eq!(Interval::Second1.seconds(), 1);
        assert_eq!(Interval::Second5.seconds(), 5);
        assert_eq!(Interval::Minute1.seconds(), 60);
        assert_eq!(Interval::Minute15.seconds(), 900);
        assert_eq!(Interval::Hour4.seconds(), 14400);
        assert_eq!(Interval::Day1.seconds(), 86400);
    }

    #[test]
    fn test_interval_parse() {
        assert_eq!("1m".parse::<Interval>().unwrap(), Interval::Minute1);
        assert_eq!("H4".parse::<Interval>().unwrap(), Interval::Hour4);
        assert_eq!(" 15m ".parse::<Interval>().unwrap(), Interval::Minute15);
        assert_eq!(
            "2m".parse::<Interval>(),
            Err(UnsupportedInterval("2m".to_string()))
        );
        assert!("tick".parse::<Interval>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for interval in Interval::all() {
            assert_eq!(interval.to_string().parse::<Interval>().unwrap(), *interval);
        }
    }

    #[test]
    fn test_floor_alignment() {
        assert_eq!(Interval::Minute1.floor(1_000), 960);
        assert_eq!(Interval::Minute5.floor(600), 600);
        assert_eq!(Interval::Hour1.floor(7_199), 3_600);
    }

    #[test]
    fn test_on_time_ticks_stay_in_bucket() {
        // 1s buckets never have a non-zero integer offset.
        assert_eq!(Interval::Second1.align(1_000), Some(1_000));
        assert_eq!(Interval::Minute1.align(960), Some(960));
        assert_eq!(Interval::Minute1.align(965), Some(960));
    }

    #[test]
    fn test_late_tolerance_threshold_is_exclusive() {
        // 10% of 60s is 6s.
        assert_eq!(Interval::Minute1.align(960 + 6), Some(960));
        assert_eq!(Interval::Minute1.align(960 + 7), Some(1_020));

        // 10% of 3600s is 360s.
        assert_eq!(Interval::Hour1.align(3_600 + 360), Some(3_600));
        assert_eq!(Interval::Hour1.align(3_600 + 361), Some(7_200));

        // 10% of 5s is 0.5s, so any whole-second offset is late.
        assert_eq!(Interval::Second5.align(1_000), Some(1_000));
        assert_eq!(Interval::Second5.align(1_001), Some(1_005));
    }

    #[test]
    fn test_custom_tolerance() {
        assert_eq!(Interval::Minute1.align_with_tolerance(990, 50), Some(960));
        assert_eq!(Interval::Minute1.align_with_tolerance(991, 50), Some(1_020));
        assert_eq!(Interval::Minute1.align_with_tolerance(961, 0), Some(1_020));
        assert_eq!(Interval::Minute1.align_with_tolerance(1_019, 100), Some(960));
    }

    #[test]
    fn test_align_is_idempotent() {
        for interval in Interval::all() {
            for ts in [1_i64, 59, 60, 1_640_995_200, 1_640_995_259] {
                let bucket = interval.align(ts).unwrap();
                assert_eq!(bucket % interval.seconds(), 0);
                assert_eq!(interval.align(bucket), Some(bucket));
                assert_eq!(interval.align(ts), Some(bucket));
            }
        }
    }

    #[test]
    fn test_align_overflow_is_reported() {
        assert_eq!(Interval::Day1.align(i64::MAX), None);
    }
}
