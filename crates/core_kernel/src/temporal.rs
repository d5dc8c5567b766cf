//! Date ranges and yard-local time
//!
//! Billing works on calendar days. Every period-overlap computation in the
//! workspace (placement days, ownership segments, invoice overlap checks)
//! goes through [`DateRange`], whose bounds are both inclusive.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid period: start {start} must not be after end {end}")]
    InvalidPeriod {
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Invalid month: {year}-{month}")]
    InvalidMonth {
        year: i32,
        month: u32,
    },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// A closed range of calendar days, `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range; `start` may equal `end` (a single day)
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TemporalError> {
        if start > end {
            return Err(TemporalError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// The whole calendar month `year-month`
    pub fn month(year: i32, month: u32) -> Result<Self, TemporalError> {
        let invalid = || TemporalError::InvalidMonth { year, month };
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        let end = next.pred_opt().ok_or_else(invalid)?;
        Ok(Self { start, end })
    }

    /// The calendar month before the one containing `date`
    pub fn previous_month(date: NaiveDate) -> Result<Self, TemporalError> {
        if date.month() == 1 {
            Self::month(date.year() - 1, 12)
        } else {
            Self::month(date.year(), date.month() - 1)
        }
    }

    /// Intersects an interval with an optional (open) end against this range
    ///
    /// Returns `None` when they share no day. This is the one place the
    /// day-inclusive intersection is computed.
    pub fn clip(&self, from: NaiveDate, to: Option<NaiveDate>) -> Option<DateRange> {
        let start = from.max(self.start);
        let end = to.map_or(self.end, |t| t.min(self.end));
        if start > end {
            None
        } else {
            Some(DateRange { start, end })
        }
    }

    /// Intersection of two closed ranges
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        self.clip(other.start, Some(other.end))
    }

    /// Number of days covered, counting both ends
    pub fn day_count(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Inclusive overlap test: `self.start <= other.end && self.end >= other.start`
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// True when an interval with an optional open end contains `date`
pub fn interval_contains(from: NaiveDate, to: Option<NaiveDate>, date: NaiveDate) -> bool {
    date >= from && to.map_or(true, |t| date <= t)
}

/// True when two intervals with optional open ends share at least one day
pub fn intervals_overlap(
    a_from: NaiveDate,
    a_to: Option<NaiveDate>,
    b_from: NaiveDate,
    b_to: Option<NaiveDate>,
) -> bool {
    a_to.map_or(true, |a_end| a_end >= b_from) && b_to.map_or(true, |b_end| b_end >= a_from)
}

/// Formats a date as "6 Nov"
pub fn format_day_month(date: NaiveDate) -> String {
    date.format("%-d %b").to_string()
}

/// Formats a date as "3 Jan 2026"
pub fn format_day_month_year(date: NaiveDate) -> String {
    date.format("%-d %b %Y").to_string()
}

/// Timezone wrapper for the yard's local calendar
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| TemporalError::UnknownTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// The calendar date at `instant` in this timezone
    pub fn date_at(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.0).date_naive()
    }

    /// Today's date in this timezone
    pub fn today(&self) -> NaiveDate {
        self.date_at(Utc::now())
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::Europe::London)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        let jan = DateRange::month(2026, 1).unwrap();
        assert_eq!(jan.start, d(2026, 1, 1));
        assert_eq!(jan.end, d(2026, 1, 31));
        assert_eq!(jan.day_count(), 31);

        let feb_leap = DateRange::month(2028, 2).unwrap();
        assert_eq!(feb_leap.day_count(), 29);

        let dec = DateRange::month(2025, 12).unwrap();
        assert_eq!(dec.end, d(2025, 12, 31));

        assert!(DateRange::month(2026, 13).is_err());
    }

    #[test]
    fn test_previous_month_wraps_year() {
        let prev = DateRange::previous_month(d(2026, 1, 15)).unwrap();
        assert_eq!(prev, DateRange::month(2025, 12).unwrap());
    }

    #[test]
    fn test_clip_open_ended() {
        let jan = DateRange::month(2026, 1).unwrap();
        let clipped = jan.clip(d(2025, 6, 1), None).unwrap();
        assert_eq!(clipped, jan);
    }

    #[test]
    fn test_clip_single_day_overlap() {
        let jan = DateRange::month(2026, 1).unwrap();
        let clipped = jan.clip(d(2025, 12, 1), Some(d(2026, 1, 1))).unwrap();
        assert_eq!(clipped.day_count(), 1);
    }

    #[test]
    fn test_clip_disjoint() {
        let jan = DateRange::month(2026, 1).unwrap();
        assert!(jan.clip(d(2026, 2, 1), None).is_none());
        assert!(jan.clip(d(2025, 1, 1), Some(d(2025, 12, 31))).is_none());
    }

    #[test]
    fn test_overlaps_inclusive() {
        let a = DateRange::new(d(2026, 1, 1), d(2026, 1, 31)).unwrap();
        let b = DateRange::new(d(2026, 1, 31), d(2026, 2, 28)).unwrap();
        let c = DateRange::new(d(2026, 2, 1), d(2026, 2, 28)).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_open_interval_helpers() {
        assert!(interval_contains(d(2026, 1, 1), None, d(2030, 1, 1)));
        assert!(!interval_contains(d(2026, 1, 1), Some(d(2026, 1, 15)), d(2026, 1, 16)));
        assert!(intervals_overlap(d(2026, 1, 1), None, d(2025, 1, 1), Some(d(2026, 1, 1))));
        assert!(!intervals_overlap(d(2026, 1, 2), None, d(2025, 1, 1), Some(d(2026, 1, 1))));
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_day_month(d(2025, 11, 6)), "6 Nov");
        assert_eq!(format_day_month_year(d(2026, 1, 3)), "3 Jan 2026");
    }

    #[test]
    fn test_timezone_date_at() {
        let tz: Timezone = "Europe/London".parse().unwrap();
        // 23:30 UTC on 30 June is already 1 July in London (BST)
        let instant = Utc.with_ymd_and_hms(2026, 6, 30, 23, 30, 0).unwrap();
        assert_eq!(tz.date_at(instant), d(2026, 7, 1));
        assert!("Mars/Olympus".parse::<Timezone>().is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn clipped_day_count_is_bounded(
            start_offset in 0i64..400,
            length in 0i64..400,
            open in any::<bool>()
        ) {
            let base = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
            let from = base + chrono::Duration::days(start_offset);
            let to = if open { None } else { Some(from + chrono::Duration::days(length)) };
            let period = DateRange::month(2026, 1).unwrap();

            match period.clip(from, to) {
                Some(range) => {
                    prop_assert!(range.day_count() >= 1);
                    prop_assert!(range.day_count() <= period.day_count());
                }
                None => prop_assert!(!intervals_overlap(from, to, period.start, Some(period.end))),
            }
        }
    }
}
