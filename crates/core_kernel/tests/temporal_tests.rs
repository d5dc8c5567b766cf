//! Tests for inclusive date ranges

use chrono::NaiveDate;
use core_kernel::temporal::{intervals_overlap, DateRange, TemporalError};
use proptest::prelude::*;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn test_single_day_range_counts_one_day() {
    let r = DateRange::new(d(2026, 3, 4), d(2026, 3, 4)).unwrap();
    assert_eq!(r.day_count(), 1);
    assert!(r.contains(d(2026, 3, 4)));
}

#[test]
fn test_reversed_range_is_rejected() {
    let err = DateRange::new(d(2026, 2, 1), d(2026, 1, 1)).unwrap_err();
    assert_eq!(
        err,
        TemporalError::InvalidPeriod {
            start: d(2026, 2, 1),
            end: d(2026, 1, 1),
        }
    );
    assert!(err.to_string().contains("2026-02-01"));
}

#[test]
fn test_intersect_is_symmetric() {
    let a = DateRange::new(d(2026, 1, 1), d(2026, 1, 20)).unwrap();
    let b = DateRange::new(d(2026, 1, 10), d(2026, 2, 5)).unwrap();
    let ab = a.intersect(&b).unwrap();
    assert_eq!(ab, b.intersect(&a).unwrap());
    assert_eq!(ab, DateRange::new(d(2026, 1, 10), d(2026, 1, 20)).unwrap());
    assert_eq!(ab.day_count(), 11);
}

#[test]
fn test_range_display() {
    let r = DateRange::month(2026, 1).unwrap();
    assert_eq!(r.to_string(), "2026-01-01 to 2026-01-31");
}

proptest! {
    #[test]
    fn overlaps_agrees_with_intersect(
        a_start in 0i64..120, a_len in 0i64..60,
        b_start in 0i64..120, b_len in 0i64..60
    ) {
        let base = d(2026, 1, 1);
        let a = DateRange::new(
            base + chrono::Duration::days(a_start),
            base + chrono::Duration::days(a_start + a_len),
        ).unwrap();
        let b = DateRange::new(
            base + chrono::Duration::days(b_start),
            base + chrono::Duration::days(b_start + b_len),
        ).unwrap();

        prop_assert_eq!(a.overlaps(&b), a.intersect(&b).is_some());
        prop_assert_eq!(a.overlaps(&b), intervals_overlap(a.start, Some(a.end), b.start, Some(b.end)));
    }

    #[test]
    fn day_count_is_inclusive(start in 0i64..1000, len in 0i64..1000) {
        let base = d(2024, 1, 1);
        let r = DateRange::new(
            base + chrono::Duration::days(start),
            base + chrono::Duration::days(start + len),
        ).unwrap();
        prop_assert_eq!(r.day_count(), len + 1);
    }
}
