//! Pre-built Test Fixtures
//!
//! Ready-to-use values for the livery billing tests. Fixtures are
//! deterministic so that expected totals can be written down by hand.

use chrono::NaiveDate;
use core_kernel::{Currency, DateRange, Money, Percentage};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn gbp(amount: Decimal) -> Money {
        Money::new(amount, Currency::GBP)
    }

    /// Full livery at £5 per day
    pub fn full_livery_rate() -> Money {
        Self::gbp(dec!(5.00))
    }

    /// A routine farrier visit
    pub fn farrier_visit() -> Money {
        Self::gbp(dec!(60.00))
    }

    /// A vet call-out that splits unevenly three ways
    pub fn vet_call_out() -> Money {
        Self::gbp(dec!(48.00))
    }

    /// A EUR amount for currency mismatch tests
    pub fn eur_rate() -> Money {
        Money::new(dec!(5.00), Currency::EUR)
    }
}

/// Fixture for ownership shares
pub struct ShareFixtures;

impl ShareFixtures {
    pub fn whole() -> Percentage {
        Percentage::whole()
    }

    pub fn seventy() -> Percentage {
        Self::of(dec!(70))
    }

    pub fn thirty() -> Percentage {
        Self::of(dec!(30))
    }

    /// Panics on an out-of-range value; fixtures are written by hand
    pub fn of(value: Decimal) -> Percentage {
        Percentage::new(value).expect("fixture share out of range")
    }
}

/// Fixture for calendar data
pub struct TemporalFixtures;

impl TemporalFixtures {
    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("fixture date out of range")
    }

    /// 1 Jan 2026, the usual placement start
    pub fn season_start() -> NaiveDate {
        Self::date(2026, 1, 1)
    }

    /// A mid-month move date
    pub fn move_date() -> NaiveDate {
        Self::date(2026, 1, 21)
    }

    /// January 2026, 31 days
    pub fn january() -> DateRange {
        DateRange::month(2026, 1).expect("fixture month out of range")
    }

    /// February 2026, 28 days
    pub fn february() -> DateRange {
        DateRange::month(2026, 2).expect("fixture month out of range")
    }
}

/// Names for the default yard set up by `YardSeed`
pub struct StringFixtures;

impl StringFixtures {
    pub fn location_name() -> &'static str {
        "Top Yard"
    }

    pub fn full_livery() -> &'static str {
        "Full Livery"
    }
}
