//! Property-Based Test Generators
//!
//! proptest strategies for yards that respect the register's invariants:
//! non-negative rates, shares that never exceed 100% and real calendar months.

use core_kernel::{Currency, DateRange, Money, Percentage};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Daily rates between £0.00 and £99.9999
pub fn daily_rate_strategy() -> impl Strategy<Value = Money> {
    (0i64..1_000_000i64).prop_map(|n| Money::new(Decimal::new(n, 4), Currency::GBP))
}

/// Extra charge amounts between £0.01 and £9,999.99
pub fn charge_amount_strategy() -> impl Strategy<Value = Money> {
    (1i64..1_000_000i64).prop_map(|minor| Money::from_minor(minor, Currency::GBP))
}

/// `count` shares with two decimals that add up to exactly 100%
pub fn shares_summing_to_whole(count: usize) -> impl Strategy<Value = Vec<Percentage>> {
    proptest::collection::vec(1i64..1_000i64, count..=count).prop_map(|weights| {
        let total: i64 = weights.iter().sum();
        let mut hundredths: Vec<i64> = weights.iter().map(|w| w * 10_000 / total).collect();
        // Floor division leaves a remainder; give it to the first holder
        let assigned: i64 = hundredths.iter().sum();
        hundredths[0] += 10_000 - assigned;
        hundredths
            .into_iter()
            .map(|h| Percentage::new(Decimal::new(h, 2)).expect("generated share in range"))
            .collect()
    })
}

/// Calendar months of 2025 to 2027
pub fn month_strategy() -> impl Strategy<Value = DateRange> {
    (2025i32..=2027i32, 1u32..=12u32)
        .prop_map(|(year, month)| DateRange::month(year, month).expect("valid month"))
}
