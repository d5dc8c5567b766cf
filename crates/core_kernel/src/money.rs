//! Money types with precise decimal arithmetic
//!
//! This module provides a type-safe representation of monetary values
//! using rust_decimal for precise calculations without floating-point errors.
//! Amounts are kept exact; rounding happens only where a caller asks for it.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    GBP,
    EUR,
    USD,
    CHF,
    JPY,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::GBP => "£",
            Currency::EUR => "€",
            Currency::USD => "$",
            Currency::CHF => "CHF",
            Currency::JPY => "¥",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::GBP => "GBP",
            Currency::EUR => "EUR",
            Currency::USD => "USD",
            Currency::CHF => "CHF",
            Currency::JPY => "JPY",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GBP" => Ok(Currency::GBP),
            "EUR" => Ok(Currency::EUR),
            "USD" => Ok(Currency::USD),
            "CHF" => Ok(Currency::CHF),
            "JPY" => Ok(Currency::JPY),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid percentage: {0} (must be between 0.01 and 100.00)")]
    InvalidPercentage(Decimal),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
}

/// A monetary amount with associated currency
///
/// The amount is stored exactly as given. `days x daily rate` and similar
/// products therefore carry no hidden intermediate rounding; use
/// [`Money::round_half_up`] when a value is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates Money from an integer amount in minor units (e.g., pence)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self::new(Decimal::new(minor_units, currency.decimal_places()), currency)
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: dec!(0),
            currency,
        }
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is positive
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Returns true if the amount is negative
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Rounds to the currency's decimal places, half away from zero
    ///
    /// For the non-negative amounts billed here this is the conventional
    /// "round half up" (0.005 becomes 0.01).
    pub fn round_half_up(&self) -> Self {
        Self {
            amount: self.amount.round_dp_with_strategy(
                self.currency.decimal_places(),
                RoundingStrategy::MidpointAwayFromZero,
            ),
            currency: self.currency,
        }
    }

    /// Checked addition that returns an error on currency mismatch
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    /// Multiplies by a scalar without rounding (e.g., days x daily rate)
    pub fn multiply(&self, factor: Decimal) -> Self {
        Self::new(self.amount * factor, self.currency)
    }

    /// Sums an iterator of amounts, all of which must share `currency`
    pub fn sum<'a, I>(currency: Currency, items: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        items
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    /// Short form used in line descriptions: symbol followed by the
    /// normalized amount, so 10.00 renders as "£10" and 10.50 as "£10.5"
    pub fn compact(&self) -> String {
        format!("{}{}", self.currency.symbol(), self.amount.normalize())
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places();
        write!(
            f,
            "{}{:.dp$}",
            self.currency.symbol(),
            self.amount,
            dp = dp as usize
        )
    }
}

/// An ownership share expressed as a percentage between 0.01 and 100.00
///
/// Stored as a decimal with at most two places, never as a float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage(Decimal);

impl Percentage {
    /// The largest share a single record (or all records together) may hold
    pub const MAX: Decimal = dec!(100.00);
    /// The smallest share a record may hold
    pub const MIN: Decimal = dec!(0.01);

    /// Creates a percentage, rejecting values outside 0.01..=100.00 or with
    /// more than two decimal places
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value < Self::MIN || value > Self::MAX || value.normalize().scale() > 2 {
            return Err(MoneyError::InvalidPercentage(value));
        }
        Ok(Self(value))
    }

    /// A whole (100%) share
    pub fn whole() -> Self {
        Self(Self::MAX)
    }

    /// Returns the raw percentage value (e.g., 33.33)
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns the share as a fraction (e.g., 0.3333)
    pub fn fraction(&self) -> Decimal {
        self.0 / dec!(100)
    }

    /// True when this share is the entire horse
    pub fn is_whole(&self) -> bool {
        self.0 >= Self::MAX
    }

    /// Applies this share to an exact amount, rounding the result half-up to
    /// the currency's minor unit
    ///
    /// This is the single point where per-owner amounts are rounded.
    pub fn share_of(&self, amount: &Money) -> Money {
        amount.multiply(self.fraction()).round_half_up()
    }
}

impl TryFrom<Decimal> for Percentage {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for Decimal {
    fn from(p: Percentage) -> Decimal {
        p.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn share_of_never_exceeds_half_a_penny_error(
            minor in 0i64..10_000_000i64,
            pct in 1i64..=10_000i64
        ) {
            let amount = Money::from_minor(minor, Currency::GBP);
            let share = Percentage::new(Decimal::new(pct, 2)).unwrap();
            let exact = amount.amount() * share.fraction();
            let rounded = share.share_of(&amount).amount();

            prop_assert!((rounded - exact).abs() <= dec!(0.005));
            prop_assert!(rounded.scale() <= 2);
        }

        #[test]
        fn money_addition_is_associative(
            a in -1_000_000i64..1_000_000i64,
            b in -1_000_000i64..1_000_000i64,
            c in -1_000_000i64..1_000_000i64
        ) {
            let ma = Money::from_minor(a, Currency::GBP);
            let mb = Money::from_minor(b, Currency::GBP);
            let mc = Money::from_minor(c, Currency::GBP);

            let left = ma.checked_add(&mb).unwrap().checked_add(&mc).unwrap();
            let right = ma.checked_add(&mb.checked_add(&mc).unwrap()).unwrap();
            prop_assert_eq!(left, right);
        }
    }
}
