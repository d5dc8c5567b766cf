//! Invoice numbering and business billing settings

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use core_kernel::Currency;

use crate::error::BillingError;

/// The business-wide billing settings singleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSettings {
    pub invoice_prefix: String,
    /// The number the next invoice will take
    pub next_invoice_number: i64,
    pub default_payment_terms_days: i32,
    pub currency: Currency,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            invoice_prefix: "INV".to_string(),
            next_invoice_number: 1,
            default_payment_terms_days: 30,
            currency: Currency::GBP,
        }
    }
}

impl BillingSettings {
    /// Takes the next number and advances the counter
    pub fn take_next_number(&mut self) -> AllocatedNumber {
        let sequence = self.next_invoice_number;
        self.next_invoice_number += 1;
        AllocatedNumber {
            invoice_number: format_invoice_number(&self.invoice_prefix, sequence),
            sequence,
            payment_terms_days: self.default_payment_terms_days,
            currency: self.currency,
        }
    }
}

/// A freshly allocated invoice number with the settings in force when it
/// was taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedNumber {
    pub invoice_number: String,
    pub sequence: i64,
    pub payment_terms_days: i32,
    pub currency: Currency,
}

impl AllocatedNumber {
    /// `period_end` plus the payment terms
    pub fn due_date_for(&self, period_end: NaiveDate) -> Result<NaiveDate, BillingError> {
        let terms = u64::try_from(self.payment_terms_days)
            .map_err(|_| BillingError::validation("Payment terms must not be negative"))?;
        period_end
            .checked_add_days(Days::new(terms))
            .ok_or_else(|| BillingError::validation("Due date out of range"))
    }
}

/// Prefix followed by the number zero-padded to five digits: `INV00042`
pub fn format_invoice_number(prefix: &str, number: i64) -> String {
    format!("{prefix}{number:05}")
}
