//! One-off extra charges (vet, farrier, feed, ...)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ExtraChargeId, HorseId, InvoiceId, Money, OwnerId};

use crate::error::YardError;

/// What an extra charge was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeType {
    Vet,
    Farrier,
    Vaccination,
    Feed,
    Medication,
    Transport,
    Equipment,
    Dentist,
    Physio,
    Other,
}

impl ChargeType {
    pub const ALL: [ChargeType; 10] = [
        ChargeType::Vet,
        ChargeType::Farrier,
        ChargeType::Vaccination,
        ChargeType::Feed,
        ChargeType::Medication,
        ChargeType::Transport,
        ChargeType::Equipment,
        ChargeType::Dentist,
        ChargeType::Physio,
        ChargeType::Other,
    ];

    /// Stored code
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeType::Vet => "vet",
            ChargeType::Farrier => "farrier",
            ChargeType::Vaccination => "vaccination",
            ChargeType::Feed => "feed",
            ChargeType::Medication => "medication",
            ChargeType::Transport => "transport",
            ChargeType::Equipment => "equipment",
            ChargeType::Dentist => "dentist",
            ChargeType::Physio => "physio",
            ChargeType::Other => "other",
        }
    }

    /// Name shown on invoices
    pub fn display_name(&self) -> &'static str {
        match self {
            ChargeType::Vet => "Veterinary",
            ChargeType::Farrier => "Farrier",
            ChargeType::Vaccination => "Vaccination",
            ChargeType::Feed => "Feed/Hay",
            ChargeType::Medication => "Medication",
            ChargeType::Transport => "Transport",
            ChargeType::Equipment => "Equipment",
            ChargeType::Dentist => "Dentist",
            ChargeType::Physio => "Physiotherapy",
            ChargeType::Other => "Other",
        }
    }
}

impl fmt::Display for ChargeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ChargeType {
    type Err = YardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChargeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| YardError::invalid(format!("Unknown charge type: {s}")))
    }
}

/// A one-off charge against a horse
///
/// Direct charges bill `owner_id` in full. Split charges bill every owner
/// holding a share of the horse on `date`, each at their percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraCharge {
    pub id: ExtraChargeId,
    pub horse_id: HorseId,
    pub owner_id: OwnerId,
    pub charge_type: ChargeType,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub invoiced: bool,
    /// The invoice that completed settlement
    pub invoice_id: Option<InvoiceId>,
    pub split_by_ownership: bool,
}

impl ExtraCharge {
    /// Unbilled and dated on or before `period_end`
    pub fn is_billable_by(&self, period_end: NaiveDate) -> bool {
        !self.invoiced && self.date <= period_end
    }

    /// Changes the amount of a charge that has not been invoiced
    pub fn amend_amount(&mut self, amount: Money) -> Result<(), YardError> {
        if self.invoiced {
            return Err(YardError::ChargeAlreadyInvoiced(self.id));
        }
        if amount.is_negative() {
            return Err(YardError::invalid("Charge amount must not be negative"));
        }
        self.amount = amount;
        Ok(())
    }

    /// Records that settlement of this charge completed on `invoice`
    pub fn settle(&mut self, invoice: InvoiceId) {
        self.invoiced = true;
        self.invoice_id = Some(invoice);
    }

    /// Makes the charge billable again after an invoice carrying it was cancelled
    pub fn release(&mut self) {
        self.invoiced = false;
        self.invoice_id = None;
    }
}
