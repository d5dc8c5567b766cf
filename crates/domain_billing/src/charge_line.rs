//! Per-owner charge lines produced by the aggregator
//!
//! A [`ChargeLine`] is what an owner owes for one placement interval or one
//! extra charge, already reduced to their share and rounded. Invoice line
//! items are snapshots of charge lines.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ExtraChargeId, HorseId, Money, OwnershipId, Percentage, PlacementId};
use domain_yard::ChargeType;

use crate::error::BillingError;

/// Invoice line category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    Livery,
    Vet,
    Farrier,
    Vaccination,
    Feed,
    Other,
}

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::Livery => "livery",
            LineType::Vet => "vet",
            LineType::Farrier => "farrier",
            LineType::Vaccination => "vaccination",
            LineType::Feed => "feed",
            LineType::Other => "other",
        }
    }
}

impl From<ChargeType> for LineType {
    fn from(charge_type: ChargeType) -> Self {
        match charge_type {
            ChargeType::Vet => LineType::Vet,
            ChargeType::Farrier => LineType::Farrier,
            ChargeType::Vaccination => LineType::Vaccination,
            ChargeType::Feed => LineType::Feed,
            ChargeType::Medication
            | ChargeType::Transport
            | ChargeType::Equipment
            | ChargeType::Dentist
            | ChargeType::Physio
            | ChargeType::Other => LineType::Other,
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "livery" => Ok(LineType::Livery),
            "vet" => Ok(LineType::Vet),
            "farrier" => Ok(LineType::Farrier),
            "vaccination" => Ok(LineType::Vaccination),
            "feed" => Ok(LineType::Feed),
            "other" => Ok(LineType::Other),
            other => Err(BillingError::validation(format!("Unknown line type: {other}"))),
        }
    }
}

/// What a line was billed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineSource {
    Placement(PlacementId),
    ExtraCharge(ExtraChargeId),
}

impl LineSource {
    pub fn placement_id(&self) -> Option<PlacementId> {
        match self {
            LineSource::Placement(id) => Some(*id),
            LineSource::ExtraCharge(_) => None,
        }
    }

    pub fn extra_charge_id(&self) -> Option<ExtraChargeId> {
        match self {
            LineSource::ExtraCharge(id) => Some(*id),
            LineSource::Placement(_) => None,
        }
    }
}

/// One owner's charge for one placement interval or one extra charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeLine {
    pub horse_id: HorseId,
    pub source: LineSource,
    pub ownership_id: Option<OwnershipId>,
    pub line_type: LineType,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    /// The owner's amount, equal to `quantity x unit_price`
    pub amount: Money,
    /// The whole charge before the share was applied
    pub full_amount: Money,
    pub ownership_percentage: Option<Percentage>,
    /// First billed day for livery, charge date for extras
    pub service_date: NaiveDate,
}

impl ChargeLine {
    pub fn is_livery(&self) -> bool {
        self.line_type == LineType::Livery
    }
}
