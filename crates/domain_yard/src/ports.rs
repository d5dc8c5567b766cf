//! Yard Domain Ports
//!
//! The `YardPort` trait is the write path used by placement, ownership and
//! charge management screens. Every implementation enforces the register
//! invariants at write time by calling [`validate_ownership`] and
//! [`validate_placement`] inside its own transaction.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_yard::ports::{YardPort, NewOwnership};
//!
//! let record = yard.record_ownership(NewOwnership {
//!     horse_id,
//!     owner_id,
//!     share: Percentage::new(dec!(60))?,
//!     effective_from: date,
//!     effective_to: None,
//! }).await?;
//! ```
//!
//! [`validate_ownership`]: crate::ownership::validate_ownership
//! [`validate_placement`]: crate::placement::validate_placement

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{
    DomainPort, ExtraChargeId, HorseId, LocationId, Money, OwnerId, OwnershipId, Percentage,
    PlacementId, RateTypeId,
};

use crate::charge::{ChargeType, ExtraCharge};
use crate::error::YardError;
use crate::owner::{Horse, Location, Owner, RateType};
use crate::ownership::OwnershipRecord;
use crate::placement::Placement;

/// Request for creating an owner
#[derive(Debug, Clone, Default)]
pub struct NewOwner {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Request for creating a horse
#[derive(Debug, Clone, Default)]
pub struct NewHorse {
    pub name: String,
    pub breed: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Request for creating a rate type
#[derive(Debug, Clone)]
pub struct NewRateType {
    pub name: String,
    pub daily_rate: Money,
}

/// Request for recording an ownership share
#[derive(Debug, Clone)]
pub struct NewOwnership {
    pub horse_id: HorseId,
    pub owner_id: OwnerId,
    pub share: Percentage,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

/// Request for placing a horse
#[derive(Debug, Clone)]
pub struct NewPlacement {
    pub horse_id: HorseId,
    pub owner_id: OwnerId,
    pub location_id: LocationId,
    pub rate_type_id: RateTypeId,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Request for moving a horse to a new location
///
/// Owner and rate type default to those of the current placement.
#[derive(Debug, Clone)]
pub struct MoveHorse {
    pub horse_id: HorseId,
    pub location_id: LocationId,
    pub owner_id: Option<OwnerId>,
    pub rate_type_id: Option<RateTypeId>,
    pub move_date: NaiveDate,
}

/// Request for recording an extra charge
#[derive(Debug, Clone)]
pub struct NewExtraCharge {
    pub horse_id: HorseId,
    pub owner_id: OwnerId,
    pub charge_type: ChargeType,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub split_by_ownership: bool,
}

/// Write and lookup operations on the yard register
#[async_trait]
pub trait YardPort: DomainPort {
    async fn create_owner(&self, request: NewOwner) -> Result<Owner, YardError>;

    async fn get_owner(&self, id: OwnerId) -> Result<Owner, YardError>;

    async fn create_horse(&self, request: NewHorse) -> Result<Horse, YardError>;

    async fn create_location(&self, name: String) -> Result<Location, YardError>;

    async fn create_rate_type(&self, request: NewRateType) -> Result<RateType, YardError>;

    /// Changes a rate for future billing; existing invoices keep their
    /// stored line totals
    async fn update_daily_rate(&self, id: RateTypeId, daily_rate: Money) -> Result<RateType, YardError>;

    /// Records a share, rejecting overlaps and totals above 100%
    async fn record_ownership(&self, request: NewOwnership) -> Result<OwnershipRecord, YardError>;

    /// Ends a share on `effective_to` (inclusive)
    async fn end_ownership(
        &self,
        id: OwnershipId,
        effective_to: NaiveDate,
    ) -> Result<OwnershipRecord, YardError>;

    async fn ownerships_for_horse(&self, horse: HorseId) -> Result<Vec<OwnershipRecord>, YardError>;

    /// Places a horse, rejecting overlap with its other placements
    async fn record_placement(&self, request: NewPlacement) -> Result<Placement, YardError>;

    /// Ends a placement on `end_date` (inclusive)
    async fn end_placement(&self, id: PlacementId, end_date: NaiveDate) -> Result<Placement, YardError>;

    /// Ends the current placement the day before `move_date` and opens a new one
    async fn move_horse(&self, request: MoveHorse) -> Result<Placement, YardError>;

    async fn placements_for_horse(&self, horse: HorseId) -> Result<Vec<Placement>, YardError>;

    async fn record_extra_charge(&self, request: NewExtraCharge) -> Result<ExtraCharge, YardError>;

    /// Rejected with `ChargeAlreadyInvoiced` once the charge is invoiced
    async fn update_extra_charge_amount(
        &self,
        id: ExtraChargeId,
        amount: Money,
    ) -> Result<ExtraCharge, YardError>;

    async fn get_extra_charge(&self, id: ExtraChargeId) -> Result<ExtraCharge, YardError>;
}

impl NewExtraCharge {
    pub fn into_charge(self) -> Result<ExtraCharge, YardError> {
        if self.amount.is_negative() {
            return Err(YardError::invalid("Charge amount must not be negative"));
        }
        Ok(ExtraCharge {
            id: ExtraChargeId::new(),
            horse_id: self.horse_id,
            owner_id: self.owner_id,
            charge_type: self.charge_type,
            date: self.date,
            description: self.description,
            amount: self.amount,
            invoiced: false,
            invoice_id: None,
            split_by_ownership: self.split_by_ownership,
        })
    }
}

impl NewOwnership {
    pub fn into_record(self) -> OwnershipRecord {
        OwnershipRecord {
            id: OwnershipId::new(),
            horse_id: self.horse_id,
            owner_id: self.owner_id,
            share: self.share,
            effective_from: self.effective_from,
            effective_to: self.effective_to,
        }
    }
}

impl NewPlacement {
    /// Builds the placement once the rate type has been looked up
    pub fn into_placement(self, rate_type: RateType) -> Placement {
        Placement {
            id: PlacementId::new(),
            horse_id: self.horse_id,
            owner_id: self.owner_id,
            location_id: self.location_id,
            rate_type,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}
