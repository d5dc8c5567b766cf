//! Owners, horses, locations and rate types
//!
//! These are the reference entities the billing engine joins on. They carry
//! no billing logic of their own beyond the daily rate of a [`RateType`].

use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

use core_kernel::{HorseId, LocationId, Money, OwnerId, RateTypeId};

/// A person or business billed for livery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A horse kept at the yard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horse {
    pub id: HorseId,
    pub name: String,
    pub breed: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
}

/// A field, barn or yard a horse can be placed at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
}

/// A named livery package billed per day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateType {
    pub id: RateTypeId,
    pub name: String,
    pub daily_rate: Money,
}
