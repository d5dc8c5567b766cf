//! Placements: where a horse is kept, at what rate, over time
//!
//! A placement bills `days x daily_rate` for every day of a billing period it
//! covers, both ends inclusive. The day count comes from
//! [`DateRange::clip`], the same intersection every other period computation
//! uses.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::temporal::{interval_contains, intervals_overlap};
use core_kernel::{DateRange, HorseId, LocationId, Money, OwnerId, PlacementId};

use crate::error::YardError;
use crate::owner::RateType;

/// A horse kept at a location under a rate type
///
/// `owner_id` is the legacy direct-billing owner. It only takes part in
/// billing for horses with no ownership records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub id: PlacementId,
    pub horse_id: HorseId,
    pub owner_id: OwnerId,
    pub location_id: LocationId,
    pub rate_type: RateType,
    pub start_date: NaiveDate,
    /// `None` while the horse is still there
    pub end_date: Option<NaiveDate>,
}

impl Placement {
    pub fn daily_rate(&self) -> Money {
        self.rate_type.daily_rate
    }

    pub fn is_current(&self) -> bool {
        self.end_date.is_none()
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        interval_contains(self.start_date, self.end_date, date)
    }

    /// True when both placements share at least one day
    pub fn overlaps(&self, other: &Placement) -> bool {
        intervals_overlap(self.start_date, self.end_date, other.start_date, other.end_date)
    }

    /// The part of `period` this placement covers, if any
    pub fn clip_to(&self, period: &DateRange) -> Option<DateRange> {
        period.clip(self.start_date, self.end_date)
    }
}

/// Days billed and their full-rate amount for one placement in one period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementCharge {
    pub days: i64,
    /// `days x daily_rate`, unrounded
    pub amount: Money,
    /// The billed sub-range, `None` when `days == 0`
    pub period: Option<DateRange>,
}

/// Charge for `placement` within `period`
///
/// Returns zero days and a zero amount when they do not intersect.
pub fn placement_charge_for(placement: &Placement, period: &DateRange) -> PlacementCharge {
    let rate = placement.daily_rate();
    match placement.clip_to(period) {
        Some(billed) => {
            let days = billed.day_count();
            PlacementCharge {
                days,
                amount: rate.multiply(Decimal::from(days)),
                period: Some(billed),
            }
        }
        None => PlacementCharge {
            days: 0,
            amount: Money::zero(rate.currency()),
            period: None,
        },
    }
}

/// Checks a new or edited placement against the horse's other placements
///
/// `existing` may contain the candidate itself (matched by id) when editing.
pub fn validate_placement(existing: &[Placement], candidate: &Placement) -> Result<(), YardError> {
    if let Some(end) = candidate.end_date {
        if end < candidate.start_date {
            return Err(YardError::invalid("End date cannot be before start date"));
        }
    }
    if candidate.daily_rate().is_negative() {
        return Err(YardError::invalid("Daily rate must not be negative"));
    }

    let conflict = existing
        .iter()
        .filter(|p| p.horse_id == candidate.horse_id && p.id != candidate.id)
        .filter(|p| p.overlaps(candidate))
        .min_by_key(|p| p.start_date);

    match conflict {
        Some(p) => {
            debug!(horse = %candidate.horse_id, conflicting = %p.id, "Placement overlaps");
            Err(YardError::PlacementOverlap {
                horse: candidate.horse_id,
                conflicting: p.id,
                conflicting_start: p.start_date,
                conflicting_end: p.end_date,
            })
        }
        None => Ok(()),
    }
}

/// Moving a horse: the current placement ends the day before `move_date`
/// and a new one starts on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub ended: Option<(PlacementId, NaiveDate)>,
    pub next: Placement,
}

/// Builds the placement changes for moving `horse` to `location` on
/// `move_date`
///
/// Owner and rate type carry over from the current placement unless given.
/// A horse with no current placement needs both.
pub fn plan_move(
    current: Option<&Placement>,
    horse: HorseId,
    location: LocationId,
    owner: Option<OwnerId>,
    rate_type: Option<RateType>,
    move_date: NaiveDate,
) -> Result<MovePlan, YardError> {
    let ended = match current {
        Some(p) => {
            let end = move_date
                .pred_opt()
                .ok_or_else(|| YardError::invalid("Move date out of range"))?;
            if end < p.start_date {
                return Err(YardError::invalid(format!(
                    "Move date {} is not after the current placement start {}",
                    move_date, p.start_date
                )));
            }
            Some((p.id, end))
        }
        None => None,
    };

    let owner_id = owner
        .or(current.map(|p| p.owner_id))
        .ok_or_else(|| YardError::invalid("An owner is required for a horse with no current placement"))?;
    let rate_type = rate_type
        .or_else(|| current.map(|p| p.rate_type.clone()))
        .ok_or_else(|| YardError::invalid("A rate type is required for a horse with no current placement"))?;

    Ok(MovePlan {
        ended,
        next: Placement {
            id: PlacementId::new(),
            horse_id: horse,
            owner_id,
            location_id: location,
            rate_type,
            start_date: move_date,
            end_date: None,
        },
    })
}
