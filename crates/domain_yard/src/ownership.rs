//! Fractional, time-bounded horse ownership
//!
//! One [`OwnershipRecord`] says an owner holds a percentage of a horse from
//! `effective_from` until `effective_to` (inclusive, `None` while current).
//! The [`OwnershipRegister`] answers the two questions billing asks of it:
//! who owns the horse on a given day, and which share intervals of one owner
//! fall inside a billing period.
//!
//! Horses with no ownership records at all fall back to an implicit 100%
//! share held by each placement's owner over that placement's interval.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::temporal::{interval_contains, intervals_overlap};
use core_kernel::{DateRange, HorseId, OwnerId, OwnershipId, Percentage, PlacementId};

use crate::error::{OwnershipConflictKind, YardError};
use crate::placement::Placement;

/// An owner's share of a horse over an interval of days
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub id: OwnershipId,
    pub horse_id: HorseId,
    pub owner_id: OwnerId,
    pub share: Percentage,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl OwnershipRecord {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        interval_contains(self.effective_from, self.effective_to, date)
    }

    pub fn overlaps(&self, other: &OwnershipRecord) -> bool {
        intervals_overlap(
            self.effective_from,
            self.effective_to,
            other.effective_from,
            other.effective_to,
        )
    }
}

/// Where a share came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareBasis {
    /// An explicit ownership record
    Recorded(OwnershipId),
    /// The implicit whole share of a placement owner on an unrecorded horse
    PlacementOwner(PlacementId),
}

impl ShareBasis {
    pub fn ownership_id(&self) -> Option<OwnershipId> {
        match self {
            ShareBasis::Recorded(id) => Some(*id),
            ShareBasis::PlacementOwner(_) => None,
        }
    }
}

/// One owner's share of a horse on a particular day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveShare {
    pub owner_id: OwnerId,
    pub percentage: Percentage,
    pub basis: ShareBasis,
}

/// One share interval of an owner, clipped to a billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareSegment {
    pub basis: ShareBasis,
    pub percentage: Percentage,
    pub period: DateRange,
}

/// Read view over the ownership records and placements of some horses
///
/// Callers pass every record and placement of the horses they ask about;
/// the implicit share only applies when a horse has no records in the slice.
#[derive(Debug, Clone, Copy)]
pub struct OwnershipRegister<'a> {
    records: &'a [OwnershipRecord],
    placements: &'a [Placement],
}

impl<'a> OwnershipRegister<'a> {
    pub fn new(records: &'a [OwnershipRecord], placements: &'a [Placement]) -> Self {
        Self { records, placements }
    }

    fn records_for(&self, horse: HorseId) -> impl Iterator<Item = &'a OwnershipRecord> + 'a {
        self.records.iter().filter(move |r| r.horse_id == horse)
    }

    fn placements_for(&self, horse: HorseId) -> impl Iterator<Item = &'a Placement> + 'a {
        self.placements.iter().filter(move |p| p.horse_id == horse)
    }

    /// True when the horse has at least one ownership record
    pub fn is_recorded(&self, horse: HorseId) -> bool {
        self.records_for(horse).next().is_some()
    }

    /// Every share of `horse` whose interval contains `as_of`
    pub fn active_shares(&self, horse: HorseId, as_of: NaiveDate) -> Vec<ActiveShare> {
        if self.is_recorded(horse) {
            self.records_for(horse)
                .filter(|r| r.is_active_on(as_of))
                .map(|r| ActiveShare {
                    owner_id: r.owner_id,
                    percentage: r.share,
                    basis: ShareBasis::Recorded(r.id),
                })
                .collect()
        } else {
            self.placements_for(horse)
                .filter(|p| p.is_active_on(as_of))
                .map(|p| ActiveShare {
                    owner_id: p.owner_id,
                    percentage: Percentage::whole(),
                    basis: ShareBasis::PlacementOwner(p.id),
                })
                .collect()
        }
    }

    /// The share `owner` holds in `horse` on `as_of`, if any
    pub fn share_on(&self, horse: HorseId, owner: OwnerId, as_of: NaiveDate) -> Option<ActiveShare> {
        self.active_shares(horse, as_of)
            .into_iter()
            .find(|s| s.owner_id == owner)
    }

    /// Each interval of `owner`'s share in `horse` intersecting `period`,
    /// clipped to the intersection and ordered by start date
    pub fn share_for_period(
        &self,
        horse: HorseId,
        owner: OwnerId,
        period: &DateRange,
    ) -> Vec<ShareSegment> {
        let mut segments: Vec<ShareSegment> = if self.is_recorded(horse) {
            self.records_for(horse)
                .filter(|r| r.owner_id == owner)
                .filter_map(|r| {
                    period
                        .clip(r.effective_from, r.effective_to)
                        .map(|clipped| ShareSegment {
                            basis: ShareBasis::Recorded(r.id),
                            percentage: r.share,
                            period: clipped,
                        })
                })
                .collect()
        } else {
            self.placements_for(horse)
                .filter(|p| p.owner_id == owner)
                .filter_map(|p| {
                    p.clip_to(period).map(|clipped| ShareSegment {
                        basis: ShareBasis::PlacementOwner(p.id),
                        percentage: Percentage::whole(),
                        period: clipped,
                    })
                })
                .collect()
        };
        segments.sort_by_key(|s| s.period.start);
        segments
    }

    /// Horses in which `owner` holds a share at some point of `period`
    pub fn horses_of(&self, owner: OwnerId, period: &DateRange) -> Vec<HorseId> {
        let mut horses: Vec<HorseId> = Vec::new();
        let candidates = self
            .records
            .iter()
            .map(|r| r.horse_id)
            .chain(self.placements.iter().map(|p| p.horse_id));
        for horse in candidates {
            if !horses.contains(&horse) && !self.share_for_period(horse, owner, period).is_empty() {
                horses.push(horse);
            }
        }
        horses
    }
}

/// Checks a new or edited ownership record against the horse's register
///
/// Rejects an overlap with another record of the same owner, and any day
/// in the candidate's span on which the horse's shares would total more
/// than 100%. `existing` may contain the candidate itself (matched by id).
pub fn validate_ownership(
    existing: &[OwnershipRecord],
    candidate: &OwnershipRecord,
) -> Result<(), YardError> {
    if let Some(end) = candidate.effective_to {
        if end < candidate.effective_from {
            return Err(YardError::invalid("Ownership end date cannot be before its start date"));
        }
    }

    let others: Vec<&OwnershipRecord> = existing
        .iter()
        .filter(|r| r.horse_id == candidate.horse_id && r.id != candidate.id)
        .collect();

    let conflict = |kind| YardError::OwnershipConflict {
        horse: candidate.horse_id,
        owner: candidate.owner_id,
        kind,
    };

    if let Some(record) = others
        .iter()
        .find(|r| r.owner_id == candidate.owner_id && r.overlaps(candidate))
    {
        return Err(conflict(OwnershipConflictKind::OverlappingRecord {
            conflicting_record: record.id,
        }));
    }

    // The horse's total only rises where some record starts, so checking
    // the candidate's start and every other start inside its span covers
    // every day.
    let mut checkpoints: Vec<NaiveDate> = others
        .iter()
        .map(|r| r.effective_from)
        .filter(|d| candidate.is_active_on(*d))
        .collect();
    checkpoints.push(candidate.effective_from);
    checkpoints.sort();
    checkpoints.dedup();

    for day in checkpoints {
        let total: Decimal = others
            .iter()
            .filter(|r| r.is_active_on(day))
            .map(|r| r.share.value())
            .sum::<Decimal>()
            + candidate.share.value();
        if total > Percentage::MAX {
            debug!(horse = %candidate.horse_id, owner = %candidate.owner_id, %total, %day, "Ownership total over 100%");
            return Err(conflict(OwnershipConflictKind::TotalExceeded {
                conflicting_total: total,
                on: day,
            }));
        }
    }

    Ok(())
}
