//! The slice of the yard register one owner's invoice is built from

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use core_kernel::{Currency, DateRange, ExtraChargeId, HorseId, OwnerId};
use domain_yard::{ExtraCharge, OwnershipRecord, OwnershipRegister, Placement};

/// Everything needed to bill one owner up to a period end
///
/// `ownerships` and `placements` hold every record of every horse the owner
/// is involved with, not only the owner's own, so that co-owners can be
/// resolved for split-charge settlement.
#[derive(Debug, Clone)]
pub struct ChargeSources {
    pub owner_id: OwnerId,
    pub currency: Currency,
    pub ownerships: Vec<OwnershipRecord>,
    pub placements: Vec<Placement>,
    /// Unbilled charges dated on or before the period end: the owner's direct
    /// charges and every split charge on the owner's horses
    pub extra_charges: Vec<ExtraCharge>,
    /// For split charges, owners already holding a line item for the charge
    /// on a non-cancelled invoice
    pub billed_owners: HashMap<ExtraChargeId, HashSet<OwnerId>>,
}

impl ChargeSources {
    pub fn empty(owner_id: OwnerId, currency: Currency) -> Self {
        Self {
            owner_id,
            currency,
            ownerships: Vec::new(),
            placements: Vec::new(),
            extra_charges: Vec::new(),
            billed_owners: HashMap::new(),
        }
    }

    pub fn register(&self) -> OwnershipRegister<'_> {
        OwnershipRegister::new(&self.ownerships, &self.placements)
    }

    pub fn already_billed(&self, charge: ExtraChargeId, owner: OwnerId) -> bool {
        self.billed_owners
            .get(&charge)
            .map_or(false, |owners| owners.contains(&owner))
    }
}

/// Horses `owner` is involved with: shares, legacy placements or direct charges
pub fn horses_involving(
    owner: OwnerId,
    ownerships: &[OwnershipRecord],
    placements: &[Placement],
    charges: &[ExtraCharge],
) -> HashSet<HorseId> {
    ownerships
        .iter()
        .filter(|r| r.owner_id == owner)
        .map(|r| r.horse_id)
        .chain(placements.iter().filter(|p| p.owner_id == owner).map(|p| p.horse_id))
        .chain(charges.iter().filter(|c| c.owner_id == owner).map(|c| c.horse_id))
        .collect()
}

/// Owners a monthly run should consider for `period`
///
/// Owners sharing a horse while it is placed during the period, owners of
/// unbilled direct charges dated by the period end, and owners holding a
/// share on the date of an unbilled split charge dated by the period end.
/// Sorted for a deterministic run order.
pub fn candidate_owners(
    ownerships: &[OwnershipRecord],
    placements: &[Placement],
    charges: &[ExtraCharge],
    period: &DateRange,
) -> Vec<OwnerId> {
    let register = OwnershipRegister::new(ownerships, placements);
    let mut owners: HashSet<OwnerId> = HashSet::new();

    for placement in placements {
        let Some(placed) = placement.clip_to(period) else {
            continue;
        };
        if register.is_recorded(placement.horse_id) {
            owners.extend(
                ownerships
                    .iter()
                    .filter(|r| r.horse_id == placement.horse_id)
                    .filter(|r| placed.clip(r.effective_from, r.effective_to).is_some())
                    .map(|r| r.owner_id),
            );
        } else {
            owners.insert(placement.owner_id);
        }
    }

    for charge in charges.iter().filter(|c| c.is_billable_by(period.end)) {
        if charge.split_by_ownership {
            owners.extend(
                register
                    .active_shares(charge.horse_id, charge.date)
                    .into_iter()
                    .map(|s| s.owner_id),
            );
        } else {
            owners.insert(charge.owner_id);
        }
    }

    let mut sorted: Vec<OwnerId> = owners.into_iter().collect();
    sorted.sort();
    sorted
}

/// Filters a store's charges down to what [`ChargeSources`] expects
pub fn unbilled_charges_for_owner<'a>(
    owner: OwnerId,
    horses: &'a HashSet<HorseId>,
    charges: &'a [ExtraCharge],
    period_end: NaiveDate,
) -> impl Iterator<Item = &'a ExtraCharge> + 'a {
    charges.iter().filter(move |c| {
        c.is_billable_by(period_end)
            && if c.split_by_ownership {
                horses.contains(&c.horse_id)
            } else {
                c.owner_id == owner
            }
    })
}
