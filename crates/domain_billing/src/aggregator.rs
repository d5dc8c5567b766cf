//! Charge aggregation
//!
//! Turns an owner's [`ChargeSources`] into per-owner charge lines:
//!
//! - **Livery**: for every share segment of the owner intersecting the
//!   period, every placement of that horse is charged over the segment's
//!   days at the full rate, then reduced to the share.
//! - **Extras**: direct charges bill the owner in full; split charges bill
//!   the owner's share as of the charge date, unless the owner already has
//!   a line for that charge.
//!
//! Per-owner amounts are rounded half-up to the penny exactly once, when the
//! share is applied. Nothing here writes.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use core_kernel::temporal::{format_day_month, format_day_month_year};
use core_kernel::{Currency, DateRange, Money, OwnerId, OwnershipId, Percentage};
use domain_yard::{placement_charge_for, ExtraCharge, Placement, ShareBasis, ShareSegment};

use crate::charge_line::{ChargeLine, LineSource, LineType};
use crate::error::BillingError;
use crate::grouping::{canonical_order, group_by_horse, HorseGroup};
use crate::sources::ChargeSources;

/// Computes charge lines for the owner of a [`ChargeSources`]
#[derive(Debug, Clone, Copy)]
pub struct ChargeAggregator<'a> {
    sources: &'a ChargeSources,
}

impl<'a> ChargeAggregator<'a> {
    pub fn new(sources: &'a ChargeSources) -> Self {
        Self { sources }
    }

    pub fn owner_id(&self) -> OwnerId {
        self.sources.owner_id
    }

    /// Livery lines for every share segment x placement intersection
    pub fn livery_charges_for(&self, period: &DateRange) -> Vec<ChargeLine> {
        let owner = self.sources.owner_id;
        let register = self.sources.register();
        let mut lines = Vec::new();

        for horse in register.horses_of(owner, period) {
            for segment in register.share_for_period(horse, owner, period) {
                let placements = self
                    .sources
                    .placements
                    .iter()
                    .filter(|p| p.horse_id == horse)
                    .filter(|p| match segment.basis {
                        ShareBasis::PlacementOwner(id) => p.id == id,
                        ShareBasis::Recorded(_) => true,
                    });
                for placement in placements {
                    if let Some(line) = livery_line(placement, &segment) {
                        lines.push(line);
                    }
                }
            }
        }

        lines.sort_by_key(|l| l.service_date);
        debug!(owner = %owner, period = %period, lines = lines.len(), "Computed livery charges");
        lines
    }

    /// Extra charge lines for unbilled charges dated on or before `period_end`
    pub fn unbilled_charges_for(&self, period_end: NaiveDate) -> Vec<ChargeLine> {
        let owner = self.sources.owner_id;
        let register = self.sources.register();
        let mut lines = Vec::new();

        for charge in self
            .sources
            .extra_charges
            .iter()
            .filter(|c| c.is_billable_by(period_end))
        {
            if !charge.split_by_ownership {
                if charge.owner_id == owner {
                    lines.push(extra_line(charge, None, None));
                }
                continue;
            }

            if self.sources.already_billed(charge.id, owner) {
                continue;
            }
            if let Some(share) = register.share_on(charge.horse_id, owner, charge.date) {
                lines.push(extra_line(
                    charge,
                    Some(share.percentage),
                    share.basis.ownership_id(),
                ));
            }
        }

        lines.sort_by_key(|l| l.service_date);
        debug!(owner = %owner, period_end = %period_end, lines = lines.len(), "Computed unbilled extra charges");
        lines
    }

    /// Every line an invoice for `period` would carry, without writing anything
    pub fn preview(&self, period: &DateRange) -> Result<InvoicePreview, BillingError> {
        let mut lines = self.livery_charges_for(period);
        lines.extend(self.unbilled_charges_for(period.end));
        InvoicePreview::new(self.sources.owner_id, *period, self.sources.currency, lines)
    }
}

fn livery_line(placement: &Placement, segment: &ShareSegment) -> Option<ChargeLine> {
    let charge = placement_charge_for(placement, &segment.period);
    let billed = charge.period?;
    let rate = placement.daily_rate();
    let amount = segment.percentage.share_of(&charge.amount);

    let (quantity, unit_price) = if amount == charge.amount {
        (Decimal::from(charge.days), rate)
    } else {
        (Decimal::ONE, amount)
    };

    let mut description = format!(
        "{} {} per day - {} days ({} to {})",
        placement.rate_type.name,
        rate.compact(),
        charge.days,
        format_day_month(billed.start),
        format_day_month_year(billed.end),
    );
    if !segment.percentage.is_whole() {
        description.push_str(&format!(" ({} share)", segment.percentage));
    }

    Some(ChargeLine {
        horse_id: placement.horse_id,
        source: LineSource::Placement(placement.id),
        ownership_id: segment.basis.ownership_id(),
        line_type: LineType::Livery,
        description,
        quantity,
        unit_price,
        amount,
        full_amount: charge.amount,
        ownership_percentage: segment.basis.ownership_id().map(|_| segment.percentage),
        service_date: billed.start,
    })
}

fn extra_line(
    charge: &ExtraCharge,
    share: Option<Percentage>,
    ownership_id: Option<OwnershipId>,
) -> ChargeLine {
    let amount = match share {
        Some(pct) => pct.share_of(&charge.amount),
        None => charge.amount,
    };

    let mut description = format!("{} - {}", charge.charge_type.display_name(), charge.description);
    if let Some(pct) = share.filter(|p| !p.is_whole()) {
        description.push_str(&format!(" ({} share of {})", pct, charge.amount));
    }

    ChargeLine {
        horse_id: charge.horse_id,
        source: LineSource::ExtraCharge(charge.id),
        ownership_id,
        line_type: LineType::from(charge.charge_type),
        description,
        quantity: Decimal::ONE,
        unit_price: amount,
        amount,
        full_amount: charge.amount,
        ownership_percentage: share,
        service_date: charge.date,
    }
}

/// What an invoice would contain, computed without side effects
#[derive(Debug, Clone, Serialize)]
pub struct InvoicePreview {
    pub owner_id: OwnerId,
    pub period: DateRange,
    pub currency: Currency,
    /// All lines, in canonical order
    pub lines: Vec<ChargeLine>,
    pub subtotal: Money,
    pub total: Money,
}

impl InvoicePreview {
    pub fn new(
        owner_id: OwnerId,
        period: DateRange,
        currency: Currency,
        lines: Vec<ChargeLine>,
    ) -> Result<Self, BillingError> {
        let lines = canonical_order(lines);
        let amounts: Vec<Money> = lines.iter().map(|l| l.amount).collect();
        let subtotal = Money::sum(currency, &amounts)?;
        Ok(Self {
            owner_id,
            period,
            currency,
            lines,
            subtotal,
            total: subtotal,
        })
    }

    pub fn livery_lines(&self) -> impl Iterator<Item = &ChargeLine> {
        self.lines.iter().filter(|l| l.is_livery())
    }

    pub fn extra_lines(&self) -> impl Iterator<Item = &ChargeLine> {
        self.lines.iter().filter(|l| !l.is_livery())
    }

    /// True when creating the invoice would bill something
    pub fn is_billable(&self) -> bool {
        self.total.is_positive()
    }

    pub fn horse_groups(&self) -> Result<Vec<HorseGroup<'_, ChargeLine>>, BillingError> {
        Ok(group_by_horse(&self.lines, self.currency)?)
    }
}
