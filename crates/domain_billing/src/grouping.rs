//! Canonical line order
//!
//! Lines are grouped by horse in order of first appearance, with horse-less
//! lines last. Within a group livery comes first, then extras, each by date.
//! PDF and CSV renderers walk [`HorseGroup`]s in this order.

use chrono::NaiveDate;

use core_kernel::{Currency, HorseId, Money, MoneyError};

use crate::charge_line::ChargeLine;

/// A line that can be placed in the canonical order
pub trait GroupableLine {
    fn horse(&self) -> Option<HorseId>;
    fn is_livery(&self) -> bool;
    fn sort_date(&self) -> NaiveDate;
    fn total(&self) -> Money;
}

impl GroupableLine for ChargeLine {
    fn horse(&self) -> Option<HorseId> {
        Some(self.horse_id)
    }

    fn is_livery(&self) -> bool {
        ChargeLine::is_livery(self)
    }

    fn sort_date(&self) -> NaiveDate {
        self.service_date
    }

    fn total(&self) -> Money {
        self.amount
    }
}

/// The lines of one horse (or the horse-less "Other Charges" group)
#[derive(Debug)]
pub struct HorseGroup<'a, L> {
    pub horse_id: Option<HorseId>,
    pub lines: Vec<&'a L>,
    pub subtotal: Money,
}

impl<L> HorseGroup<'_, L> {
    /// Group heading, given the horse's name when there is one
    pub fn heading<'n>(&self, horse_name: Option<&'n str>) -> &'n str {
        match (self.horse_id, horse_name) {
            (Some(_), Some(name)) => name,
            _ => "Other Charges",
        }
    }
}

fn horse_order(horses: impl IntoIterator<Item = Option<HorseId>>) -> Vec<Option<HorseId>> {
    let mut order: Vec<Option<HorseId>> = Vec::new();
    for horse in horses {
        if horse.is_some() && !order.contains(&horse) {
            order.push(horse);
        }
    }
    order.push(None);
    order
}

fn within_group_key<L: GroupableLine>(line: &L) -> (bool, NaiveDate) {
    (!line.is_livery(), line.sort_date())
}

/// Sorts lines into the canonical order; stable for equal keys
pub fn canonical_order<L: GroupableLine>(mut lines: Vec<L>) -> Vec<L> {
    let order = horse_order(lines.iter().map(|l| l.horse()));
    lines.sort_by_key(|line| {
        let rank = order
            .iter()
            .position(|h| *h == line.horse())
            .unwrap_or(order.len());
        (rank, within_group_key(line))
    });
    lines
}

/// Groups lines by horse in the canonical order, with subtotals
pub fn group_by_horse<'a, L: GroupableLine>(
    lines: &'a [L],
    currency: Currency,
) -> Result<Vec<HorseGroup<'a, L>>, MoneyError> {
    let mut groups = Vec::new();
    for horse in horse_order(lines.iter().map(|l| l.horse())) {
        let mut members: Vec<&L> = lines.iter().filter(|l| l.horse() == horse).collect();
        if members.is_empty() {
            continue;
        }
        members.sort_by_key(|l| within_group_key(*l));
        let totals: Vec<Money> = members.iter().map(|l| l.total()).collect();
        groups.push(HorseGroup {
            horse_id: horse,
            subtotal: Money::sum(currency, &totals)?,
            lines: members,
        });
    }
    Ok(groups)
}
