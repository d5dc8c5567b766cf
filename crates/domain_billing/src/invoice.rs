//! Invoices, line items and the invoice lifecycle
//!
//! ```text
//! draft ──▶ sent ──▶ paid
//!             │        ▲
//!             ▼        │
//!          overdue ────┘
//!
//! draft | sent | overdue ──▶ cancelled
//! ```
//!
//! Line items are immutable snapshots: `line_total` is computed once, when
//! the invoice is drafted, and never recomputed from the source placement
//! or charge.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    Currency, DateRange, HorseId, InvoiceId, LineItemId, Money, OwnerId, OwnershipId, Percentage,
};

use crate::charge_line::{ChargeLine, LineSource, LineType};
use crate::error::BillingError;
use crate::grouping::{canonical_order, group_by_horse, GroupableLine, HorseGroup};

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Created, not yet delivered
    Draft,
    /// Delivered to the owner
    Sent,
    /// Settled
    Paid,
    /// Sent and past its due date
    Overdue,
    /// Voided; excluded from overlap checks
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Paid and cancelled invoices never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(BillingError::validation(format!("Unknown invoice status: {other}"))),
        }
    }
}

/// A line on an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub id: LineItemId,
    pub invoice_id: InvoiceId,
    pub horse_id: Option<HorseId>,
    pub source: LineSource,
    pub ownership_id: Option<OwnershipId>,
    pub line_type: LineType,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub line_total: Money,
    /// The owner's share when the line was created
    pub ownership_percentage: Option<Percentage>,
    pub service_date: NaiveDate,
    pub position: i32,
}

impl InvoiceLineItem {
    fn snapshot(invoice_id: InvoiceId, position: i32, line: ChargeLine) -> Self {
        Self {
            id: LineItemId::new(),
            invoice_id,
            horse_id: Some(line.horse_id),
            source: line.source,
            ownership_id: line.ownership_id,
            line_type: line.line_type,
            line_total: line.unit_price.multiply(line.quantity),
            description: line.description,
            quantity: line.quantity,
            unit_price: line.unit_price,
            ownership_percentage: line.ownership_percentage,
            service_date: line.service_date,
            position,
        }
    }
}

impl GroupableLine for InvoiceLineItem {
    fn horse(&self) -> Option<HorseId> {
        self.horse_id
    }

    fn is_livery(&self) -> bool {
        self.line_type == LineType::Livery
    }

    fn sort_date(&self) -> NaiveDate {
        self.service_date
    }

    fn total(&self) -> Money {
        self.line_total
    }
}

/// Header fields of an invoice about to be drafted
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub owner_id: OwnerId,
    pub invoice_number: String,
    pub period: DateRange,
    pub currency: Currency,
    pub payment_terms_days: i32,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

/// An owner's bill for a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub owner_id: OwnerId,
    pub invoice_number: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub currency: Currency,
    pub subtotal: Money,
    pub total: Money,
    pub status: InvoiceStatus,
    pub payment_terms_days: i32,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// In canonical order; `position` matches the index
    pub line_items: Vec<InvoiceLineItem>,
}

impl Invoice {
    /// Drafts an invoice from charge lines
    ///
    /// Lines are put in canonical order and frozen; subtotal and total are
    /// the sum of the line totals.
    pub fn draft(header: NewInvoice, lines: Vec<ChargeLine>) -> Result<Self, BillingError> {
        let id = InvoiceId::new();
        let line_items: Vec<InvoiceLineItem> = canonical_order(lines)
            .into_iter()
            .enumerate()
            .map(|(i, line)| {
                let position = i32::try_from(i)
                    .map_err(|_| BillingError::validation("Too many invoice lines"))?;
                Ok(InvoiceLineItem::snapshot(id, position, line))
            })
            .collect::<Result<_, BillingError>>()?;

        let totals: Vec<Money> = line_items.iter().map(|l| l.line_total).collect();
        let subtotal = Money::sum(header.currency, &totals)?;

        Ok(Self {
            id,
            owner_id: header.owner_id,
            invoice_number: header.invoice_number,
            period_start: header.period.start,
            period_end: header.period.end,
            currency: header.currency,
            subtotal,
            total: subtotal,
            status: InvoiceStatus::Draft,
            payment_terms_days: header.payment_terms_days,
            due_date: header.due_date,
            notes: header.notes,
            created_at: Utc::now(),
            sent_at: None,
            paid_at: None,
            cancelled_at: None,
            line_items,
        })
    }

    pub fn period(&self) -> DateRange {
        DateRange {
            start: self.period_start,
            end: self.period_end,
        }
    }

    /// True when this invoice blocks billing `period` again
    pub fn blocks(&self, period: &DateRange) -> bool {
        self.status != InvoiceStatus::Cancelled && self.period().overlaps(period)
    }

    /// Marks the invoice as delivered; a sent invoice may be resent
    pub fn mark_sent(&mut self) -> Result<(), BillingError> {
        self.require(&[InvoiceStatus::Draft, InvoiceStatus::Sent], "send")?;
        self.status = InvoiceStatus::Sent;
        self.sent_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_paid(&mut self) -> Result<(), BillingError> {
        self.require(&[InvoiceStatus::Sent, InvoiceStatus::Overdue], "mark paid")?;
        self.status = InvoiceStatus::Paid;
        self.paid_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_overdue(&mut self) -> Result<(), BillingError> {
        self.require(&[InvoiceStatus::Sent], "mark overdue")?;
        self.status = InvoiceStatus::Overdue;
        Ok(())
    }

    /// Voids the invoice so its period can be billed again
    pub fn cancel(&mut self) -> Result<(), BillingError> {
        if self.status.is_terminal() {
            return Err(self.invalid_transition("cancel"));
        }
        self.status = InvoiceStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
        Ok(())
    }

    /// Unpaid, not cancelled, and `today` is past the due date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_terminal() && today > self.due_date
    }

    /// Line items grouped by horse, horse-less lines last
    pub fn horse_groups(&self) -> Result<Vec<HorseGroup<'_, InvoiceLineItem>>, BillingError> {
        Ok(group_by_horse(&self.line_items, self.currency)?)
    }

    /// Extra charges this invoice billed
    pub fn extra_charge_ids(&self) -> impl Iterator<Item = core_kernel::ExtraChargeId> + '_ {
        self.line_items.iter().filter_map(|l| l.source.extra_charge_id())
    }

    fn require(&self, allowed: &[InvoiceStatus], action: &'static str) -> Result<(), BillingError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(self.invalid_transition(action))
        }
    }

    fn invalid_transition(&self, action: &'static str) -> BillingError {
        BillingError::InvalidTransition {
            invoice_number: self.invoice_number.clone(),
            from: self.status,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{ExtraChargeId, PlacementId};
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn gbp(amount: Decimal) -> Money {
        Money::new(amount, Currency::GBP)
    }

    fn line(horse: HorseId, line_type: LineType, date: NaiveDate, amount: Decimal) -> ChargeLine {
        let source = if line_type == LineType::Livery {
            LineSource::Placement(PlacementId::new())
        } else {
            LineSource::ExtraCharge(ExtraChargeId::new())
        };
        ChargeLine {
            horse_id: horse,
            source,
            ownership_id: None,
            line_type,
            description: format!("{line_type} on {date}"),
            quantity: Decimal::ONE,
            unit_price: gbp(amount),
            amount: gbp(amount),
            full_amount: gbp(amount),
            ownership_percentage: None,
            service_date: date,
        }
    }

    fn header() -> NewInvoice {
        NewInvoice {
            owner_id: OwnerId::new(),
            invoice_number: "INV00001".to_string(),
            period: DateRange::month(2026, 1).unwrap(),
            currency: Currency::GBP,
            payment_terms_days: 30,
            due_date: d(2026, 3, 2),
            notes: None,
        }
    }

    #[test]
    fn test_draft_orders_and_totals() {
        let (a, b) = (HorseId::new(), HorseId::new());
        let lines = vec![
            line(a, LineType::Farrier, d(2026, 1, 20), dec!(45.00)),
            line(b, LineType::Livery, d(2026, 1, 1), dec!(155.00)),
            line(a, LineType::Livery, d(2026, 1, 1), dec!(310.00)),
            line(a, LineType::Vet, d(2026, 1, 5), dec!(80.00)),
        ];
        let invoice = Invoice::draft(header(), lines).unwrap();

        assert_eq!(invoice.total.amount(), dec!(590.00));
        assert_eq!(invoice.status, InvoiceStatus::Draft);

        let types: Vec<LineType> = invoice.line_items.iter().map(|l| l.line_type).collect();
        assert_eq!(types, vec![LineType::Livery, LineType::Vet, LineType::Farrier, LineType::Livery]);
        assert!(invoice.line_items.iter().enumerate().all(|(i, l)| l.position == i as i32));

        let groups = invoice.horse_groups().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].horse_id, Some(a));
        assert_eq!(groups[0].subtotal.amount(), dec!(435.00));
        assert_eq!(groups[1].subtotal.amount(), dec!(155.00));
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut invoice = Invoice::draft(header(), vec![]).unwrap();
        invoice.mark_sent().unwrap();
        assert!(invoice.sent_at.is_some());
        invoice.mark_overdue().unwrap();
        invoice.mark_paid().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(invoice.paid_at.is_some());
    }

    #[test]
    fn test_draft_cannot_be_paid() {
        let mut invoice = Invoice::draft(header(), vec![]).unwrap();
        let err = invoice.mark_paid().unwrap_err();
        assert!(matches!(err, BillingError::InvalidTransition { from: InvoiceStatus::Draft, .. }));
    }

    #[test]
    fn test_paid_cannot_be_cancelled() {
        let mut invoice = Invoice::draft(header(), vec![]).unwrap();
        invoice.mark_sent().unwrap();
        invoice.mark_paid().unwrap();
        assert!(invoice.cancel().is_err());
    }

    #[test]
    fn test_cancelled_invoice_does_not_block() {
        let mut invoice = Invoice::draft(header(), vec![]).unwrap();
        let january = DateRange::month(2026, 1).unwrap();
        assert!(invoice.blocks(&january));
        invoice.cancel().unwrap();
        assert!(!invoice.blocks(&january));
        assert!(invoice.cancelled_at.is_some());
    }

    #[test]
    fn test_is_overdue() {
        let mut invoice = Invoice::draft(header(), vec![]).unwrap();
        assert!(!invoice.is_overdue(d(2026, 3, 2)));
        assert!(invoice.is_overdue(d(2026, 3, 3)));
        invoice.cancel().unwrap();
        assert!(!invoice.is_overdue(d(2026, 3, 3)));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), status);
        }
    }
}
