//! Invoice generation service
//!
//! [`InvoiceGenerator`] creates invoices idempotently: at most one
//! non-cancelled invoice per owner covers any day, every invoice number is
//! taken from the settings counter inside the creating transaction, and a
//! split charge is only marked invoiced once every co-owner holding a share
//! on the charge date has been billed for it.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_kernel::{DateRange, ExtraChargeId, InvoiceId, OwnerId, PortError};

use crate::aggregator::{ChargeAggregator, InvoicePreview};
use crate::error::BillingError;
use crate::invoice::{Invoice, NewInvoice};
use crate::ports::{BillingStore, BillingTransaction};
use crate::sources::ChargeSources;

/// A request to invoice one owner for one period
#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    pub owner_id: OwnerId,
    pub period: DateRange,
    pub notes: Option<String>,
    /// Overrides `period end + payment terms`
    pub due_date: Option<NaiveDate>,
}

impl InvoiceRequest {
    pub fn new(owner_id: OwnerId, period: DateRange) -> Self {
        Self {
            owner_id,
            period,
            notes: None,
            due_date: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// An owner the monthly run could not invoice
#[derive(Debug, Clone, Serialize)]
pub struct FailedOwner {
    pub owner_id: OwnerId,
    pub reason: String,
}

/// Outcome of a monthly run
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRun {
    pub period: DateRange,
    pub created: Vec<Invoice>,
    /// Owners that already had an overlapping invoice
    pub skipped: Vec<OwnerId>,
    pub failed: Vec<FailedOwner>,
}

/// Creates and transitions invoices against a [`BillingStore`]
#[derive(Clone)]
pub struct InvoiceGenerator {
    store: Arc<dyn BillingStore>,
}

impl InvoiceGenerator {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// What an invoice for `owner` and `period` would contain
    #[instrument(skip(self), fields(owner = %owner, period = %period))]
    pub async fn preview(&self, owner: OwnerId, period: &DateRange) -> Result<InvoicePreview, BillingError> {
        let sources = self.store.load_owner_sources(owner, period.end).await?;
        ChargeAggregator::new(&sources).preview(period)
    }

    /// Creates a draft invoice with every outstanding charge line
    ///
    /// Fails with `DuplicateInvoice` if a non-cancelled invoice of the owner
    /// overlaps the period. Everything happens in one transaction.
    #[instrument(skip(self, request), fields(owner = %request.owner_id, period = %request.period))]
    pub async fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice, BillingError> {
        let mut tx = self.store.begin().await?;
        match self.create_in(tx.as_mut(), &request).await {
            Ok(invoice) => {
                tx.commit().await?;
                info!(
                    invoice_number = %invoice.invoice_number,
                    total = %invoice.total,
                    lines = invoice.line_items.len(),
                    "Invoice created"
                );
                Ok(invoice)
            }
            Err(BillingError::Port(e)) if e.is_conflict() => {
                drop(tx);
                Err(self.duplicate_after_conflict(e, &request).await)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_in(
        &self,
        tx: &mut dyn BillingTransaction,
        request: &InvoiceRequest,
    ) -> Result<Invoice, BillingError> {
        let owner = request.owner_id;
        let period = request.period;

        tx.lock_owner(owner).await?;
        if let Some(existing) = tx.find_overlapping_invoice(owner, &period).await? {
            return Err(duplicate(owner, &existing));
        }

        let sources = tx.load_owner_sources(owner, period.end).await?;
        let allocated = tx.allocate_invoice_number().await?;
        let due_date = match request.due_date {
            Some(date) => date,
            None => allocated.due_date_for(period.end)?,
        };

        let aggregator = ChargeAggregator::new(&sources);
        let mut lines = aggregator.livery_charges_for(&period);
        lines.extend(aggregator.unbilled_charges_for(period.end));

        let invoice = Invoice::draft(
            NewInvoice {
                owner_id: owner,
                invoice_number: allocated.invoice_number,
                period,
                currency: allocated.currency,
                payment_terms_days: allocated.payment_terms_days,
                due_date,
                notes: request.notes.clone(),
            },
            lines,
        )?;
        tx.insert_invoice(&invoice).await?;

        for charge_id in settled_charges(&sources, &invoice) {
            tx.mark_charge_invoiced(charge_id, invoice.id).await?;
            debug!(charge = %charge_id, invoice = %invoice.invoice_number, "Charge settled");
        }

        Ok(invoice)
    }

    /// Storage rejected the insert as overlapping; report the invoice that won
    async fn duplicate_after_conflict(&self, error: PortError, request: &InvoiceRequest) -> BillingError {
        match self
            .store
            .find_overlapping_invoice(request.owner_id, &request.period)
            .await
        {
            Ok(Some(existing)) => duplicate(request.owner_id, &existing),
            _ => BillingError::Port(error),
        }
    }

    /// Invoices every candidate owner for a calendar month
    ///
    /// Owners with an overlapping invoice are skipped, owners with nothing to
    /// bill get no invoice and consume no number, and a failure for one
    /// owner is reported without stopping the run.
    #[instrument(skip(self))]
    pub async fn generate_monthly_invoices(&self, year: i32, month: u32) -> Result<MonthlyRun, BillingError> {
        let period = DateRange::month(year, month)?;
        let candidates = self.store.billing_candidates(&period).await?;
        info!(period = %period, candidates = candidates.len(), "Starting monthly invoice run");

        let mut run = MonthlyRun {
            period,
            created: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };

        for owner in candidates {
            match self.invoice_candidate(owner, &period).await {
                Ok(Some(invoice)) => run.created.push(invoice),
                Ok(None) => {}
                Err(BillingError::DuplicateInvoice { existing_number, .. }) => {
                    warn!(owner = %owner, existing = %existing_number, "Skipping owner with overlapping invoice");
                    run.skipped.push(owner);
                }
                Err(e) => {
                    warn!(owner = %owner, error = %e, "Failed to invoice owner");
                    run.failed.push(FailedOwner {
                        owner_id: owner,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            period = %period,
            created = run.created.len(),
            skipped = run.skipped.len(),
            failed = run.failed.len(),
            "Monthly invoice run finished"
        );
        Ok(run)
    }

    async fn invoice_candidate(&self, owner: OwnerId, period: &DateRange) -> Result<Option<Invoice>, BillingError> {
        if let Some(existing) = self.store.find_overlapping_invoice(owner, period).await? {
            return Err(duplicate(owner, &existing));
        }
        let preview = self.preview(owner, period).await?;
        if !preview.is_billable() {
            debug!(owner = %owner, total = %preview.total, "Nothing to bill");
            return Ok(None);
        }
        self.create_invoice(InvoiceRequest::new(owner, *period)).await.map(Some)
    }

    async fn load(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        self.store.get_invoice(id).await.map_err(|e| {
            if e.is_not_found() {
                BillingError::InvoiceNotFound(id)
            } else {
                BillingError::Port(e)
            }
        })
    }

    async fn transition<F>(&self, id: InvoiceId, apply: F) -> Result<Invoice, BillingError>
    where
        F: FnOnce(&mut Invoice) -> Result<(), BillingError> + Send,
    {
        let mut invoice = self.load(id).await?;
        let from = invoice.status;
        apply(&mut invoice)?;
        self.store
            .save_invoice_status(&invoice, from)
            .await
            .map_err(|e| status_error(e, &invoice))?;
        info!(invoice = %invoice.invoice_number, from = %from, to = %invoice.status, "Invoice status changed");
        Ok(invoice)
    }

    /// Called by the notifier after successful delivery
    #[instrument(skip(self))]
    pub async fn mark_sent(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        self.transition(id, Invoice::mark_sent).await
    }

    #[instrument(skip(self))]
    pub async fn mark_paid(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        self.transition(id, Invoice::mark_paid).await
    }

    /// Cancels an unpaid invoice; its period may then be billed again
    ///
    /// Every extra charge the invoice carried becomes unbilled again, in the
    /// same transaction as the status change. A split charge is re-settled
    /// once every co-owner is billed for it on a live invoice.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        let mut invoice = self.load(id).await?;
        let from = invoice.status;
        invoice.cancel()?;
        let released: Vec<ExtraChargeId> = invoice.extra_charge_ids().collect();

        let mut tx = self.store.begin().await?;
        tx.save_invoice_status(&invoice, from)
            .await
            .map_err(|e| status_error(e, &invoice))?;
        tx.release_charges(&released).await?;
        tx.commit().await?;

        info!(
            invoice = %invoice.invoice_number,
            from = %from,
            released = released.len(),
            "Invoice cancelled"
        );
        Ok(invoice)
    }

    /// Flips every sent invoice past its due date to overdue
    ///
    /// Invoices paid or cancelled since they were listed are left alone.
    #[instrument(skip(self))]
    pub async fn mark_overdue_invoices(&self, today: NaiveDate) -> Result<Vec<Invoice>, BillingError> {
        let mut flipped = Vec::new();
        for mut invoice in self.store.invoices_past_due(today).await? {
            if !invoice.is_overdue(today) {
                continue;
            }
            let from = invoice.status;
            invoice.mark_overdue()?;
            match self.store.save_invoice_status(&invoice, from).await {
                Ok(()) => flipped.push(invoice),
                Err(e) if e.is_conflict() => {
                    debug!(invoice = %invoice.invoice_number, "Status changed before the sweep reached it");
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(today = %today, count = flipped.len(), "Marked invoices overdue");
        Ok(flipped)
    }
}

fn duplicate(owner: OwnerId, existing: &Invoice) -> BillingError {
    BillingError::DuplicateInvoice {
        owner,
        existing_number: existing.invoice_number.clone(),
        existing_start: existing.period_start,
        existing_end: existing.period_end,
    }
}

fn status_error(error: PortError, invoice: &Invoice) -> BillingError {
    if error.is_conflict() {
        BillingError::StatusChanged(invoice.invoice_number.clone())
    } else {
        BillingError::Port(error)
    }
}

/// Charges the invoice completes settlement of
///
/// A direct charge settles on its first invoice. A split charge settles once
/// every owner holding a share on the charge date is either already billed
/// for it or billed by this invoice.
fn settled_charges(sources: &ChargeSources, invoice: &Invoice) -> Vec<ExtraChargeId> {
    let register = sources.register();
    let billed_here: HashSet<_> = invoice.extra_charge_ids().collect();

    sources
        .extra_charges
        .iter()
        .filter(|c| billed_here.contains(&c.id))
        .filter(|charge| {
            if !charge.split_by_ownership {
                return true;
            }
            let mut billed: HashSet<OwnerId> = sources
                .billed_owners
                .get(&charge.id)
                .cloned()
                .unwrap_or_default();
            billed.insert(invoice.owner_id);
            register
                .active_shares(charge.horse_id, charge.date)
                .iter()
                .all(|share| billed.contains(&share.owner_id))
        })
        .map(|c| c.id)
        .collect()
}
