//! Billing Domain Ports
//!
//! Invoice generation runs as one storage transaction per owner and
//! period. `BillingStore` is the read side and the entry point;
//! `BillingTransaction` is the unit of work opened by [`BillingStore::begin`].
//!
//! # Transaction contract
//!
//! - `lock_owner` serializes concurrent generation for the same owner
//!   until the transaction ends.
//! - `allocate_invoice_number` is an atomic increment-and-fetch; numbers
//!   taken by a transaction that is later dropped may leave gaps.
//! - `load_owner_sources` locks the unbilled charges it returns.
//! - `insert_invoice` fails with `PortError::Conflict` if a non-cancelled
//!   invoice of the owner overlaps the period or the number is taken.
//! - `save_invoice_status` only writes while the stored status is still
//!   `from`, and fails with `PortError::Conflict` otherwise.
//! - Dropping a transaction without `commit` discards every write.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut tx = store.begin().await?;
//! tx.lock_owner(owner).await?;
//! let allocated = tx.allocate_invoice_number().await?;
//! tx.insert_invoice(&invoice).await?;
//! tx.commit().await?;
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{DateRange, DomainPort, ExtraChargeId, InvoiceId, OwnerId, PortError};

use crate::invoice::{Invoice, InvoiceStatus};
use crate::numbering::{AllocatedNumber, BillingSettings};
use crate::sources::ChargeSources;

/// Read access to billing state and the transaction entry point
#[async_trait]
pub trait BillingStore: DomainPort {
    /// Opens a unit of work
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, PortError>;

    /// Current settings, created with defaults on first use
    async fn settings(&self) -> Result<BillingSettings, PortError>;

    /// Owners a monthly run should consider, in a stable order
    async fn billing_candidates(&self, period: &DateRange) -> Result<Vec<OwnerId>, PortError>;

    /// Sources for previewing `owner`'s invoice up to `period_end`
    async fn load_owner_sources(
        &self,
        owner: OwnerId,
        period_end: NaiveDate,
    ) -> Result<ChargeSources, PortError>;

    /// A non-cancelled invoice of `owner` overlapping `period`, if any
    async fn find_overlapping_invoice(
        &self,
        owner: OwnerId,
        period: &DateRange,
    ) -> Result<Option<Invoice>, PortError>;

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError>;

    async fn invoices_for_owner(&self, owner: OwnerId) -> Result<Vec<Invoice>, PortError>;

    /// Persists status and lifecycle timestamps if the stored status is `from`
    async fn save_invoice_status(&self, invoice: &Invoice, from: InvoiceStatus) -> Result<(), PortError>;

    /// Sent invoices whose due date is before `today`
    async fn invoices_past_due(&self, today: NaiveDate) -> Result<Vec<Invoice>, PortError>;
}

/// One invoice creation or cancellation unit of work
#[async_trait]
pub trait BillingTransaction: Send {
    async fn lock_owner(&mut self, owner: OwnerId) -> Result<(), PortError>;

    async fn find_overlapping_invoice(
        &mut self,
        owner: OwnerId,
        period: &DateRange,
    ) -> Result<Option<Invoice>, PortError>;

    async fn allocate_invoice_number(&mut self) -> Result<AllocatedNumber, PortError>;

    /// Like [`BillingStore::load_owner_sources`], locking the charges returned
    async fn load_owner_sources(
        &mut self,
        owner: OwnerId,
        period_end: NaiveDate,
    ) -> Result<ChargeSources, PortError>;

    /// Inserts the invoice with its line items
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError>;

    /// Sets `invoiced` and the settling invoice on a charge
    async fn mark_charge_invoiced(
        &mut self,
        charge: ExtraChargeId,
        invoice: InvoiceId,
    ) -> Result<(), PortError>;

    /// Like [`BillingStore::save_invoice_status`], inside the transaction
    async fn save_invoice_status(&mut self, invoice: &Invoice, from: InvoiceStatus) -> Result<(), PortError>;

    /// Returns `charges` to unbilled, clearing their settling invoice
    async fn release_charges(&mut self, charges: &[ExtraChargeId]) -> Result<(), PortError>;

    async fn commit(&mut self) -> Result<(), PortError>;
}
