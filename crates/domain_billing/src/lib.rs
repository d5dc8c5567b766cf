//! Billing Domain - Livery Invoicing Engine
//!
//! Given an owner and a billing period this crate determines exactly what
//! the owner owes and turns it into an immutable invoice.
//!
//! # Flow
//!
//! ```text
//! placements + ownership records + extra charges
//!        │
//!        ▼
//! ChargeAggregator ──▶ per-owner ChargeLines (share applied, rounded once)
//!        │
//!        ▼
//! InvoiceGenerator ──▶ Invoice + InvoiceLineItems (one transaction),
//!                      split charges settled once every co-owner is billed
//!        │
//!        ▼
//! Invoice lifecycle: draft ─▶ sent ─▶ paid / overdue, cancelled
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{InvoiceGenerator, InMemoryBillingStore};
//!
//! let generator = InvoiceGenerator::new(Arc::new(store));
//! let run = generator.generate_monthly_invoices(2026, 1).await?;
//! for invoice in &run.created {
//!     println!("{} {}", invoice.invoice_number, invoice.total);
//! }
//! ```

pub mod charge_line;
pub mod grouping;
pub mod sources;
pub mod aggregator;
pub mod invoice;
pub mod numbering;
pub mod ports;
pub mod generator;
pub mod memory;
pub mod error;

pub use charge_line::{ChargeLine, LineSource, LineType};
pub use grouping::{GroupableLine, HorseGroup};
pub use sources::ChargeSources;
pub use aggregator::{ChargeAggregator, InvoicePreview};
pub use invoice::{Invoice, InvoiceLineItem, InvoiceStatus, NewInvoice};
pub use numbering::{format_invoice_number, AllocatedNumber, BillingSettings};
pub use ports::{BillingStore, BillingTransaction};
pub use generator::{FailedOwner, InvoiceGenerator, InvoiceRequest, MonthlyRun};
pub use memory::InMemoryBillingStore;
pub use error::BillingError;
