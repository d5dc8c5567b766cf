//! Billing domain errors

use chrono::NaiveDate;
use thiserror::Error;

use core_kernel::{InvoiceId, MoneyError, OwnerId, PortError, TemporalError};
use domain_yard::YardError;

use crate::invoice::InvoiceStatus;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// A non-cancelled invoice of the owner already covers part of the period
    #[error("Owner {owner} already has invoice {existing_number} covering {existing_start} to {existing_end} which overlaps with this period")]
    DuplicateInvoice {
        owner: OwnerId,
        existing_number: String,
        existing_start: NaiveDate,
        existing_end: NaiveDate,
    },

    /// The invoice's status does not allow the requested action
    #[error("Cannot {action} invoice {invoice_number} while it is {from}")]
    InvalidTransition {
        invoice_number: String,
        from: InvoiceStatus,
        action: &'static str,
    },

    /// Another writer changed the invoice's status first
    #[error("Invoice {0} changed status while this update was in progress")]
    StatusChanged(String),

    /// Invoice not found
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Invalid request
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),

    #[error(transparent)]
    Yard(#[from] YardError),

    /// Storage port failure
    #[error(transparent)]
    Port(#[from] PortError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, BillingError::DuplicateInvoice { .. })
    }
}
