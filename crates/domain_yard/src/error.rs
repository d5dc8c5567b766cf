//! Yard domain errors
//!
//! Write-time validation failures for ownership records, placements and
//! extra charges, plus errors passed up from the storage port.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{
    ExtraChargeId, HorseId, MoneyError, OwnerId, OwnershipId, PlacementId, PortError,
    TemporalError,
};

/// What made an ownership record conflict with the existing register
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipConflictKind {
    /// The horse would be more than 100% owned on `on`
    TotalExceeded {
        conflicting_total: Decimal,
        on: NaiveDate,
    },
    /// The owner already holds an overlapping share of the same horse
    OverlappingRecord {
        conflicting_record: OwnershipId,
    },
}

/// Errors that can occur in the yard domain
#[derive(Debug, Error)]
pub enum YardError {
    /// An ownership write would break the register's invariants
    #[error("Ownership conflict for horse {horse}, owner {owner}: {kind:?}")]
    OwnershipConflict {
        horse: HorseId,
        owner: OwnerId,
        kind: OwnershipConflictKind,
    },

    /// A placement overlaps another placement of the same horse
    #[error("Horse {horse} already has placement {conflicting} from {conflicting_start} to {}", open_end(.conflicting_end))]
    PlacementOverlap {
        horse: HorseId,
        conflicting: PlacementId,
        conflicting_start: NaiveDate,
        conflicting_end: Option<NaiveDate>,
    },

    /// The charge has been invoiced and can no longer change
    #[error("Extra charge {0} has already been invoiced")]
    ChargeAlreadyInvoiced(ExtraChargeId),

    /// Invalid input data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),

    /// Storage port failure
    #[error(transparent)]
    Port(#[from] PortError),
}

fn open_end(end: &Option<NaiveDate>) -> String {
    end.map_or_else(|| "present".to_string(), |d| d.to_string())
}

impl YardError {
    pub fn invalid(message: impl Into<String>) -> Self {
        YardError::InvalidData(message.into())
    }

    /// True for the write-time invariant violations a UI should show the user
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            YardError::OwnershipConflict { .. }
                | YardError::PlacementOverlap { .. }
                | YardError::ChargeAlreadyInvoiced(_)
        )
    }
}
