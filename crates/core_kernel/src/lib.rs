//! Core Kernel - Foundational types for the livery billing system
//!
//! This crate provides the building blocks used across all domain crates:
//! - Money and percentage types with precise decimal arithmetic
//! - Inclusive calendar date ranges and the yard's local timezone
//! - Strongly typed identifiers
//! - Port error types shared by every adapter

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError, Percentage};
pub use temporal::{DateRange, TemporalError, Timezone};
pub use identifiers::{
    OwnerId, HorseId, LocationId, RateTypeId, OwnershipId, PlacementId,
    ExtraChargeId, InvoiceId, LineItemId,
};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
