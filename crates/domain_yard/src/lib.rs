//! Yard Domain - who owns each horse, where it is kept and what it costs
//!
//! This crate provides:
//! - Owners, horses, locations and rate types
//! - Time-bounded fractional ownership with the implicit whole share for
//!   unrecorded horses
//! - Placements and the inclusive day-count charge calculation
//! - Extra charges and their charge types
//! - Write-time validation and the `YardPort` trait

pub mod owner;
pub mod ownership;
pub mod placement;
pub mod charge;
pub mod ports;
pub mod error;

pub use owner::{Horse, Location, Owner, RateType};
pub use ownership::{
    validate_ownership, ActiveShare, OwnershipRecord, OwnershipRegister, ShareBasis, ShareSegment,
};
pub use placement::{placement_charge_for, plan_move, validate_placement, MovePlan, Placement, PlacementCharge};
pub use charge::{ChargeType, ExtraCharge};
pub use ports::{
    MoveHorse, NewExtraCharge, NewHorse, NewOwner, NewOwnership, NewPlacement, NewRateType, YardPort,
};
pub use error::{OwnershipConflictKind, YardError};
