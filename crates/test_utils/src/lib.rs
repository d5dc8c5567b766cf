//! Test Utilities Crate
//!
//! Shared test infrastructure for the livery billing workspace.
//!
//! # Modules
//!
//! - `fixtures`: Deterministic money, shares, dates and ids
//! - `builders`: Register request builders and `YardSeed`
//! - `database`: PostgreSQL testcontainer with migrations applied
//! - `assertions`: Invoice and money assertions
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
