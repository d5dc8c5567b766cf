//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the yard register and the billing engine,
//! built on SQLx.
//!
//! # Concurrency
//!
//! - Register writes lock the horse row before validating overlaps.
//! - Invoice generation locks the owner row, allocates the invoice number
//!   with a single `UPDATE ... RETURNING` on the settings row and locks the
//!   unbilled charges it settles.
//! - The `invoices_no_overlap` exclusion constraint rejects a second live
//!   invoice for the same owner and days even if a caller skips the lock.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresBillingStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/livery")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresBillingStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use error::{db_to_port_error, DatabaseError};
pub use adapters::{PgBillingTransaction, PostgresBillingStore};
