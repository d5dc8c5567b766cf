//! Domain Adapters
//!
//! Port implementations backed by PostgreSQL.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresBillingStore;
//! use domain_yard::YardPort;
//!
//! let store = PostgresBillingStore::new(pool);
//! let owner = store.get_owner(owner_id).await?;
//! ```

pub mod billing;

pub use billing::{PgBillingTransaction, PostgresBillingStore};
