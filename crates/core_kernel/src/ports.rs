//! Port plumbing shared by every adapter
//!
//! Domain crates define their own port traits (`YardPort`, `BillingStore`)
//! on top of [`DomainPort`]. Both the PostgreSQL adapter and the in-memory
//! store report failures as [`PortError`], which the domain error enums wrap.

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Storage failure as seen by the domain
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// Rejected by a storage constraint other than a conflict
    #[error("Rejected by storage: {0}")]
    Validation(String),

    /// A unique or exclusion constraint fired, e.g. two invoices for one period
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store could not be reached; retrying later may succeed
    #[error("Store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        PortError::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// True when a later retry of the same job may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Unavailable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict(_))
    }
}

/// Bound shared by all port traits so they can live behind `Arc<dyn ...>`
pub trait DomainPort: Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    Unhealthy,
}

/// Outcome of probing a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    pub latency_ms: u64,
    /// Failure detail when unhealthy
    pub message: Option<String>,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

/// Stores that can be probed before a billing run starts
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}
