//! Database error types
//!
//! SQLx errors are classified by PostgreSQL error code so that the billing
//! layer can tell an overlap or duplicate (a conflict) from a real failure.

use thiserror::Error;

use core_kernel::PortError;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Exclusion constraint violation, raised for overlapping date ranges
    #[error("Date range overlap detected: {0}")]
    RangeOverlap(String),

    /// A conditional update found the row in a different state
    #[error("Stale write: {0}")]
    StaleWrite(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be turned back into a domain value
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("Invoice", "INV00042");
    /// assert!(error.to_string().contains("Invoice"));
    /// ```
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn corrupt(message: impl std::fmt::Display) -> Self {
        DatabaseError::CorruptRow(message.to_string())
    }
}

/// Maps SQLx errors to DatabaseError variants by PostgreSQL error code
///
/// See <https://www.postgresql.org/docs/current/errcodes-appendix.html>
impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound {
                entity: "Record",
                id: "unknown".to_string(),
            },
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(message),
                    Some("23503") => DatabaseError::ForeignKeyViolation(message),
                    Some("23514") => DatabaseError::ConstraintViolation(message),
                    Some("23P01") => DatabaseError::RangeOverlap(message),
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::CorruptRow(error.to_string())
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

/// Translates storage failures into the port vocabulary
///
/// Duplicate and overlap violations become `Conflict`, which the invoice
/// generator turns into a duplicate-invoice error.
pub fn db_to_port_error(e: DatabaseError) -> PortError {
    match e {
        DatabaseError::NotFound { entity, id } => PortError::NotFound {
            entity_type: entity.to_string(),
            id,
        },
        DatabaseError::DuplicateEntry(msg)
        | DatabaseError::RangeOverlap(msg)
        | DatabaseError::StaleWrite(msg) => PortError::conflict(msg),
        DatabaseError::ForeignKeyViolation(msg) | DatabaseError::ConstraintViolation(msg) => {
            PortError::validation(msg)
        }
        DatabaseError::ConnectionFailed(msg) => PortError::unavailable(msg),
        DatabaseError::PoolExhausted => PortError::unavailable("Connection pool exhausted"),
        other => PortError::internal(other.to_string()),
    }
}

impl From<DatabaseError> for PortError {
    fn from(e: DatabaseError) -> Self {
        db_to_port_error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_maps_to_conflict() {
        let port = db_to_port_error(DatabaseError::RangeOverlap("invoices_no_overlap".into()));
        assert!(port.is_conflict());
    }

    #[test]
    fn test_stale_status_maps_to_conflict() {
        let port = db_to_port_error(DatabaseError::StaleWrite("Invoice INV00001 is paid, expected sent".into()));
        assert!(port.is_conflict());
        assert!(!port.is_transient());
    }

    #[test]
    fn test_not_found_keeps_entity() {
        let port = db_to_port_error(DatabaseError::not_found("Invoice", "abc"));
        assert!(port.is_not_found());
        assert!(port.to_string().contains("Invoice"));
    }

    #[test]
    fn test_pool_exhaustion_is_transient() {
        assert!(db_to_port_error(DatabaseError::PoolExhausted).is_transient());
    }
}
