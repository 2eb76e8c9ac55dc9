//! Database error taxonomy.
//!
//! SQLx errors are mapped onto named variants by PostgreSQL error code so
//! callers can branch on the class of failure without string matching.

use core_kernel::PortError;
use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A column value could not be mapped into a field value
    #[error("Decode error in column '{column}': {message}")]
    DecodeFailed { column: String, message: String },

    /// An identifier arrived from outside the compiled vocabulary
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Generic SQL error
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier.
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    /// Checks if this error indicates a record was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    /// Checks if this error is a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if this error is a connection-related issue.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }

    /// Wraps into the port error type, attributing the failing repository.
    pub fn into_port(self, repository: &str) -> PortError {
        PortError::Storage {
            repository: repository.to_string(),
            message: self.to_string(),
            source: Some(Box::new(self)),
        }
    }
}

/// Maps SQLx errors to the more specific variants by PostgreSQL error code.
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateEntry(db_err.message().to_string()),
                        "23503" => {
                            DatabaseError::ForeignKeyViolation(db_err.message().to_string())
                        }
                        "23514" => {
                            DatabaseError::ConstraintViolation(db_err.message().to_string())
                        }
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let error = DatabaseError::not_found("QueueItem", "ABC123 2024-05-01");
        assert!(error.is_not_found());
        assert!(error.to_string().contains("ABC123"));
    }

    #[test]
    fn test_constraint_classification() {
        assert!(DatabaseError::DuplicateEntry("dup".into()).is_constraint_violation());
        assert!(DatabaseError::ForeignKeyViolation("fk".into()).is_constraint_violation());
        assert!(!DatabaseError::PoolExhausted.is_constraint_violation());
        assert!(DatabaseError::PoolExhausted.is_connection_error());
    }

    #[test]
    fn test_into_port_keeps_the_repository_name() {
        let port = DatabaseError::QueryFailed("boom".into()).into_port("summary_sink");
        assert!(port.to_string().contains("summary_sink"));
        assert!(port.to_string().contains("boom"));
    }
}
