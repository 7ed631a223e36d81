//! Error types shared by the store implementations

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Failure talking to the backing store
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred while opening or acquiring a connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred while applying schema migrations
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A stored row could not be mapped into a domain value
    #[error("Corrupt record in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

impl DatabaseError {
    /// Classify a sqlx error raised while running a statement
    pub fn query(err: SqlxError) -> Self {
        match err {
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
                DatabaseError::Connection(err)
            }
            other => DatabaseError::Query(other),
        }
    }

    /// Whether the error was caused by a unique-constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Query(SqlxError::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<SqlxError> for DatabaseError {
    fn from(err: SqlxError) -> Self {
        DatabaseError::query(err)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_connection_errors() {
        let err = DatabaseError::query(SqlxError::PoolTimedOut);
        assert!(matches!(err, DatabaseError::Connection(_)));
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn missing_rows_are_query_errors() {
        let err: DatabaseError = SqlxError::RowNotFound.into();
        assert!(matches!(err, DatabaseError::Query(_)));
    }
}
