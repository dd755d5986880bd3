//! Database error types consumed by the classifier.

use thiserror::Error;

use crate::classify::{HasSqlState, SqlState};

/// An error reported by the database, tagged with its status code.
///
/// # Examples
///
/// ```rust
/// use crdb_retry::{DbError, HasSqlState};
///
/// let err = DbError::new("40001", "restart transaction: TransactionRetryWithProtoRefreshError");
/// assert_eq!(err.sql_state().map(|s| s.as_str()), Some("40001"));
/// assert!(err.to_string().contains("40001"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (SQLSTATE {})", .state.as_ref().map(SqlState::as_str).unwrap_or("none"))]
pub struct DbError {
    state: Option<SqlState>,
    message: String,
}

impl DbError {
    /// A database error with a status code.
    pub fn new(state: impl Into<SqlState>, message: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            message: message.into(),
        }
    }

    /// A database error the driver reported without a status code.
    pub fn without_state(message: impl Into<String>) -> Self {
        Self {
            state: None,
            message: message.into(),
        }
    }

    /// The human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl HasSqlState for DbError {
    fn sql_state(&self) -> Option<&SqlState> {
        self.state.as_ref()
    }
}

/// Returned when a retry loop is cancelled during its backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("retry cancelled during backoff")]
pub struct Cancelled;

/// Error type for operations run through the retry executor.
///
/// Callers with their own error type can skip this one: implement
/// [`HasSqlState`] (and `From<Cancelled>` for cancellable retries) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The database rejected the operation.
    #[error(transparent)]
    Database(#[from] DbError),
    /// The retry loop was cancelled before the operation succeeded.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl Error {
    /// The database error, if this is one.
    pub fn as_database(&self) -> Option<&DbError> {
        match self {
            Error::Database(err) => Some(err),
            Error::Cancelled(_) => None,
        }
    }

    /// Returns true if the retry loop was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

impl HasSqlState for Error {
    fn sql_state(&self) -> Option<&SqlState> {
        self.as_database().and_then(DbError::sql_state)
    }
}

/// Result alias for operations that fail with [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
