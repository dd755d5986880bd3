//! Classification of database failures into retryable and terminal.
//!
//! Classification is driven purely by the SQLSTATE-style status code an error
//! carries. Errors expose that code through [`HasSqlState`]; anything without a
//! code is terminal.
//!
//! # Examples
//!
//! ```rust
//! use crdb_retry::{is_retryable, DbError};
//!
//! assert!(is_retryable(&DbError::new("40001", "restart transaction")));
//! assert!(is_retryable(&DbError::new("08006", "connection failure")));
//! assert!(is_retryable(&DbError::new("57P01", "terminating connection")));
//! assert!(!is_retryable(&DbError::new("42601", "syntax error")));
//! assert!(!is_retryable(&DbError::without_state("no code")));
//! ```

use std::fmt;

/// A short SQLSTATE-style status code such as `40001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SqlState(String);

impl SqlState {
    /// `40001`: the transaction lost a serialization conflict and must be resubmitted.
    pub const SERIALIZATION_FAILURE: &'static str = "40001";
    /// `57P01`: the server is shutting down or restarting.
    pub const ADMIN_SHUTDOWN: &'static str = "57P01";
    /// `08`: the connection exception class.
    pub const CONNECTION_EXCEPTION_CLASS: &'static str = "08";

    /// Wrap a status code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two-character class prefix, or the whole code if it is shorter.
    ///
    /// ```rust
    /// use crdb_retry::SqlState;
    ///
    /// assert_eq!(SqlState::new("08006").class(), "08");
    /// assert_eq!(SqlState::new("0").class(), "0");
    /// ```
    pub fn class(&self) -> &str {
        self.0.get(..2).unwrap_or(&self.0)
    }
}

impl fmt::Display for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SqlState {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for SqlState {
    fn from(code: String) -> Self {
        Self(code)
    }
}

/// Errors that may carry a database status code.
///
/// Implement this for your application error so the default classifier can
/// see through it. Return `None` for failures that did not come from the
/// database.
pub trait HasSqlState {
    /// The status code reported by the database, if any.
    fn sql_state(&self) -> Option<&SqlState>;
}

impl<T: HasSqlState + ?Sized> HasSqlState for &T {
    fn sql_state(&self) -> Option<&SqlState> {
        (**self).sql_state()
    }
}

impl<T: HasSqlState + ?Sized> HasSqlState for Box<T> {
    fn sql_state(&self) -> Option<&SqlState> {
        (**self).sql_state()
    }
}

/// Why a failure was classified the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Concurrent transactions conflicted; resubmitting may succeed.
    SerializationFailure,
    /// The connection was lost or could not be established.
    ConnectionFailure,
    /// The node was shut down or restarted by an operator.
    AdminShutdown,
    /// Anything else, including errors without a status code.
    Terminal,
}

impl FailureKind {
    /// Whether a failure of this kind should be retried.
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureKind::Terminal)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::SerializationFailure => "serialization failure",
            FailureKind::ConnectionFailure => "connection failure",
            FailureKind::AdminShutdown => "admin shutdown",
            FailureKind::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

/// Classify a bare status code.
pub fn classify_state(state: Option<&SqlState>) -> FailureKind {
    let Some(state) = state else {
        return FailureKind::Terminal;
    };
    let code = state.as_str();
    if code == SqlState::SERIALIZATION_FAILURE {
        FailureKind::SerializationFailure
    } else if code == SqlState::ADMIN_SHUTDOWN {
        FailureKind::AdminShutdown
    } else if state.class() == SqlState::CONNECTION_EXCEPTION_CLASS {
        FailureKind::ConnectionFailure
    } else {
        FailureKind::Terminal
    }
}

/// Classify an error by the status code it carries.
pub fn classify<E: HasSqlState + ?Sized>(error: &E) -> FailureKind {
    classify_state(error.sql_state())
}

/// The default retry classifier.
///
/// Retryable iff the code is `40001`, belongs to class `08`, or is `57P01`.
pub fn is_retryable<E: HasSqlState + ?Sized>(error: &E) -> bool {
    classify(error).is_retryable()
}
