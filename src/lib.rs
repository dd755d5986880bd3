//! # crdb-retry
//!
//! Client-side retry for distributed SQL databases that abort transactions
//! under contention and ask the client to resubmit.
//!
//! The crate is split into a pure core and a thin imperative shell:
//! - **Classify**: [`is_retryable`] decides from a SQLSTATE-style code alone
//!   whether a failure is transient (`40001`, class `08`, `57P01`).
//! - **Retry**: [`RetryExecutor`] re-runs an async operation with jittered
//!   exponential backoff and hands back the operation's own error when it
//!   gives up.
//! - **Transaction**: [`RetryingTransaction`] routes `commit` and `rollback`
//!   through the executor.
//!
//! ## Quick Example
//!
//! ```rust
//! use crdb_retry::{DbError, RetryExecutor, RetryPolicy};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let executor = RetryExecutor::new(
//!     RetryPolicy::new(Duration::from_millis(10)).with_max_attempts(3),
//! )
//! .unwrap();
//! let attempts = AtomicU32::new(0);
//!
//! let balance = executor
//!     .execute(|| async {
//!         if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
//!             Err(DbError::new("40001", "restart transaction"))
//!         } else {
//!             Ok(42)
//!         }
//!     })
//!     .await;
//!
//! assert_eq!(balance, Ok(42));
//! # });
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): debug events when the executor backs off or gives up.
//! - `serde` (default): `Deserialize`/`Serialize` for [`RetryConfig`] and [`SqlState`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod classify;
pub mod error;
pub mod retry;
pub mod transaction;

// Re-exports
pub use classify::{classify, is_retryable, FailureKind, HasSqlState, SqlState};
pub use error::{Cancelled, DbError, Error, Result};
pub use retry::{PolicyError, RetryConfig, RetryEvent, RetryExecutor, RetryPolicy};
pub use transaction::{RetryingTransaction, Transaction};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::classify::{is_retryable, HasSqlState, SqlState};
    pub use crate::error::{DbError, Error};
    pub use crate::retry::{RetryExecutor, RetryPolicy};
    pub use crate::transaction::{RetryingTransaction, Transaction};
}
