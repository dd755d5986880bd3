//! Bounded, backoff-scheduled retry of database operations.
//!
//! - **Policy**: [`RetryPolicy`] is immutable data plus a classifier. Build it
//!   once and share it.
//! - **Executor**: [`RetryExecutor`] re-runs an operation factory while the
//!   classifier says the failure is transient and attempts remain.
//! - **Config**: [`RetryConfig`] is the serde-friendly numeric half of a policy.
//!
//! # Quick Start
//!
//! ```rust
//! use crdb_retry::{DbError, RetryExecutor, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let executor = RetryExecutor::new(
//!     RetryPolicy::new(Duration::from_millis(10)).with_max_attempts(3),
//! )
//! .unwrap();
//!
//! let result = executor
//!     .execute(|| async { Err::<(), _>(DbError::new("42601", "syntax error")) })
//!     .await;
//!
//! // Terminal errors come back unchanged after a single attempt
//! assert_eq!(result.unwrap_err().to_string(), "syntax error (SQLSTATE 42601)");
//! # });
//! ```
//!
//! # Backoff
//!
//! The delay after failed attempt `n` is `base_delay * backoff_multiplier^(n-1)`,
//! multiplied by a uniform factor in `[1 - jitter_factor, 1 + jitter_factor]`.
//! There is no cap; bound `max_attempts` and `base_delay` accordingly.

mod config;
mod error;
mod executor;
mod policy;

pub use config::RetryConfig;
pub use error::PolicyError;
pub use executor::{RetryExecutor, RetryHook};
pub use policy::{Classifier, RetryEvent, RetryPolicy};

#[cfg(test)]
mod tests;
