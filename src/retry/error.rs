//! Error types for retry configuration.

use thiserror::Error;

/// A retry policy that breaks one of its invariants.
///
/// # Examples
///
/// ```rust
/// use crdb_retry::{DbError, PolicyError, RetryExecutor, RetryPolicy};
///
/// let policy = RetryPolicy::<DbError>::default().with_max_attempts(0);
///
/// match RetryExecutor::new(policy) {
///     Err(PolicyError::ZeroAttempts) => {}
///     _ => panic!("Expected validation failure"),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PolicyError {
    /// `max_attempts` was zero; at least the first attempt must be allowed.
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    /// The multiplier was below 1.0 or not finite.
    #[error("backoff_multiplier must be a finite value >= 1.0, got {0}")]
    InvalidMultiplier(f64),
    /// The jitter factor was outside `[0, 1]`.
    #[error("jitter_factor must be within [0.0, 1.0], got {0}")]
    InvalidJitter(f64),
}
