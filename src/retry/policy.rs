//! Retry policy types and backoff arithmetic.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::classify::{is_retryable, HasSqlState};
use crate::retry::error::PolicyError;

/// Shared classifier deciding whether an error may be retried.
pub type Classifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// A retry policy describing how to retry failed operations.
///
/// Policies are pure data plus a classifier - they describe retry behavior but
/// don't execute it. Builder methods consume the policy, so a policy handed to
/// an executor never changes afterwards.
///
/// # Examples
///
/// ```rust
/// use crdb_retry::{DbError, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::<DbError>::new(Duration::from_millis(100))
///     .with_max_attempts(4)
///     .with_backoff_multiplier(2.0)
///     .with_jitter(0.0);
///
/// assert_eq!(policy.max_attempts(), 4);
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
/// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
/// ```
pub struct RetryPolicy<E> {
    max_attempts: u32,
    base_delay: Duration,
    backoff_multiplier: f64,
    jitter_factor: f64,
    classifier: Classifier<E>,
}

/// Information about a failed attempt, passed to retry hooks.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Delay before the next attempt.
    pub next_delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

impl<E: 'static> RetryPolicy<E> {
    /// Default number of attempts, including the first one.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    /// Default delay before the first retry.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);
    /// Default growth factor between consecutive delays.
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
    /// Default proportional jitter.
    pub const DEFAULT_JITTER_FACTOR: f64 = 0.5;

    /// Create a policy with the default attempt count, multiplier and jitter,
    /// the given base delay, and a classifier that retries nothing.
    ///
    /// Use [`with_classifier`](Self::with_classifier) to choose what is
    /// retried, or [`RetryPolicy::default`] for errors carrying a status code.
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_delay,
            backoff_multiplier: Self::DEFAULT_BACKOFF_MULTIPLIER,
            jitter_factor: Self::DEFAULT_JITTER_FACTOR,
            classifier: Arc::new(|_| false),
        }
    }

    /// Set the maximum number of attempts, including the first one.
    ///
    /// `with_max_attempts(1)` disables retrying.
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the factor each successive delay grows by.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set proportional jitter.
    ///
    /// The factor determines the range of randomness. For example, `0.25` means
    /// the actual delay will be ±25% of the calculated delay.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Replace the classifier deciding which errors are retried.
    ///
    /// ```rust
    /// use crdb_retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::with_base_delay(Duration::from_millis(10))
    ///     .with_classifier(|err: &String| err == "busy");
    ///
    /// assert!(policy.should_retry(&"busy".to_string()));
    /// assert!(!policy.should_retry(&"denied".to_string()));
    /// ```
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }
}

impl<E> RetryPolicy<E> {
    /// Get the maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Get the delay before the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Get the backoff multiplier.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Get the jitter factor.
    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    /// Ask the classifier whether `error` may be retried.
    pub fn should_retry(&self, error: &E) -> bool {
        (self.classifier)(error)
    }

    /// Calculate the delay after failed attempt `attempt` (1-indexed), before jitter.
    ///
    /// Delay = base * multiplier^(attempt - 1). Results too large for a
    /// `Duration` saturate at `Duration::MAX`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        scale(self.base_delay, self.backoff_multiplier.powi(exponent))
    }

    /// The range the jittered delay after `attempt` is drawn from.
    pub fn delay_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let delay = self.delay_for_attempt(attempt);
        let jitter = self.effective_jitter();
        (scale(delay, 1.0 - jitter), scale(delay, 1.0 + jitter))
    }

    /// Calculate the delay after `attempt` with jitter applied.
    ///
    /// This is what the executor sleeps for.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let jitter = self.effective_jitter();
        if jitter == 0.0 {
            return delay;
        }
        let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
        scale(delay, factor)
    }

    // NaN counts as no jitter
    fn effective_jitter(&self) -> f64 {
        if self.jitter_factor > 0.0 {
            self.jitter_factor.min(1.0)
        } else {
            0.0
        }
    }

    /// Check the policy's invariants.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(PolicyError::InvalidMultiplier(self.backoff_multiplier));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(PolicyError::InvalidJitter(self.jitter_factor));
        }
        Ok(())
    }
}

impl<E: HasSqlState + 'static> RetryPolicy<E> {
    /// Create a policy with the given base delay that retries serialization
    /// failures, connection errors and node restarts.
    pub fn new(base_delay: Duration) -> Self {
        Self::with_base_delay(base_delay).with_classifier(|err: &E| is_retryable(err))
    }
}

/// 5 attempts, 200ms base delay, doubling, ±50% jitter, SQLSTATE classifier.
impl<E: HasSqlState + 'static> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_DELAY)
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter_factor", &self.jitter_factor)
            .finish_non_exhaustive()
    }
}

fn scale(delay: Duration, factor: f64) -> Duration {
    // A zero delay stays zero even when the factor overflows to infinity
    if delay.is_zero() {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor.max(0.0)).unwrap_or(Duration::MAX)
}
