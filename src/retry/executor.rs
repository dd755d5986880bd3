//! The retry loop.
//!
//! [`RetryExecutor`] runs a caller-supplied operation, asks the policy's
//! classifier about every failure, and sleeps on the tokio timer between
//! attempts. The error handed back is always the operation's own error from
//! the last attempt.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;

use crate::classify::HasSqlState;
use crate::error::Cancelled;
use crate::retry::error::PolicyError;
use crate::retry::policy::{RetryEvent, RetryPolicy};

/// Observer invoked before each backoff sleep.
pub type RetryHook<E> = Arc<dyn Fn(&RetryEvent<'_, E>) + Send + Sync>;

/// Re-runs operations that fail with retryable errors.
///
/// The executor owns only its immutable policy, so one instance can be shared
/// by any number of concurrent callers.
///
/// # Examples
///
/// ```rust
/// use crdb_retry::{DbError, RetryExecutor, RetryPolicy};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::new(Duration::from_millis(1)).with_max_attempts(3);
/// let executor = RetryExecutor::new(policy).unwrap();
/// let attempts = AtomicU32::new(0);
///
/// let value = executor
///     .execute(|| async {
///         if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
///             Err(DbError::new("40001", "restart transaction"))
///         } else {
///             Ok(42)
///         }
///     })
///     .await;
///
/// assert_eq!(value, Ok(42));
/// assert_eq!(attempts.load(Ordering::SeqCst), 3);
/// # });
/// ```
pub struct RetryExecutor<E> {
    policy: RetryPolicy<E>,
    on_retry: Option<RetryHook<E>>,
}

impl<E: 'static> RetryExecutor<E> {
    /// Create an executor after checking the policy's invariants.
    pub fn new(policy: RetryPolicy<E>) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            policy,
            on_retry: None,
        })
    }

    /// Register a hook called with each failed attempt that is about to be retried.
    ///
    /// The hook is synchronous and should not block; use it for logging or metrics.
    ///
    /// ```rust
    /// use crdb_retry::{DbError, RetryEvent, RetryExecutor};
    ///
    /// let executor = RetryExecutor::<DbError>::default().with_on_retry(|event: &RetryEvent<'_, DbError>| {
    ///     eprintln!("attempt {} failed: {}, retrying in {:?}", event.attempt, event.error, event.next_delay);
    /// });
    /// # let _ = executor;
    /// ```
    pub fn with_on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RetryEvent<'_, E>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }
}

impl<E> RetryExecutor<E> {
    /// The policy this executor applies.
    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails terminally, or runs out of attempts.
    ///
    /// Each attempt calls the factory again, so every retry starts from scratch.
    /// On failure the error from the last attempt is returned unchanged.
    ///
    /// Dropping the returned future cancels the loop, including any pending backoff.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(
            operation,
            std::future::pending::<Infallible>(),
            |never: Infallible| match never {},
        )
        .await
    }

    /// [`execute`](Self::execute) for operations that produce no value.
    pub async fn execute_void<F, Fut>(&self, operation: F) -> Result<(), E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        self.execute(operation).await
    }

    /// Like [`execute`](Self::execute), but stops when `cancel` completes during a backoff.
    ///
    /// A cancelled loop starts no further attempts and fails with
    /// `E::from(Cancelled)`.
    ///
    /// ```rust
    /// use crdb_retry::{DbError, Error, RetryExecutor, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let executor = RetryExecutor::new(RetryPolicy::new(Duration::from_secs(60))).unwrap();
    ///
    /// let result: Result<(), Error> = executor
    ///     .execute_until(tokio::time::sleep(Duration::from_millis(5)), || async {
    ///         Err(DbError::new("40001", "restart transaction").into())
    ///     })
    ///     .await;
    ///
    /// assert!(result.unwrap_err().is_cancelled());
    /// # });
    /// ```
    pub async fn execute_until<T, F, Fut, C>(&self, cancel: C, operation: F) -> Result<T, E>
    where
        E: From<Cancelled>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Future<Output = ()>,
    {
        self.run(operation, cancel, |()| E::from(Cancelled)).await
    }

    async fn run<T, F, Fut, C, X>(
        &self,
        mut operation: F,
        cancel: C,
        on_cancel: impl FnOnce(X) -> E,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Future<Output = X>,
    {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts();
        let mut cancel = std::pin::pin!(cancel);
        let mut attempt = 1u32;

        loop {
            let delay = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !self.policy.should_retry(&error) {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(attempt, "operation failed with a non-retryable error");
                        return Err(error);
                    }
                    if attempt >= max_attempts {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(attempt, max_attempts, "retry attempts exhausted");
                        return Err(error);
                    }

                    let delay = self.policy.jittered_delay(attempt);
                    if let Some(hook) = &self.on_retry {
                        hook(&RetryEvent {
                            attempt,
                            error: &error,
                            next_delay: delay,
                            elapsed: start.elapsed(),
                        });
                    }
                    delay
                }
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retryable failure, backing off"
            );

            tokio::select! {
                biased;
                reason = cancel.as_mut() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, "retry cancelled during backoff");
                    return Err(on_cancel(reason));
                }
                () = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

impl<E: HasSqlState + 'static> Default for RetryExecutor<E> {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            on_retry: None,
        }
    }
}

impl<E> Clone for RetryExecutor<E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}
