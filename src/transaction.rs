//! Retrying `commit` and `rollback` on a transaction handle.
//!
//! [`Transaction`] is the seam to whatever driver owns the real transaction.
//! [`RetryingTransaction`] decorates one so that both boundary calls go
//! through a [`RetryExecutor`].
//!
//! # Commit-only retry
//!
//! Only the `commit`/`rollback` call itself is re-issued. The statements that
//! ran inside the transaction are **not** replayed. When the database aborts
//! a transaction at commit with a serialization failure, resubmitting just the
//! commit may not be enough; the database's optimistic-concurrency contract
//! expects the whole transaction to be retried. If your transaction body must
//! be replayed, wrap the entire body (begin, statements, commit) in
//! [`RetryExecutor::execute`] instead.

use std::future::Future;

use crate::classify::HasSqlState;
use crate::retry::RetryExecutor;

/// A database transaction that can be committed or rolled back.
///
/// Implement this for your driver's transaction handle. Methods take `&self`
/// so the same handle can be offered to several attempts.
pub trait Transaction {
    /// Error returned by the driver.
    type Error;

    /// Commit the transaction.
    fn commit(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Roll the transaction back.
    fn rollback(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A [`Transaction`] whose `commit` and `rollback` are retried.
///
/// # Examples
///
/// ```rust
/// use crdb_retry::{DbError, RetryingTransaction, Transaction};
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// struct FlakyCommit {
///     commits: AtomicU32,
/// }
///
/// impl Transaction for FlakyCommit {
///     type Error = DbError;
///
///     async fn commit(&self) -> Result<(), DbError> {
///         if self.commits.fetch_add(1, Ordering::SeqCst) == 0 {
///             Err(DbError::new("40001", "restart transaction"))
///         } else {
///             Ok(())
///         }
///     }
///
///     async fn rollback(&self) -> Result<(), DbError> {
///         Ok(())
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let tx = RetryingTransaction::new(FlakyCommit { commits: AtomicU32::new(0) });
/// tx.commit().await.unwrap();
/// assert_eq!(tx.inner().commits.load(Ordering::SeqCst), 2);
/// # });
/// ```
#[derive(Debug)]
pub struct RetryingTransaction<Tx: Transaction> {
    inner: Tx,
    executor: RetryExecutor<Tx::Error>,
}

impl<Tx> RetryingTransaction<Tx>
where
    Tx: Transaction,
    Tx::Error: HasSqlState + 'static,
{
    /// Wrap `inner` with the default retry policy.
    pub fn new(inner: Tx) -> Self {
        Self::with_executor(inner, RetryExecutor::default())
    }
}

impl<Tx: Transaction> RetryingTransaction<Tx> {
    /// Wrap `inner`, retrying with `executor`.
    pub fn with_executor(inner: Tx, executor: RetryExecutor<Tx::Error>) -> Self {
        Self { inner, executor }
    }

    /// The wrapped transaction.
    pub fn inner(&self) -> &Tx {
        &self.inner
    }

    /// The executor used for `commit` and `rollback`.
    pub fn executor(&self) -> &RetryExecutor<Tx::Error> {
        &self.executor
    }

    /// Unwrap the decorated transaction.
    pub fn into_inner(self) -> Tx {
        self.inner
    }
}

impl<Tx> Transaction for RetryingTransaction<Tx>
where
    Tx: Transaction + Sync,
    Tx::Error: Send,
{
    type Error = Tx::Error;

    fn commit(&self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.executor.execute_void(|| self.inner.commit())
    }

    fn rollback(&self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.executor.execute_void(|| self.inner.rollback())
    }
}
