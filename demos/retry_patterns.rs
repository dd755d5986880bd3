//! Retry Patterns Example
//!
//! Demonstrates retrying database work that the server aborts under contention:
//! - Default policy against serialization failures
//! - Backoff schedules for custom policies
//! - Terminal errors that must not be retried
//! - Hooks for observability
//! - Many clients sharing one executor
//! - Commit-only retry through `RetryingTransaction`
//!
//! Run with: cargo run --example retry_patterns

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crdb_retry::prelude::*;
use crdb_retry::{classify, RetryEvent};

// ==================== Basic Retry ====================

/// Example 1: Serialization failures with the default policy
async fn example_basic_retry() {
    println!("\n=== Example 1: Basic Retry ===");

    let executor = RetryExecutor::<DbError>::default();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute(|| async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            println!("  Attempt {}", n + 1);
            if n < 2 {
                Err(DbError::new("40001", "restart transaction"))
            } else {
                Ok("committed")
            }
        })
        .await;

    println!(
        "Result after {} attempts: {:?}",
        attempts.load(Ordering::SeqCst),
        result
    );
}

// ==================== Backoff Schedules ====================

/// Example 2: How delays grow for a custom policy
fn example_backoff_schedule() {
    println!("\n=== Example 2: Backoff Schedule ===");

    let policy = RetryPolicy::<DbError>::new(Duration::from_millis(50))
        .with_max_attempts(6)
        .with_backoff_multiplier(1.5)
        .with_jitter(0.2);

    for attempt in 1..policy.max_attempts() {
        let (low, high) = policy.delay_bounds(attempt);
        println!(
            "  After attempt {}: {:?} (jittered within {:?}..={:?}, drew {:?})",
            attempt,
            policy.delay_for_attempt(attempt),
            low,
            high,
            policy.jittered_delay(attempt)
        );
    }
}

// ==================== Terminal Errors ====================

/// Example 3: Errors the classifier refuses to retry
async fn example_terminal_errors() {
    println!("\n=== Example 3: Terminal Errors ===");

    for code in ["40001", "08006", "57P01", "42601", "23505"] {
        let err = DbError::new(code, "example");
        println!("  {} -> {}", code, classify(&err));
    }

    let executor = RetryExecutor::<DbError>::default();
    let attempts = AtomicU32::new(0);
    let result = executor
        .execute_void(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(DbError::new("23505", "duplicate key value violates unique constraint"))
        })
        .await;

    println!(
        "Unique violation after {} attempt(s): {}",
        attempts.load(Ordering::SeqCst),
        result.unwrap_err()
    );
}

// ==================== Retry with Observability ====================

/// Example 4: Hooks for logging/metrics
async fn example_retry_with_hooks() {
    println!("\n=== Example 4: Retry with Hooks ===");

    let policy = RetryPolicy::new(Duration::from_millis(20)).with_max_attempts(4);
    let executor = RetryExecutor::new(policy)
        .expect("valid policy")
        .with_on_retry(|event: &RetryEvent<'_, DbError>| {
            println!(
                "  Attempt {} failed ({}), retrying in {:?} (elapsed {:?})",
                event.attempt, event.error, event.next_delay, event.elapsed
            );
        });

    let result = executor
        .execute(|| async { Err::<(), _>(DbError::new("08006", "connection reset by peer")) })
        .await;

    println!("Gave up with: {}", result.unwrap_err());
}

// ==================== Concurrent Clients ====================

/// Example 5: One executor shared by many contending clients
async fn example_concurrent_clients() {
    println!("\n=== Example 5: Concurrent Clients ===");

    let executor = RetryExecutor::<DbError>::new(
        RetryPolicy::new(Duration::from_millis(10)).with_max_attempts(5),
    )
    .expect("valid policy");
    let conflicts = AtomicU32::new(6);

    let clients = (0..4).map(|client| {
        let executor = &executor;
        let conflicts = &conflicts;
        async move {
            executor
                .execute(|| async move {
                    let left = conflicts.load(Ordering::SeqCst);
                    let claimed = left > 0
                        && conflicts
                            .compare_exchange(left, left - 1, Ordering::SeqCst, Ordering::SeqCst)
                            .is_ok();
                    if claimed {
                        Err(DbError::new("40001", "write-write conflict"))
                    } else {
                        Ok(client)
                    }
                })
                .await
        }
    });

    for result in futures::future::join_all(clients).await {
        println!("  Client result: {:?}", result);
    }
}

// ==================== Transactions ====================

struct PrintingTx {
    commits: AtomicU32,
}

impl Transaction for PrintingTx {
    type Error = DbError;

    async fn commit(&self) -> Result<(), DbError> {
        let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        println!("  COMMIT #{}", n);
        if n == 1 {
            Err(DbError::new("40001", "restart transaction: TransactionRetryError"))
        } else {
            Ok(())
        }
    }

    async fn rollback(&self) -> Result<(), DbError> {
        println!("  ROLLBACK");
        Ok(())
    }
}

/// Example 6: Retrying the commit call of a transaction
///
/// Only the commit is re-issued; statements that ran before it are not replayed.
async fn example_transaction() {
    println!("\n=== Example 6: Commit Retry ===");

    let tx = RetryingTransaction::new(PrintingTx {
        commits: AtomicU32::new(0),
    });

    match tx.commit().await {
        Ok(()) => println!(
            "Committed after {} calls",
            tx.inner().commits.load(Ordering::SeqCst)
        ),
        Err(e) => println!("Commit failed: {}", e),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("======================================");
    println!("       Retry Patterns Example         ");
    println!("======================================");

    example_basic_retry().await;
    example_backoff_schedule();
    example_terminal_errors().await;
    example_retry_with_hooks().await;
    example_concurrent_clients().await;
    example_transaction().await;

    println!("\n======================================");
    println!("           Examples Complete           ");
    println!("======================================");
}
