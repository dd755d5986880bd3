//! Integration tests for the retry executor.

use super::*;
use crate::classify::{HasSqlState, SqlState};
use crate::error::{DbError, Error};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn fast_policy(max_attempts: u32) -> RetryPolicy<DbError> {
    RetryPolicy::new(Duration::from_millis(10)).with_max_attempts(max_attempts)
}

fn state_of(err: &DbError) -> Option<&str> {
    err.sql_state().map(SqlState::as_str)
}

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_on_third_attempt() {
    let executor = RetryExecutor::new(fast_policy(3)).unwrap();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute(|| async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(DbError::new("40001", "restart transaction"))
            } else {
                Ok(42)
            }
        })
        .await;

    assert_eq!(result, Ok(42));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_makes_one_attempt() {
    let executor = RetryExecutor::<DbError>::default();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute_void(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(DbError::new("42601", "syntax error"))
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(state_of(&err), Some("42601"));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhausted_returns_final_error() {
    let executor = RetryExecutor::new(fast_policy(4)).unwrap();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute(|| async {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(DbError::new("08006", format!("connection reset on attempt {n}")))
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert_eq!(err.message(), "connection reset on attempt 4");
    assert_eq!(state_of(&err), Some("08006"));
}

#[tokio::test(start_paused = true)]
async fn test_retries_on_connection_error() {
    let executor = RetryExecutor::<DbError>::default();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute_void(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 1 {
                Err(DbError::new("08006", "connection error"))
            } else {
                Ok(())
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retries_on_admin_shutdown() {
    let executor = RetryExecutor::new(fast_policy(5)).unwrap();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(DbError::new("57P01", "terminating connection due to administrator command"))
            } else {
                Ok("done")
            }
        })
        .await;

    assert_eq!(result, Ok("done"));
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_missing_state_is_not_retried() {
    let executor = RetryExecutor::new(fast_policy(5)).unwrap();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(DbError::without_state("driver error"))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy_never_retries() {
    let executor = RetryExecutor::new(fast_policy(1)).unwrap();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute(|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(DbError::new("40001", "restart transaction"))
        })
        .await;

    assert_eq!(state_of(&result.unwrap_err()), Some("40001"));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_success_on_first_attempt_does_not_sleep() {
    let executor = RetryExecutor::new(fast_policy(5)).unwrap();
    let start = tokio::time::Instant::now();

    let result = executor.execute(|| async { Ok::<_, DbError>(7) }).await;

    assert_eq!(result, Ok(7));
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_timing() {
    let policy = fast_policy(5).with_jitter(0.0);
    let executor = RetryExecutor::new(policy).unwrap();
    let attempts = AtomicU32::new(0);
    let start = tokio::time::Instant::now();

    let _ = executor
        .execute(|| async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(DbError::new("40001", "retry"))
            } else {
                Ok("done")
            }
        })
        .await;
    let elapsed = start.elapsed();

    // 10ms + 20ms + 40ms
    assert!(
        elapsed >= Duration::from_millis(70) && elapsed < Duration::from_millis(80),
        "Expected about 70ms, got {:?}",
        elapsed
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_hook_sees_each_retry() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let policy = RetryPolicy::new(Duration::from_millis(100))
        .with_max_attempts(4)
        .with_jitter(0.5);
    let executor = RetryExecutor::new(policy.clone())
        .unwrap()
        .with_on_retry({
            let events = events.clone();
            move |event: &RetryEvent<'_, DbError>| {
                events.lock().unwrap().push((
                    event.attempt,
                    state_of(event.error).map(str::to_owned),
                    event.next_delay,
                ));
            }
        });

    let result = executor
        .execute(|| async { Err::<(), _>(DbError::new("40001", "conflict")) })
        .await;

    assert!(result.is_err());
    let events = events.lock().unwrap();
    // No hook call after the final attempt
    assert_eq!(events.len(), 3);
    for (i, (attempt, state, delay)) in events.iter().enumerate() {
        assert_eq!(*attempt, i as u32 + 1);
        assert_eq!(state.as_deref(), Some("40001"));
        let (low, high) = policy.delay_bounds(*attempt);
        assert!(*delay >= low && *delay <= high, "{delay:?} outside [{low:?}, {high:?}]");
    }
}

#[tokio::test(start_paused = true)]
async fn test_custom_classifier_skips_non_retryable_errors() {
    #[derive(Debug, PartialEq, Clone)]
    enum TestError {
        Transient,
        Permanent,
    }

    let policy = RetryPolicy::with_base_delay(Duration::from_millis(1))
        .with_classifier(|err: &TestError| matches!(err, TestError::Transient));
    let executor = RetryExecutor::new(policy).unwrap();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute(|| async {
            match attempts.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err::<(), _>(TestError::Transient),
                _ => Err(TestError::Permanent),
            }
        })
        .await;

    assert_eq!(result, Err(TestError::Permanent));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_stops_retrying() {
    let executor = RetryExecutor::<Error>::new(
        RetryPolicy::new(Duration::from_secs(60)).with_max_attempts(10),
    )
    .unwrap();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute_until(tokio::time::sleep(Duration::from_millis(5)), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::from(DbError::new("40001", "conflict")))
        })
        .await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_signal_from_another_task() {
    let executor = RetryExecutor::<Error>::new(
        RetryPolicy::new(Duration::from_secs(1)).with_max_attempts(10),
    )
    .unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let attempts = AtomicU32::new(0);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        let _ = tx.send(());
    });

    let cancel = async move {
        let _ = rx.await;
    };
    let result: Result<(), Error> = executor
        .execute_until(cancel, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(DbError::new("08003", "connection does not exist").into())
        })
        .await;

    assert!(result.unwrap_err().is_cancelled());
    // The first backoff is at least 500ms, so the signal lands inside it
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unfired_cancel_behaves_like_execute() {
    let executor = RetryExecutor::<Error>::new(
        RetryPolicy::new(Duration::from_millis(10)).with_max_attempts(3),
    )
    .unwrap();
    let attempts = AtomicU32::new(0);

    let result = executor
        .execute_until(std::future::pending::<()>(), || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::from(DbError::new("40001", "conflict")))
            } else {
                Ok(42)
            }
        })
        .await;

    assert_eq!(result, Ok(42));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shared_executor_across_tasks() {
    let executor = Arc::new(RetryExecutor::new(fast_policy(3)).unwrap());
    let mut handles = Vec::new();

    for task in 0..8u32 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            let attempts = AtomicU32::new(0);
            let value = executor
                .execute(|| async {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(DbError::new("40001", "conflict"))
                    } else {
                        Ok(task)
                    }
                })
                .await;
            (value, attempts.load(Ordering::SeqCst))
        }));
    }

    for (task, handle) in handles.into_iter().enumerate() {
        let (value, attempts) = handle.await.unwrap();
        assert_eq!(value, Ok(task as u32));
        assert_eq!(attempts, 2);
    }
}

#[test]
fn test_invalid_policy_is_rejected() {
    let result = RetryExecutor::new(fast_policy(3).with_backoff_multiplier(0.9));
    assert_eq!(
        result.map(|_| ()).unwrap_err(),
        PolicyError::InvalidMultiplier(0.9)
    );
}

#[test]
fn test_executor_is_debug_and_clone() {
    let executor = RetryExecutor::<DbError>::default().with_on_retry(|_| {});
    let cloned = executor.clone();
    let debug = format!("{:?}", cloned);
    assert!(debug.contains("RetryExecutor"));
    assert!(debug.contains("on_retry: true"));
    assert_eq!(cloned.policy().max_attempts(), 5);
}

#[cfg(feature = "tracing")]
mod logging {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_logs_backoff_and_exhaustion() {
        let executor = RetryExecutor::new(fast_policy(2)).unwrap();

        let _ = executor
            .execute(|| async { Err::<(), _>(DbError::new("40001", "conflict")) })
            .await;

        assert!(logs_contain("retryable failure, backing off"));
        assert!(logs_contain("retry attempts exhausted"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_logs_terminal_failure() {
        let executor = RetryExecutor::new(fast_policy(2)).unwrap();

        let _ = executor
            .execute(|| async { Err::<(), _>(DbError::new("23505", "duplicate key")) })
            .await;

        assert!(logs_contain("non-retryable error"));
        assert!(!logs_contain("backing off"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_logs_saturated_delay_without_truncation() {
        let executor = RetryExecutor::new(
            RetryPolicy::new(Duration::MAX)
                .with_max_attempts(2)
                .with_jitter(0.0),
        )
        .unwrap();

        let result = executor
            .execute_until(std::future::ready(()), || async {
                Err::<(), _>(Error::from(DbError::new("40001", "conflict")))
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert!(logs_contain("delay_ms=18446744073709551615"));
    }
}
