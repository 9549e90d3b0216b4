//! Serializer integration tests
//!
//! Exercises the public executor API under real concurrency: ordering,
//! outcome delivery, and what happens to pending work when the scope ends.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{gated_task, init_test_logging, wait_for_handoffs};
use safe_action::error::{Error, SubmitError};
use safe_action::executor::{Scope, Serializer, SerializerConfig};
use tokio_test::{assert_err, assert_ok};

fn config(queue_capacity: usize) -> SerializerConfig {
    SerializerConfig { queue_capacity }
}

/// Read-modify-write with a deliberate gap, torn if two ever overlapped
fn slow_increment(counter: &mut u64, _: ()) -> Result<u64, String> {
    let seen = *counter;
    std::thread::yield_now();
    *counter = seen + 1;
    Ok(*counter)
}

// ─────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sync_submissions_are_serial() {
    init_test_logging();
    let scope = Scope::new();
    let (serializer, handle) = Serializer::spawn(0u64, scope.clone(), config(4));

    let callers: Vec<_> = (0..100)
        .map(|_| {
            let serializer = serializer.clone();
            tokio::spawn(async move { serializer.submit_sync(slow_increment, ()).await })
        })
        .collect();

    let mut seen = Vec::new();
    for caller in callers {
        seen.push(assert_ok!(caller.await.unwrap()));
    }
    seen.sort_unstable();
    assert_eq!(seen, (1..=100).collect::<Vec<u64>>());

    scope.cancel();
    assert_eq!(handle.join().await.unwrap(), 100);
    assert_eq!(serializer.stats().completed, 100);
}

#[tokio::test]
async fn test_result_and_failure_are_returned_verbatim() {
    let scope = Scope::new();
    let (serializer, _handle) = Serializer::spawn(Vec::<String>::new(), scope.clone(), config(1));

    let echo = |log: &mut Vec<String>, word: String| -> Result<String, String> {
        log.push(word.clone());
        Ok(word)
    };
    assert_eq!(serializer.submit_sync(echo, "hello".to_string()).await, Ok("hello".to_string()));

    let refuse = |_: &mut Vec<String>, word: String| -> Result<String, String> {
        Err(format!("refused {}", word))
    };
    let err = assert_err!(serializer.submit_sync(refuse, "bye".to_string()).await);
    assert!(err.is_task_failure());
    assert_eq!(err.task_error().map(String::as_str), Some("refused bye"));

    scope.cancel();
}

#[tokio::test]
async fn test_crate_errors_convert_through_question_mark() {
    async fn add_checked(serializer: &Serializer<u32>, n: u32) -> safe_action::Result<u32> {
        let total = serializer
            .submit_sync(
                |total: &mut u32, n: u32| -> safe_action::Result<u32> {
                    *total = total
                        .checked_add(n)
                        .ok_or_else(|| Error::task_failed("overflow"))?;
                    Ok(*total)
                },
                n,
            )
            .await?;
        Ok(total)
    }

    let scope = Scope::new();
    let (serializer, _handle) = Serializer::spawn(u32::MAX - 1, scope.clone(), config(2));

    assert_eq!(add_checked(&serializer, 1).await.unwrap(), u32::MAX);
    let err = add_checked(&serializer, 1).await.unwrap_err();
    assert!(matches!(err, Error::TaskFailed { .. }));

    scope.cancel();
    let err = add_checked(&serializer, 1).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_submissions_run_in_order_when_queue_has_room() {
    let scope = Scope::new();
    let (serializer, handle) = Serializer::spawn(Vec::new(), scope.clone(), config(64));

    for n in 0..50u32 {
        serializer.submit_async(|log: &mut Vec<u32>, n: u32| -> Result<(), String> {
            log.push(n);
            Ok(())
        }, n);
    }
    // Queued behind every asynchronous submission above.
    let len = serializer
        .submit_sync(|log: &mut Vec<u32>, _: ()| -> Result<usize, String> { Ok(log.len()) }, ())
        .await;
    assert_eq!(len, Ok(50));

    scope.cancel();
    assert_eq!(handle.join().await.unwrap(), (0..50).collect::<Vec<u32>>());
}

// ─────────────────────────────────────────────────────────────────
// Scope end
// ─────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiting_sync_submissions_are_cancelled() {
    init_test_logging();
    let scope = Scope::new();
    let (serializer, handle) = Serializer::spawn((), scope.clone(), config(16));

    let (blocker, mut gate) = gated_task::<()>();
    serializer.submit_async(blocker, ());
    gate.wait_started().await;

    // Some of these sit in the channel, the rest wait for room.
    let waiting: Vec<_> = (0..100)
        .map(|_| {
            let serializer = serializer.clone();
            tokio::spawn(async move {
                serializer
                    .submit_sync(|_: &mut (), _: ()| -> Result<(), String> { Ok(()) }, ())
                    .await
            })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    scope.cancel();
    gate.release();

    let outcomes = tokio::time::timeout(Duration::from_secs(5), futures_util::future::join_all(waiting))
        .await
        .expect("a synchronous caller stayed blocked after scope end");
    for outcome in outcomes {
        assert_eq!(outcome.unwrap(), Err(SubmitError::Cancelled));
    }

    handle.join().await.unwrap();
    let stats = serializer.stats();
    assert_eq!(stats.cancelled, 100);
    assert_eq!(stats.completed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_submissions_never_run_after_scope_end() {
    let scope = Scope::new();
    let (serializer, handle) = Serializer::spawn((), scope.clone(), config(4));
    let executed = Arc::new(AtomicUsize::new(0));

    let (blocker, mut gate) = gated_task::<()>();
    serializer.submit_async(blocker, ());
    gate.wait_started().await;

    // The first few are buffered, the rest are handed to helpers.
    for _ in 0..50 {
        let executed = Arc::clone(&executed);
        serializer.submit_async(
            move |_: &mut (), _: ()| -> Result<(), String> {
                executed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            (),
        );
    }
    assert!(serializer.pending_handoffs() > 0);

    scope.cancel();
    gate.release();
    handle.join().await.unwrap();
    wait_for_handoffs(&serializer).await;

    // Submitted after the end: dropped on the spot.
    serializer.submit_async(|_: &mut (), _: ()| -> Result<(), String> { panic!("must not run") }, ());

    assert_eq!(executed.load(Ordering::SeqCst), 0);
    assert_eq!(serializer.pending_handoffs(), 0);
    assert_eq!(serializer.stats().dropped, 51);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_sync_senders_racing_scope_end_always_resolve() {
    for round in 0..200 {
        let scope = Scope::new();
        let (serializer, handle) = Serializer::spawn(0u64, scope.clone(), config(1));

        let callers: Vec<_> = (0..16)
            .map(|_| {
                let serializer = serializer.clone();
                tokio::spawn(async move { serializer.submit_sync(slow_increment, ()).await })
            })
            .collect();
        tokio::task::yield_now().await;
        scope.cancel();

        let outcomes = tokio::time::timeout(Duration::from_secs(5), futures_util::future::join_all(callers))
            .await
            .unwrap_or_else(|_| panic!("round {}: a synchronous caller never resolved", round));

        let mut completed = 0u64;
        for outcome in outcomes {
            match outcome.unwrap() {
                Ok(_) => completed += 1,
                Err(e) => assert_eq!(e, SubmitError::Cancelled),
            }
        }
        assert_eq!(handle.join().await.unwrap(), completed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_running_task_finishes_after_scope_end() {
    let scope = Scope::new();
    let (serializer, handle) = Serializer::spawn((), scope.clone(), config(1));

    let (blocker, mut gate) = gated_task::<()>();
    let caller = {
        let serializer = serializer.clone();
        tokio::spawn(async move { serializer.submit_sync(blocker, ()).await })
    };
    gate.wait_started().await;

    scope.cancel();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!caller.is_finished());

    gate.release();
    assert_eq!(caller.await.unwrap(), Ok(()));
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_loop_stops_promptly_when_idle() {
    let scope = Scope::new();
    let (serializer, handle) = Serializer::spawn(String::from("state"), scope.clone(), config(1));
    assert!(!handle.is_finished());

    scope.cancel();
    let state = tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .expect("loop ignored scope end")
        .unwrap();
    assert_eq!(state, "state");
    assert!(serializer.scope().is_cancelled());
}
