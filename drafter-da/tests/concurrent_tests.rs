//! Task Queue Concurrency Tests
//! Test File: concurrent_tests.rs
//! Requirements: DA-QUE-010 (Bounded Concurrency), DA-QUE-020 (Timeout), DA-QUE-030 (Isolation)

use drafter_da::queue::TaskQueue;
use drafter_da::ApiError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// TC-QUE-001: At most N tasks run concurrently
/// **Requirement:** DA-QUE-010 | **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_que_001_concurrency_bound() {
    const LIMIT: usize = 2;
    const TASKS: usize = 8;

    let queue = TaskQueue::new(LIMIT, Duration::from_secs(10));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..TASKS {
        let queue = queue.clone();
        let running = running.clone();
        let peak = peak.clone();
        handles.push(tokio::spawn(async move {
            queue
                .submit(move |_cancel| async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<usize, ApiError>(i)
                })
                .await
        }));
    }

    let mut completed = 0;
    for handle in handles {
        let result = handle.await.expect("task panicked");
        assert!(result.is_ok());
        completed += 1;
    }

    // All tasks settled, never more than LIMIT at once
    assert_eq!(completed, TASKS);
    assert!(
        peak.load(Ordering::SeqCst) <= LIMIT,
        "observed {} concurrent tasks, limit is {}",
        peak.load(Ordering::SeqCst),
        LIMIT
    );
    assert_eq!(running.load(Ordering::SeqCst), 0);
    assert_eq!(queue.running(), 0);
}

/// TC-QUE-002: A failing task releases its slot
/// **Requirement:** DA-QUE-030 | **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_que_002_failure_releases_slot() {
    let queue = TaskQueue::new(1, Duration::from_secs(5));

    let failed: Result<(), _> = queue
        .submit(|_cancel| async { Err(ApiError::FileProcessing("broken upload".to_string())) })
        .await;
    assert!(matches!(failed, Err(ApiError::FileProcessing(_))));

    // The single slot must be free again for the next task
    let ok = queue.submit(|_cancel| async { Ok::<_, ApiError>(7) }).await;
    assert_eq!(ok.unwrap(), 7);
    assert_eq!(queue.running(), 0);
}

/// TC-QUE-003: Timeout yields TIMEOUT and cancels the task
/// **Requirement:** DA-QUE-020 | **Type:** Integration | **Priority:** P0
#[tokio::test]
async fn tc_que_003_timeout_cancels_task() {
    let queue = TaskQueue::new(1, Duration::from_millis(50));
    let cancelled = Arc::new(AtomicUsize::new(0));

    let seen = cancelled.clone();
    let result: Result<(), _> = queue
        .submit(move |cancel| async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err(ApiError::Internal("cancelled".to_string()))
                }
                _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(()),
            }
        })
        .await;

    assert!(matches!(result, Err(ApiError::Timeout(_))));

    // Give the spawned task a beat to observe the cancellation
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    assert_eq!(queue.running(), 0);

    // Slot is reusable after a timeout
    let ok = queue.submit(|_cancel| async { Ok::<_, ApiError>(1) }).await;
    assert!(ok.is_ok());
}

/// TC-QUE-004: Waiting tasks are admitted in arrival order
/// **Requirement:** DA-QUE-010 | **Type:** Integration | **Priority:** P1
#[tokio::test]
async fn tc_que_004_fifo_admission() {
    let queue = TaskQueue::new(1, Duration::from_secs(10));
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..4usize {
        let queue = queue.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            queue
                .submit(move |_cancel| async move {
                    order.lock().unwrap().push(i);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok::<(), ApiError>(())
                })
                .await
        }));
        // Stagger submissions so arrival order is deterministic
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    for handle in handles {
        handle.await.expect("task panicked").expect("task failed");
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}
