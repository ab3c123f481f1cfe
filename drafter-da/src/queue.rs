//! Bounded concurrency task queue
//!
//! **[DA-QUE-010]** FIFO admission-controlled executor used to throttle
//! expensive parse/analysis work. At most `concurrency` tasks run at once;
//! waiters are granted slots in arrival order (tokio's Semaphore is fair).
//!
//! **[DA-QUE-020]** Each dispatched task races a fixed wall-clock timeout.
//! The task body is spawned, so on timeout the caller gets a TIMEOUT error
//! immediately while the task's own cleanup still runs to completion; the
//! task's CancellationToken is cancelled so any in-flight external call it
//! started can abort instead of running unobserved.
//!
//! **[DA-QUE-030]** A task failure is isolated: it releases its slot and
//! the backlog continues normally.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// FIFO task queue with a fixed concurrency limit and per-task timeout
#[derive(Debug, Clone)]
pub struct TaskQueue {
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    running: Arc<AtomicUsize>,
}

/// Decrements the running gauge even if the task body panics
struct RunningGuard(Arc<AtomicUsize>);

impl RunningGuard {
    fn enter(gauge: Arc<AtomicUsize>) -> Self {
        gauge.fetch_add(1, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskQueue {
    /// Create a queue with `{concurrency, timeout}`
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout,
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of tasks currently in the running state
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Configured per-task timeout
    pub fn task_timeout(&self) -> Duration {
        self.timeout
    }

    /// Submit a task and wait for its result
    ///
    /// `make` receives the task's CancellationToken and returns the task
    /// future. Admission is FIFO; the timeout clock starts at dispatch, not
    /// at submission.
    pub async fn submit<F, Fut, T>(&self, make: F) -> Result<T, ApiError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::Internal("task queue closed".to_string()))?;

        let token = CancellationToken::new();
        let task = make(token.clone());
        let gauge = self.running.clone();

        // Spawned so the task settles (and releases its temp resources)
        // even when the caller stops waiting at the timeout.
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let _guard = RunningGuard::enter(gauge);
            task.await
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ApiError::Internal(format!(
                "analysis task aborted: {}",
                join_err
            ))),
            Err(_) => {
                // Signal the abandoned task so its external calls stop.
                token.cancel();
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Queued task exceeded its window"
                );
                Err(ApiError::Timeout(self.timeout.as_secs()))
            }
        }
    }
}
