//! Fire-and-forget execution of non-critical side effects.
//!
//! # Responsibilities
//! - Run a task on its own tokio task and return immediately
//! - Catch panics and errors so they are logged and never reach the caller
//! - Count in-flight tasks so shutdown can wait for them
//!
//! # Design Decisions
//! - No ordering between tasks
//! - The caller never learns the outcome

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Notify;

use crate::error::AppResult;
use crate::observability::metrics;

#[derive(Debug, Default)]
struct Inner {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Spawns background tasks and tracks how many are still running.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTaskRunner {
    inner: Arc<Inner>,
}

impl BackgroundTaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` and return without waiting for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        let guard = TaskGuard::new(self.inner.clone());

        tokio::spawn(async move {
            let _guard = guard;
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => {
                    tracing::debug!(task = name, "Background task finished");
                }
                Ok(Err(e)) => {
                    tracing::error!(task = name, error = %e, "Background task failed");
                    metrics::record_background_failure(name, "error");
                }
                Err(payload) => {
                    tracing::error!(
                        task = name,
                        panic = %panic_message(payload.as_ref()),
                        "Background task panicked"
                    );
                    metrics::record_background_failure(name, "panic");
                }
            }
        });
    }

    /// Number of tasks scheduled but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once no task is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the in-flight count when the task ends, however it ends.
struct TaskGuard {
    inner: Arc<Inner>,
}

impl TaskGuard {
    fn new(inner: Arc<Inner>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::AcqRel);
        Self { inner }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
