//! Hub housekeeping tasks
//!
//! Periodic work (the expiry sweeper) runs under one shared shutdown token.
//! A task that panics or returns before shutdown is logged, never propagated;
//! [`BackgroundTasks::shutdown`] cancels the token and joins every task.
//!
//! Feed listeners are not registered here: each owns its handle and is
//! stopped by whoever started it.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Housekeeping tasks sharing one shutdown token
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// let sweeper = ExpirySweeper::new(store, machine, clock, interval, tasks.shutdown_token());
/// tasks.spawn("expiry_sweeper", sweeper.run());
/// tasks.shutdown().await;
/// ```
pub struct BackgroundTasks {
    running: Vec<(&'static str, JoinHandle<()>)>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            running: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token every task must watch
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(()) if shutdown.is_cancelled() => {}
                Ok(()) => tracing::warn!(task = name, "Housekeeping task exited before shutdown"),
                Err(payload) => tracing::error!(
                    task = name,
                    panic = panic_message(payload.as_ref()),
                    "Housekeeping task panicked"
                ),
            }
        });
        tracing::debug!(task = name, "Housekeeping task started");
        self.running.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Cancel the shared token and wait for every task
    pub async fn shutdown(self) {
        tracing::info!(count = self.running.len(), "Stopping housekeeping tasks");
        self.shutdown.cancel();
        for (name, handle) in self.running {
            if let Err(e) = handle.await {
                tracing::error!(task = name, error = %e, "Housekeeping task failed to join");
            }
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_panic_message() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(text.as_ref()), "boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_panic_is_contained_and_shutdown_joins_rest() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("boom", async { panic!("boom") });

        let stopped = Arc::new(AtomicBool::new(false));
        let token = tasks.shutdown_token();
        let flag = stopped.clone();
        tasks.spawn("waiter", async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(tasks.len(), 2);

        tokio::time::timeout(Duration::from_secs(1), tasks.shutdown())
            .await
            .unwrap();
        assert!(stopped.load(Ordering::SeqCst));
    }
}
