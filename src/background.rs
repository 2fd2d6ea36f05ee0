//! Detached background work: write-backs and stale refreshes.
//!
//! Tasks spawned here run on the Tokio runtime under their own lifetime. They
//! outlive the request that triggered them and are never cancelled by it. At
//! most `max_concurrent` run at once; the rest wait for a permit.
//!
//! A task's error has nowhere to go (its caller already has an answer), so it
//! is logged and dropped.

use crate::error::Result;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Keeps work counted as pending until dropped, however the work ends.
pub struct Pending {
    count: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for Pending {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Bounded spawner for fire-and-forget tasks.
#[derive(Clone)]
pub struct BackgroundTasks {
    permits: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl BackgroundTasks {
    pub fn new(max_concurrent: usize) -> Self {
        BackgroundTasks {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            pending: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Run `task` in the background. Failures are logged under `description`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, description: String, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let pending = self.track();
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let _pending = pending;
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Background {} dropped: task pool closed", description);
                    return;
                }
            };

            match task.await {
                Ok(()) => debug!("Background {} done", description),
                Err(e) => error!("Background {} failed: {}", description, e),
            }
        });
    }

    /// Count work running outside this pool as pending until the guard drops.
    ///
    /// [`wait_idle`](Self::wait_idle) waits for tracked work as well.
    pub fn track(&self) -> Pending {
        self.pending.fetch_add(1, Ordering::SeqCst);
        Pending {
            count: Arc::clone(&self.pending),
            idle: Arc::clone(&self.idle),
        }
    }

    /// Tasks spawned and not yet finished, queued ones included.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until no background task is pending.
    ///
    /// Tasks spawned while waiting are waited for too.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawned_tasks_complete() {
        let tasks = BackgroundTasks::new(4);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let done = Arc::clone(&done);
            tasks.spawn("count".to_string(), async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(())
            });
        }

        tasks.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_task_is_not_pending() {
        let tasks = BackgroundTasks::new(1);
        tasks.spawn("failing".to_string(), async {
            Err::<(), _>(Error::BackendError("store down".to_string()))
        });

        tasks.wait_idle().await;
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let tasks = BackgroundTasks::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tasks.spawn("bounded".to_string(), async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, Error>(())
            });
        }

        tasks.wait_idle().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_wait_idle_covers_tracked_work() {
        let tasks = BackgroundTasks::new(1);
        let guard = tasks.track();
        assert_eq!(tasks.pending(), 1);

        let released = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&released);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(1, Ordering::SeqCst);
            drop(guard);
        });

        tasks.wait_idle().await;
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_with_nothing_pending() {
        let tasks = BackgroundTasks::new(1);
        tasks.wait_idle().await;
    }
}
