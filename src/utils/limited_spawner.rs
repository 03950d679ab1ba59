use std::future::Future;
use std::sync::Arc;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Spawns tasks while holding at most `max_concurrent` admission permits.
///
/// A permit is taken before the task is spawned and dropped when the task
/// ends, whichever way it ends. Every spawned task is tracked so `join` can
/// wait for all of them, including tasks spawned while `join` is waiting.
pub struct LimitedSpawner {
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl LimitedSpawner {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            tracker: TaskTracker::new(),
        }
    }

    pub async fn spawn<F>(&self, f: F) -> Result<JoinHandle<F::Output>, AcquireError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let permit = semaphore.acquire_owned().await?;
        let handle = self.tracker.spawn(async move {
            let _permit = permit;
            f.await
        });
        Ok(handle)
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Tasks spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every spawned task has finished.
    pub async fn join(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
