//! Worker pool budget shared by the tasks of one run

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Handle on the run's concurrency budget.
///
/// Every task holds one permit while it runs. A task that has to wait on
/// something outside the pool (an operator prompt) can [`suspend`] to hand
/// its slot to other tasks for the duration of that wait.
///
/// [`suspend`]: ConcurrencyLimit::suspend
#[derive(Debug, Clone)]
pub struct ConcurrencyLimit {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimit {
    /// Budget of `permits` concurrent tasks (at least one)
    pub fn new(permits: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits.max(1))),
        }
    }

    /// Limit that never blocks, for work driven outside a runner
    pub fn unbounded() -> Self {
        Self::new(Semaphore::MAX_PERMITS)
    }

    pub(crate) async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }

    /// Run `fut` without counting against the budget.
    ///
    /// The caller keeps its own permit; an extra permit is lent out while
    /// `fut` runs and taken back afterwards, waiting if every slot is busy.
    pub async fn suspend<F, T>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        self.semaphore.add_permits(1);
        let output = fut.await;
        if let Ok(permit) = self.semaphore.acquire().await {
            permit.forget();
        }
        output
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
