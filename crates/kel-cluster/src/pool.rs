use std::future::Future;
use std::sync::Arc;

use async_lock::Semaphore;
use futures_util::future::join_all;
use once_cell::sync::Lazy;

/// Worker count used when the settings do not name one
pub(crate) static DEFAULT_MAX_WORKERS: Lazy<usize> = Lazy::new(|| {
    let var_value = std::env::var("KEL_CLUSTER_MAX_WORKERS").unwrap_or_default();
    var_value.parse().unwrap_or(8)
});

/// Bounded pool shared by every step of one orchestration run
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(*DEFAULT_MAX_WORKERS)
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run one task once a worker is free
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.permits.acquire().await;
        task.await
    }

    /// Submit every task, then wait for all of them.
    ///
    /// No task is abandoned when another fails. Once all have finished the
    /// first error in submission order is returned.
    pub async fn run_all<I, F, T, E>(&self, tasks: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
    {
        let results = join_all(tasks.into_iter().map(|task| self.run(task))).await;
        results.into_iter().collect()
    }
}
