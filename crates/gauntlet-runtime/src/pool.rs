//! Bounded worker pool
//!
//! Jobs are admitted one permit at a time, so at most `size` of them are ever
//! running. Results come back in submission order.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run every job to completion and return their results
    ///
    /// A job that panics is logged and left out of the results.
    pub async fn run_all<I, Fut, T>(&self, jobs: I) -> Vec<T>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut set = JoinSet::new();
        let mut submitted = 0usize;

        for (index, job) in jobs.into_iter().enumerate() {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            set.spawn(async move {
                let result = job.await;
                drop(permit);
                (index, result)
            });
            submitted += 1;
        }

        let mut slots: Vec<Option<T>> = (0..submitted).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!(error = %e, "Worker task failed"),
            }
        }
        slots.into_iter().flatten().collect()
    }
}
