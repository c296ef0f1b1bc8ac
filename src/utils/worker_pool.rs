// src/utils/worker_pool.rs

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::AppError;

/// Bounded pool for heavy request work.
///
/// At most `size` jobs run at once; the rest wait for a permit. Every job,
/// including its wait for a permit, is cut off after `timeout`. A job that
/// is cut off is dropped, so an open transaction inside it rolls back.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl WorkerPool {
    pub fn new(size: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
            timeout,
        }
    }

    /// Runs an async job inside the pool.
    pub async fn run<F, T>(&self, job: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let permits = self.permits.clone();
        let guarded = async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| AppError::InternalServerError(e.to_string()))?;
            job.await
        };

        match tokio::time::timeout(self.timeout, guarded).await {
            Ok(result) => result,
            Err(_) => Err(AppError::InternalServerError(format!(
                "worker job timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    /// Runs a blocking closure on tokio's blocking threads, under the pool's
    /// concurrency limit and timeout.
    pub async fn run_blocking<F, T>(&self, job: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        self.run(async move {
            tokio::task::spawn_blocking(job)
                .await
                .map_err(|e| AppError::InternalServerError(format!("worker panicked: {}", e)))?
        })
        .await
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn returns_job_result() {
        let pool = WorkerPool::new(2, Duration::from_secs(1));
        let value = pool.run(async { Ok::<_, AppError>(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn times_out_slow_jobs() {
        let pool = WorkerPool::new(1, Duration::from_millis(20));
        let result = pool
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, AppError>(())
            })
            .await;
        assert!(matches!(result, Err(AppError::InternalServerError(_))));
        // The permit is released once the job is dropped.
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn never_exceeds_pool_size() {
        let pool = WorkerPool::new(2, Duration::from_secs(5));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                pool.run(async {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, AppError>(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn blocking_jobs_run_off_the_runtime() {
        let pool = WorkerPool::new(1, Duration::from_secs(1));
        let sum = pool
            .run_blocking(|| Ok::<_, AppError>((1..=10).sum::<i32>()))
            .await
            .unwrap();
        assert_eq!(sum, 55);
    }
}
