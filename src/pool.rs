//! Bounded worker pool for CPU-bound compositing.
//!
//! Resampling never yields, so it must not run on the async runtime's
//! threads. Jobs go to a fixed-size rayon pool and the result comes back
//! through a oneshot channel the request handler awaits.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Cheaply cloneable handle to a fixed-size thread pool.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Create a pool with `threads` workers. Zero means one per CPU.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Worker`] if the threads cannot be spawned.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("afdicon-worker-{i}"))
            .panic_handler(|payload| {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(panic = %msg, "compositing job panicked");
            })
            .build()
            .map_err(|e| Error::Worker(e.to_string()))?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on the pool and await its result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Worker`] if the job panicked before sending a result.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            // The receiver may be gone if the client disconnected.
            let _ = tx.send(job());
        });
        rx.await
            .map_err(|_| Error::Worker("job ended without a result".to_string()))
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}
