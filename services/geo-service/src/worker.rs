//! Bounded pool for blocking work.
//!
//! Reads, warps and encodes run on tokio's blocking threads. A semaphore
//! caps how many run at once; further jobs wait for a permit.

use geo_common::{ProcessError, ProcessResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `job` on a blocking thread once a permit is free.
    pub async fn run<F, T>(&self, job: F) -> ProcessResult<T>
    where
        F: FnOnce() -> ProcessResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ProcessError::internal("worker pool is closed"))?;

        let in_flight = Arc::clone(&self.in_flight);
        let current = in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::Relaxed);

        let result = tokio::task::spawn_blocking(move || {
            let result = job();
            in_flight.fetch_sub(1, Ordering::Relaxed);
            drop(permit);
            result
        })
        .await;

        match result {
            Ok(result) => result,
            Err(join) => {
                // The job panicked before decrementing
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
                Err(ProcessError::internal(format!("worker task failed: {}", join)))
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    /// Refuse new jobs. Running jobs finish.
    pub fn close(&self) {
        self.semaphore.close();
    }
}
