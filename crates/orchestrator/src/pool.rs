use crate::error::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const MAX_WORKER_POOL_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub limit: usize,
    pub in_flight: usize,
    pub waiters: usize,
}

#[derive(Default)]
struct PoolCounters {
    in_flight: AtomicUsize,
    waiters: AtomicUsize,
}

/// Bounded pool of task runners.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    limit: usize,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_WORKER_POOL_SIZE);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            counters: Arc::new(PoolCounters::default()),
        }
    }

    pub async fn acquire(&self) -> Result<WorkerPermit> {
        let waiter = WaiterGuard::new(self.counters.clone());
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| OrchestratorError::PoolClosed)?;
        drop(waiter);
        self.counters.in_flight.fetch_add(1, Ordering::Relaxed);
        Ok(WorkerPermit {
            _permit: permit,
            counters: self.counters.clone(),
        })
    }

    /// Stop admitting work; queued acquisitions fail with `PoolClosed`.
    pub fn close(&self) {
        self.semaphore.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            limit: self.limit,
            in_flight: self.counters.in_flight.load(Ordering::Relaxed),
            waiters: self.counters.waiters.load(Ordering::Relaxed),
        }
    }
}

pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<PoolCounters>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

struct WaiterGuard(Arc<PoolCounters>);

impl WaiterGuard {
    fn new(counters: Arc<PoolCounters>) -> Self {
        counters.waiters.fetch_add(1, Ordering::Relaxed);
        Self(counters)
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.waiters.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(WorkerPool::new(0).snapshot().limit, 1);
        assert_eq!(WorkerPool::new(500).snapshot().limit, MAX_WORKER_POOL_SIZE);
    }

    #[tokio::test]
    async fn snapshot_tracks_in_flight_and_waiters() {
        let pool = WorkerPool::new(1);
        let first = pool.acquire().await.unwrap();
        assert_eq!(
            pool.snapshot(),
            PoolSnapshot {
                limit: 1,
                in_flight: 1,
                waiters: 0
            }
        );

        let queued = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };
        while pool.snapshot().waiters == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(pool.snapshot().waiters, 1);

        drop(first);
        queued.await.unwrap().unwrap();
        assert_eq!(pool.snapshot().in_flight, 0);
        assert_eq!(pool.snapshot().waiters, 0);
    }

    #[tokio::test]
    async fn closed_pool_refuses_work() {
        let pool = WorkerPool::new(2);
        pool.close();
        assert!(matches!(
            pool.acquire().await,
            Err(OrchestratorError::PoolClosed)
        ));
    }
}
