use crate::error::Result;
use crate::keys;
use crate::store::TaskStateStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Exclusive, time-bounded right to execute one task.
#[derive(Clone)]
pub struct Lease {
    store: Arc<dyn TaskStateStore>,
    task_id: String,
    holder: String,
    ttl: Duration,
}

impl Lease {
    /// `None` when another holder owns a live lease on the task.
    pub async fn acquire(
        store: Arc<dyn TaskStateStore>,
        task_id: &str,
        ttl: Duration,
    ) -> Result<Option<Self>> {
        let holder = uuid::Uuid::new_v4().to_string();
        if !store
            .put_if_absent(&keys::lease(task_id), holder.clone(), Some(ttl))
            .await?
        {
            return Ok(None);
        }
        log::debug!("lease on task {task_id} acquired by {holder}");
        Ok(Some(Self {
            store,
            task_id: task_id.to_string(),
            holder,
            ttl,
        }))
    }

    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    #[must_use]
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Extend the TTL; `false` once the lease expired or passed to someone else.
    pub async fn renew(&self) -> Result<bool> {
        self.store
            .compare_and_set(
                &keys::lease(&self.task_id),
                &self.holder,
                self.holder.clone(),
                Some(self.ttl),
            )
            .await
    }

    /// Drop the lease if this holder still owns it.
    pub async fn release(&self) -> Result<bool> {
        self.store
            .compare_and_delete(&keys::lease(&self.task_id), &self.holder)
            .await
    }

    /// Renew every `interval` until stopped or the lease is lost.
    #[must_use]
    pub fn spawn_heartbeat(&self, interval: Duration) -> Heartbeat {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let lost = Arc::new(AtomicBool::new(false));
        let lease = self.clone();
        let lost_flag = lost.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                match lease.renew().await {
                    Ok(true) => {}
                    Ok(false) => {
                        log::warn!(
                            "lease on task {} lost; another runner or the reaper owns it",
                            lease.task_id
                        );
                        lost_flag.store(true, Ordering::SeqCst);
                        break;
                    }
                    Err(err) => {
                        log::warn!("lease renewal for task {} failed: {err}", lease.task_id);
                    }
                }
            }
        });

        Heartbeat {
            stop: stop_tx,
            lost,
            handle,
        }
    }
}

/// Background lease renewal.
pub struct Heartbeat {
    stop: watch::Sender<bool>,
    lost: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    /// Stop renewing; returns whether the lease was lost while running.
    pub async fn stop(self) -> bool {
        let _ = self.stop.send(true);
        if let Err(err) = self.handle.await {
            log::warn!("lease heartbeat task ended abnormally: {err}");
        }
        self.lost.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;

    fn store() -> Arc<dyn TaskStateStore> {
        Arc::new(MemoryKvStore::new())
    }

    #[tokio::test]
    async fn second_acquire_is_refused() {
        let store = store();
        let ttl = Duration::from_secs(5);
        let first = Lease::acquire(store.clone(), "t-1", ttl).await.unwrap();
        assert!(first.is_some());
        assert!(Lease::acquire(store.clone(), "t-1", ttl)
            .await
            .unwrap()
            .is_none());
        assert!(Lease::acquire(store, "t-2", ttl).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn unrenewed_lease_expires() {
        let store = store();
        let ttl = Duration::from_millis(100);
        let lease = Lease::acquire(store.clone(), "t-1", ttl)
            .await
            .unwrap()
            .unwrap();

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(!lease.renew().await.unwrap());
        let usurper = Lease::acquire(store, "t-1", ttl).await.unwrap();
        assert!(usurper.is_some());
        assert!(!lease.release().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_keeps_lease_alive() {
        let store = store();
        let ttl = Duration::from_millis(100);
        let lease = Lease::acquire(store.clone(), "t-1", ttl)
            .await
            .unwrap()
            .unwrap();
        let heartbeat = lease.spawn_heartbeat(Duration::from_millis(30));

        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(Lease::acquire(store.clone(), "t-1", ttl)
            .await
            .unwrap()
            .is_none());
        assert!(!heartbeat.stop().await);
        assert!(lease.release().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_reports_a_stolen_lease() {
        let store = store();
        let ttl = Duration::from_millis(100);
        let lease = Lease::acquire(store.clone(), "t-1", ttl)
            .await
            .unwrap()
            .unwrap();
        let heartbeat = lease.spawn_heartbeat(Duration::from_millis(30));

        store
            .put(&keys::lease("t-1"), "someone-else".to_string(), Some(ttl))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(heartbeat.is_lost());
        assert!(heartbeat.stop().await);
    }
}
