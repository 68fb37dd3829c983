use crate::error::Result;
use crate::keys;
use crate::store::TaskStateStore;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cooperative cancellation request, stored with a short TTL and consumed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptSignal {
    pub reason: String,
    pub requested_at_ms: u64,
}

pub async fn request(
    store: &dyn TaskStateStore,
    task_id: &str,
    signal: &InterruptSignal,
    ttl: Duration,
) -> Result<()> {
    let raw = serde_json::to_string(signal)?;
    store.put(&keys::interrupt(task_id), raw, Some(ttl)).await
}

/// Consume a pending signal; later calls see `None` until a new request arrives.
pub async fn take(store: &dyn TaskStateStore, task_id: &str) -> Result<Option<InterruptSignal>> {
    match store.take(&keys::interrupt(task_id)).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}
