use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Key-value store with per-key TTL holding task records, leases and interrupt flags.
///
/// Values are opaque strings. `ttl: None` stores without expiry. Expired keys behave
/// exactly like absent keys.
#[async_trait]
pub trait TaskStateStore: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// Returns `false` (and writes nothing) when the key already holds a live value.
    async fn put_if_absent(&self, key: &str, value: String, ttl: Option<Duration>)
        -> Result<bool>;

    /// Replace the value only if it still equals `expected`.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool>;

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;

    /// Remove and return the value; a second `take` sees nothing.
    async fn take(&self, key: &str) -> Result<Option<String>>;

    async fn delete(&self, key: &str) -> Result<bool>;

    /// Set a new TTL on a live key.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Live keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process store. Expiry runs on the tokio clock so tests can pause and advance it.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn live<'a>(entries: &'a HashMap<String, Entry>, key: &str) -> Option<&'a Entry> {
        entries.get(key).filter(|e| e.is_live(Instant::now()))
    }

    fn holds(entries: &HashMap<String, Entry>, key: &str, expected: &str) -> bool {
        Self::live(entries, key).is_some_and(|e| e.value == expected)
    }
}

#[async_trait]
impl TaskStateStore for MemoryKvStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(Self::live(&entries, key).map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if Self::live(&entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(true)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if !Self::holds(&entries, key, expected) {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if !Self::holds(&entries, key, expected) {
            return Ok(false);
        }
        entries.remove(key);
        Ok(true)
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        Ok(entries
            .remove(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        Ok(entries.remove(key).is_some_and(|e| e.is_live(now)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, e| e.is_live(now));
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
