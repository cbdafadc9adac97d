use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use moka::{Expiry, future::Cache};
use tokio::time::Instant;

#[derive(Clone)]
struct LocalEntry {
    payload: Bytes,
    ttl: Duration,
    expires_at: Instant,
}

/// Lets moka evict each entry on its own TTL instead of a cache-wide one.
struct PerEntryExpiry;

impl Expiry<String, LocalEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self, _key: &String, value: &LocalEntry, _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self, _key: &String, value: &LocalEntry, _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-local tier (L1).
///
/// Expiry is checked against `tokio::time::Instant` on every read, so paused
/// test clocks observe the same TTL semantics as wall time.
#[derive(Clone)]
pub struct LocalTier {
    memory: Cache<String, LocalEntry>,
}

impl LocalTier {
    pub fn new(capacity: u64) -> Self {
        let memory = Cache::builder()
            .max_capacity(capacity)
            .expire_after(PerEntryExpiry)
            .support_invalidation_closures()
            .build();
        Self { memory }
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let entry = self.memory.get(key).await?;
        if entry.expires_at <= Instant::now() {
            self.memory.invalidate(key).await;
            return None;
        }
        Some(entry.payload)
    }

    pub async fn insert(&self, key: &str, payload: Bytes, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let entry = LocalEntry {
            payload,
            ttl,
            expires_at: Instant::now() + ttl,
        };
        self.memory.insert(key.to_owned(), entry).await;
    }

    pub async fn remove(&self, key: &str) { self.memory.invalidate(key).await; }

    pub fn remove_prefix(&self, prefix: &str) {
        let prefix: Arc<str> = prefix.into();
        if let Err(e) = self
            .memory
            .invalidate_entries_if(move |key, _| key.starts_with(&*prefix))
        {
            tracing::warn!("L1 prefix invalidation rejected: {e}");
        }
    }

    pub async fn contains(&self, key: &str) -> bool { self.get(key).await.is_some() }

    pub fn entry_count(&self) -> u64 { self.memory.entry_count() }
}
