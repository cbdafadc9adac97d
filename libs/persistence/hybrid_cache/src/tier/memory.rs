use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{RemoteTier, TierResult};

/// In-process stand-in for a shared tier.
///
/// Several engines built over the same `Arc<MemoryRemote>` behave like
/// service instances sharing one Redis, which is how single-node deployments
/// and tests run without a network dependency.
#[derive(Default)]
pub struct MemoryRemote {
    entries: DashMap<String, (Bytes, Instant)>,
}

impl MemoryRemote {
    pub fn new() -> Self { Self::default() }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.1 > Instant::now())
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

#[async_trait]
impl RemoteTier for MemoryRemote {
    async fn get(&self, key: &str) -> TierResult<Option<Bytes>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.1 > now => return Ok(Some(entry.0.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.1 <= now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> TierResult<()> {
        if !ttl.is_zero() {
            self.entries
                .insert(key.to_owned(), (value, Instant::now() + ttl));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> TierResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> TierResult<u64> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - self.entries.len()) as u64)
    }
}
