use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

pub mod breaker;
pub mod local;
pub mod memory;
pub mod redis;

pub use breaker::{CircuitBreaker, guarded};
pub use local::LocalTier;
pub use memory::MemoryRemote;
pub use redis::RedisTier;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TierError {
    #[error("Tier unavailable: {0}")]
    Unavailable(String),
    #[error("Tier operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Tier short-circuited until the cool-down ends")]
    CircuitOpen,
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

pub type TierResult<T> = Result<T, TierError>;

/// Shared, network-reachable key/value tier (L2).
///
/// Implementations must fail fast when the backing service is down rather
/// than hang the caller.
#[async_trait]
pub trait RemoteTier: Send + Sync {
    async fn get(&self, key: &str) -> TierResult<Option<Bytes>>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> TierResult<()>;

    async fn delete(&self, key: &str) -> TierResult<()>;

    /// Removes every key starting with `prefix`, returning how many went.
    async fn delete_prefix(&self, _prefix: &str) -> TierResult<u64> {
        Err(TierError::Unsupported("prefix deletion"))
    }
}

#[async_trait]
impl<R> RemoteTier for Arc<R>
where
    R: RemoteTier + ?Sized,
{
    async fn get(&self, key: &str) -> TierResult<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> TierResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> TierResult<()> { (**self).delete(key).await }

    async fn delete_prefix(&self, prefix: &str) -> TierResult<u64> {
        (**self).delete_prefix(prefix).await
    }
}
