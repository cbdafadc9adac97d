use std::{future::Future, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;
use tracing::instrument;

use super::{RemoteTier, TierError, TierResult};

const SCAN_BATCH: usize = 500;

/// Redis-backed shared tier. Every call, connection checkout included, is
/// bounded by `op_timeout`.
#[derive(Clone)]
pub struct RedisTier {
    pool: Pool,
    op_timeout: Duration,
}

impl RedisTier {
    pub fn new(pool: Pool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    async fn bounded<T, F, Fut>(&self, op: F) -> TierResult<T>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = Result<T, redis::RedisError>>,
    {
        let call = async {
            let conn = self
                .pool
                .get()
                .await
                .map_err(|e| TierError::Unavailable(e.to_string()))?;
            op(conn)
                .await
                .map_err(|e| TierError::Unavailable(e.to_string()))
        };
        tokio::time::timeout(self.op_timeout, call)
            .await
            .map_err(|_| TierError::Timeout(self.op_timeout))?
    }
}

#[async_trait]
impl RemoteTier for RedisTier {
    #[instrument(skip(self), level = "trace")]
    async fn get(&self, key: &str) -> TierResult<Option<Bytes>> {
        self.bounded(|mut conn| {
            async move {
                let value: Option<Vec<u8>> = conn.get(key).await?;
                Ok(value.map(Bytes::from))
            }
        })
        .await
    }

    #[instrument(skip(self, value), level = "trace")]
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> TierResult<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        let millis = ttl.as_millis().max(1) as u64;
        self.bounded(|mut conn| {
            async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value.as_ref())
                    .arg("PX")
                    .arg(millis)
                    .query_async::<()>(&mut conn)
                    .await
            }
        })
        .await
    }

    #[instrument(skip(self), level = "trace")]
    async fn delete(&self, key: &str) -> TierResult<()> {
        self.bounded(|mut conn| {
            async move {
                let _removed: i64 = conn.del(key).await?;
                Ok(())
            }
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete_prefix(&self, prefix: &str) -> TierResult<u64> {
        let pattern = format!("{prefix}*");
        let mut cursor = 0_u64;
        let mut removed = 0_u64;
        loop {
            let (next, keys) = self
                .bounded(|mut conn| {
                    let pattern = pattern.clone();
                    async move {
                        redis::cmd("SCAN")
                            .arg(cursor)
                            .arg("MATCH")
                            .arg(pattern)
                            .arg("COUNT")
                            .arg(SCAN_BATCH)
                            .query_async::<(u64, Vec<String>)>(&mut conn)
                            .await
                    }
                })
                .await?;

            if !keys.is_empty() {
                removed += self
                    .bounded(|mut conn| {
                        async move { conn.del::<_, u64>(keys).await }
                    })
                    .await?;
            }

            if next == 0 {
                return Ok(removed);
            }
            cursor = next;
        }
    }
}
