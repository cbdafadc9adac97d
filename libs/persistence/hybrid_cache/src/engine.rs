use std::{future::Future, panic::resume_unwind, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::future::join_all;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use crate::{
    codec::Codec,
    config::{CacheConfig, CacheConfigError},
    flight::{FlightRegistry, Landing, Slot, land},
    invalidation::{InvalidationEvent, InvalidationPolicy},
    key::{CacheKey, EntityKind, KeyBuilder},
    tier::{LocalTier, RemoteTier, TierError},
    ttl::TtlPolicy,
};

struct Tiers {
    local: LocalTier,
    remote: Option<Arc<dyn RemoteTier>>,
    flights: FlightRegistry,
}

struct Snapshot {
    config: CacheConfig,
    keys: KeyBuilder,
    ttl: TtlPolicy,
    policy: InvalidationPolicy,
    codec: Codec,
}

impl Snapshot {
    fn build(config: CacheConfig) -> Result<Self, CacheConfigError> {
        config.validate()?;
        let keys = KeyBuilder::new(config.version.clone(), config.max_key_length)
            .map_err(|_| CacheConfigError::Version(config.version.clone()))?;
        Ok(Self {
            ttl: TtlPolicy::new(config.ttl.clone()),
            policy: InvalidationPolicy::new(keys.clone(), config.max_cached_pages),
            codec: Codec::new(config.serialization),
            keys,
            config,
        })
    }
}

/// Keys and tiers a removal could not reach.
#[derive(Debug, Default)]
pub struct RemovalReport {
    pub attempted: usize,
    pub failures: Vec<(String, TierError)>,
}

impl RemovalReport {
    pub fn is_clean(&self) -> bool { self.failures.is_empty() }
}

/// Where a key currently has a live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub in_local: bool,
    pub in_remote: bool,
}

/// Two-tier read-through cache: a process-local L1 in front of an optional
/// shared L2, with per-key single-flight loading.
///
/// Clones share tiers and the in-flight registry.
#[derive(Clone)]
pub struct HybridCache {
    tiers: Arc<Tiers>,
    snapshot: Arc<Snapshot>,
}

impl HybridCache {
    pub fn new(
        config: CacheConfig, remote: Option<Arc<dyn RemoteTier>>,
    ) -> Result<Self, CacheConfigError> {
        let snapshot = Snapshot::build(config)?;
        let tiers = Tiers {
            local: LocalTier::new(snapshot.config.l1_capacity),
            remote,
            flights: FlightRegistry::new(),
        };
        Ok(Self {
            tiers: Arc::new(tiers),
            snapshot: Arc::new(snapshot),
        })
    }

    /// Same tiers, new key version. Every key built under the old version
    /// becomes unreachable without being evicted.
    pub fn with_version(
        &self, version: impl Into<String>,
    ) -> Result<Self, CacheConfigError> {
        let mut config = self.snapshot.config.clone();
        config.version = version.into();
        Ok(Self {
            tiers: self.tiers.clone(),
            snapshot: Arc::new(Snapshot::build(config)?),
        })
    }

    pub fn config(&self) -> &CacheConfig { &self.snapshot.config }

    pub fn keys(&self) -> &KeyBuilder { &self.snapshot.keys }

    pub fn ttl(&self) -> &TtlPolicy { &self.snapshot.ttl }

    pub fn policy(&self) -> &InvalidationPolicy { &self.snapshot.policy }

    pub fn is_enabled(&self) -> bool { self.snapshot.config.enabled }

    pub fn has_remote(&self) -> bool { self.tiers.remote.is_some() }

    /// Whether reads of `page` go through the cache. Pages past
    /// `max_cached_pages` are never cached, so they never need invalidating.
    pub fn caches_page(&self, page: u32) -> bool {
        page >= 1 && page <= self.snapshot.config.max_cached_pages
    }

    pub fn in_flight(&self) -> usize { self.tiers.flights.in_flight() }

    fn local_ttl(&self, ttl: Duration) -> Duration {
        if self.tiers.remote.is_some() {
            ttl.mul_f64(self.snapshot.config.local_ttl_ratio)
        }
        else {
            ttl
        }
    }

    /// Returns the cached value for `key`, or runs `loader` once per key
    /// across all concurrent callers and caches what it returns.
    ///
    /// Loader errors reach every waiter unchanged and are never cached.
    #[instrument(skip(self, loader), fields(key = %key))]
    pub async fn get_or_create<T, E, F, Fut>(
        &self, key: &CacheKey, ttl: Duration, loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if !self.is_enabled() {
            return loader().await;
        }
        if let Some(value) = self.read_local(key.as_str()).await {
            debug!("Cache hit (L1)");
            return Ok(value);
        }

        let cache = self.clone();
        let owned = key.as_str().to_owned();
        let work = move || async move { cache.load_through(&owned, ttl, loader).await };

        match self.tiers.flights.join_or_launch(key.as_str(), work) {
            Slot::Leader(flight) => match land::<Result<T, E>>(flight).await {
                Landing::Value(result) => result,
                Landing::Mismatch => {
                    unreachable!("leader flight yields the leader's own type")
                }
                Landing::Crashed(reason) => crashed(key, &reason),
            },
            Slot::Follower(flight, spare) => {
                match land::<Result<T, E>>(flight).await {
                    Landing::Value(result) => result,
                    Landing::Mismatch => {
                        warn!("In-flight load has a different value type, loading separately");
                        spare().await
                    }
                    Landing::Crashed(reason) => crashed(key, &reason),
                }
            }
        }
    }

    async fn load_through<T, E, F, Fut>(
        &self, key: &str, ttl: Duration, loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.read_local(key).await {
            debug!(key, "Cache hit (L1)");
            return Ok(value);
        }
        if let Some(value) = self.read_remote(key, ttl).await {
            debug!(key, "Cache hit (L2)");
            return Ok(value);
        }

        debug!(key, "Cache miss, loading");
        let value = loader().await?;
        self.store(key, &value, ttl).await;
        Ok(value)
    }

    async fn read_local<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = self.tiers.local.get(key).await?;
        match self.snapshot.codec.decode(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, "Dropping undecodable L1 entry: {e}");
                self.tiers.local.remove(key).await;
                None
            }
        }
    }

    async fn read_remote<T: DeserializeOwned>(
        &self, key: &str, ttl: Duration,
    ) -> Option<T> {
        let remote = self.tiers.remote.as_ref()?;
        let payload = match remote.get(key).await {
            Ok(payload) => payload?,
            Err(e) => {
                warn!(key, "L2 read failed, treating as miss: {e}");
                return None;
            }
        };
        match self.snapshot.codec.decode(&payload) {
            Ok(value) => {
                self.tiers
                    .local
                    .insert(key, payload, self.local_ttl(ttl))
                    .await;
                Some(value)
            }
            Err(e) => {
                warn!(key, "Dropping undecodable L2 entry: {e}");
                if let Err(e) = remote.delete(key).await {
                    warn!(key, "L2 delete failed: {e}");
                }
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let payload: Bytes = match self.snapshot.codec.encode(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, "Value not cached: {e}");
                return;
            }
        };
        if payload.len() > self.snapshot.config.max_payload_bytes {
            debug!(
                key,
                size = payload.len(),
                "Payload exceeds max_payload_bytes, not cached"
            );
            return;
        }

        self.tiers
            .local
            .insert(key, payload.clone(), self.local_ttl(ttl))
            .await;
        if let Some(remote) = &self.tiers.remote {
            if let Err(e) = remote.set(key, payload, ttl).await {
                warn!(key, "L2 write skipped: {e}");
            }
        }
    }

    /// Drops `key` from both tiers. Absent keys are fine.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn remove(&self, key: &CacheKey) {
        let report = self.remove_all([key]).await;
        if !report.is_clean() {
            debug!("Removal left {} L2 failure(s)", report.failures.len());
        }
    }

    /// Best-effort removal from both tiers. A failing key or tier does not
    /// stop the rest.
    pub async fn remove_all<'k, I>(&self, keys: I) -> RemovalReport
    where
        I: IntoIterator<Item = &'k CacheKey>,
    {
        let keys: Vec<&str> = keys.into_iter().map(CacheKey::as_str).collect();
        self.remove_local(&keys).await;

        let mut report = RemovalReport {
            attempted: keys.len(),
            failures: Vec::new(),
        };
        if let Some(remote) = &self.tiers.remote {
            let deletes = keys.iter().map(|key| async move {
                remote.delete(key).await.map_err(|e| (key.to_string(), e))
            });
            for outcome in join_all(deletes).await {
                if let Err((key, e)) = outcome {
                    warn!(key, "L2 invalidation failed: {e}");
                    report.failures.push((key, e));
                }
            }
            // A read racing the L2 deletes may have refilled L1 from L2.
            self.remove_local(&keys).await;
        }
        report
    }

    async fn remove_local(&self, keys: &[&str]) {
        for key in keys {
            self.tiers.local.remove(key).await;
        }
    }

    /// Removes every key a committed write made stale.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, event: &InvalidationEvent) -> RemovalReport {
        let stale = match self.snapshot.policy.on_write(event) {
            Ok(stale) => stale,
            Err(e) => {
                warn!("Invalidation skipped: {e}");
                return RemovalReport::default();
            }
        };
        debug!(keys = stale.len(), "Invalidating");
        self.remove_all(&stale).await
    }

    /// Drops every key of `entity` under the current version. L2 keys are
    /// only reached when the remote tier supports prefix deletion.
    #[instrument(skip(self))]
    pub async fn remove_entity(&self, entity: EntityKind) -> RemovalReport {
        let prefix = self.snapshot.keys.pattern_for(entity);
        self.tiers.local.remove_prefix(&prefix);

        let mut report = RemovalReport {
            attempted: 1,
            failures: Vec::new(),
        };
        if let Some(remote) = &self.tiers.remote {
            match remote.delete_prefix(&prefix).await {
                Ok(removed) => debug!(removed, "Dropped L2 keys for {entity}"),
                Err(TierError::Unsupported(what)) => {
                    debug!("L2 has no {what}, relying on TTL");
                }
                Err(e) => {
                    warn!("L2 prefix removal failed: {e}");
                    report.failures.push((prefix.clone(), e));
                }
            }
            self.tiers.local.remove_prefix(&prefix);
        }
        report
    }

    /// Reports which tiers hold a live entry for `key`.
    pub async fn probe(&self, key: &CacheKey) -> Probe {
        let in_local = self.tiers.local.get(key.as_str()).await.is_some();
        let in_remote = match &self.tiers.remote {
            Some(remote) => matches!(remote.get(key.as_str()).await, Ok(Some(_))),
            None => false,
        };
        Probe {
            in_local,
            in_remote,
        }
    }
}

/// Re-raises a crashed load in the waiting caller.
fn crashed(key: &CacheKey, reason: &str) -> ! {
    resume_unwind(Box::new(format!("load for `{key}` did not complete: {reason}")))
}
