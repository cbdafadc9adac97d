use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

use super::{RemoteTier, TierError, TierResult};
use crate::config::CircuitBreakerConfig;

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Short-circuits a remote tier after `failure_threshold` consecutive
/// failures and lets a probe through once `cooldown` has elapsed. A failed
/// probe reopens the circuit straight away.
pub struct CircuitBreaker<R> {
    inner: R,
    failure_threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl<R: RemoteTier> CircuitBreaker<R> {
    pub fn new(inner: R, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner,
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock()
            .open_until
            .is_some_and(|until| until > Instant::now())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn admit(&self) -> TierResult<()> {
        if self.is_open() {
            Err(TierError::CircuitOpen)
        }
        else {
            Ok(())
        }
    }

    fn record<T>(&self, outcome: TierResult<T>) -> TierResult<T> {
        let mut state = self.lock();
        match &outcome {
            Ok(_) | Err(TierError::Unsupported(_)) => {
                if state.open_until.take().is_some() {
                    tracing::info!("L2 circuit closed");
                }
                state.consecutive_failures = 0;
            }
            Err(_) => {
                // Still set after the cooldown: this call was the probe.
                let probing = state.open_until.is_some();
                state.consecutive_failures += 1;
                if probing || state.consecutive_failures >= self.failure_threshold {
                    state.open_until = Some(Instant::now() + self.cooldown);
                    state.consecutive_failures = 0;
                    tracing::warn!(
                        cooldown = ?self.cooldown,
                        "L2 circuit opened"
                    );
                }
            }
        }
        outcome
    }
}

#[async_trait]
impl<R: RemoteTier> RemoteTier for CircuitBreaker<R> {
    async fn get(&self, key: &str) -> TierResult<Option<Bytes>> {
        self.admit()?;
        self.record(self.inner.get(key).await)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> TierResult<()> {
        self.admit()?;
        self.record(self.inner.set(key, value, ttl).await)
    }

    async fn delete(&self, key: &str) -> TierResult<()> {
        self.admit()?;
        self.record(self.inner.delete(key).await)
    }

    async fn delete_prefix(&self, prefix: &str) -> TierResult<u64> {
        self.admit()?;
        self.record(self.inner.delete_prefix(prefix).await)
    }
}

/// Wraps `tier` in a breaker when the configuration asks for one.
pub fn guarded<R>(tier: R, config: &CircuitBreakerConfig) -> Arc<dyn RemoteTier>
where
    R: RemoteTier + 'static,
{
    if config.enabled {
        Arc::new(CircuitBreaker::new(
            tier,
            config.failure_threshold,
            config.cooldown(),
        ))
    }
    else {
        Arc::new(tier)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Flaky {
        down: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteTier for Flaky {
        async fn get(&self, _key: &str) -> TierResult<Option<Bytes>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                Err(TierError::Unavailable("connection refused".into()))
            }
            else {
                Ok(None)
            }
        }

        async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> TierResult<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> TierResult<()> { Ok(()) }
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_recovers_after_cooldown() {
        let flaky = Arc::new(Flaky::default());
        flaky.down.store(true, Ordering::SeqCst);
        let breaker = CircuitBreaker::new(flaky.clone(), 3, Duration::from_secs(10));

        for _ in 0..3 {
            assert!(matches!(
                breaker.get("k").await,
                Err(TierError::Unavailable(_))
            ));
        }
        assert!(breaker.is_open());
        assert!(matches!(breaker.get("k").await, Err(TierError::CircuitOpen)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);

        flaky.down.store(false, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(!breaker.is_open());
        assert!(breaker.get("k").await.unwrap().is_none());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens_immediately() {
        let flaky = Arc::new(Flaky::default());
        flaky.down.store(true, Ordering::SeqCst);
        let breaker = CircuitBreaker::new(flaky.clone(), 3, Duration::from_secs(10));
        for _ in 0..3 {
            let _ = breaker.get("k").await;
        }
        tokio::time::advance(Duration::from_secs(10)).await;

        assert!(matches!(
            breaker.get("k").await,
            Err(TierError::Unavailable(_))
        ));
        assert!(breaker.is_open());
        assert!(matches!(breaker.get("k").await, Err(TierError::CircuitOpen)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let flaky = Arc::new(Flaky::default());
        let breaker = CircuitBreaker::new(flaky.clone(), 2, Duration::from_secs(10));

        flaky.down.store(true, Ordering::SeqCst);
        let _ = breaker.get("k").await;
        flaky.down.store(false, Ordering::SeqCst);
        let _ = breaker.get("k").await;
        flaky.down.store(true, Ordering::SeqCst);
        let _ = breaker.get("k").await;

        assert!(!breaker.is_open());
    }
}
