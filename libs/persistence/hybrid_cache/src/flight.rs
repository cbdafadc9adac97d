use std::{
    any::Any,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use tokio::task::JoinError;

type Outcome = Arc<dyn Any + Send + Sync>;

/// Handle on a load running on its own task. `Err` carries why the task
/// never produced a value: the loader's panic message, or cancellation when
/// the runtime was torn down.
pub type Flight = Shared<BoxFuture<'static, Result<Outcome, Arc<str>>>>;

struct InFlight {
    id: u64,
    flight: Flight,
}

/// What a caller got from [`FlightRegistry::join_or_launch`].
pub enum Slot<W> {
    /// The caller's work was spawned and is now the key's flight.
    Leader(Flight),
    /// Another caller's load was already running; the unused work is
    /// handed back.
    Follower(Flight, W),
}

pub enum Landing<R> {
    Value(R),
    /// The flight produced a different type than the caller asked for.
    Mismatch,
    Crashed(Arc<str>),
}

/// Per-key, process-local single-flight registry.
#[derive(Default)]
pub struct FlightRegistry {
    inflight: Arc<DashMap<String, InFlight>>,
    next_id: AtomicU64,
}

struct Release {
    inflight: Arc<DashMap<String, InFlight>>,
    key: String,
    id: u64,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.inflight
            .remove_if(&self.key, |_, current| current.id == self.id);
    }
}

impl FlightRegistry {
    pub fn new() -> Self { Self::default() }

    /// Joins the key's running load, or spawns `work` as that load.
    ///
    /// The spawned task owns the slot and releases it when it finishes,
    /// so dropping every waiter leaves the load running to completion.
    pub fn join_or_launch<W, Fut>(&self, key: &str, work: W) -> Slot<W>
    where
        W: FnOnce() -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + Sync + 'static,
    {
        match self.inflight.entry(key.to_owned()) {
            Entry::Occupied(running) => {
                tracing::debug!(key, "Joining in-flight load");
                Slot::Follower(running.get().flight.clone(), work)
            }
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let release = Release {
                    inflight: self.inflight.clone(),
                    key: key.to_owned(),
                    id,
                };
                let load = work();
                let handle = tokio::spawn(async move {
                    let _release = release;
                    Arc::new(load.await) as Outcome
                });
                let flight = handle
                    .map(|joined| joined.map_err(crash_reason))
                    .boxed()
                    .shared();
                vacant.insert(InFlight {
                    id,
                    flight: flight.clone(),
                });
                Slot::Leader(flight)
            }
        }
    }

    pub fn in_flight(&self) -> usize { self.inflight.len() }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inflight.contains_key(key)
    }
}

fn crash_reason(e: JoinError) -> Arc<str> {
    if !e.is_panic() {
        return Arc::from("load was cancelled");
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned());
    Arc::from(format!("loader panicked: {message}"))
}

/// Waits for `flight` and clones its outcome out as `R`.
pub async fn land<R>(flight: Flight) -> Landing<R>
where
    R: Clone + 'static,
{
    match flight.await {
        Ok(outcome) => match outcome.downcast_ref::<R>() {
            Some(value) => Landing::Value(value.clone()),
            None => Landing::Mismatch,
        },
        Err(reason) => Landing::Crashed(reason),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicUsize, time::Duration};

    use super::*;

    #[tokio::test]
    async fn test_followers_share_the_leaders_outcome() {
        let registry = FlightRegistry::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let launch = |runs: Arc<AtomicUsize>| {
            move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                42_u32
            }
        };

        let leader = registry.join_or_launch("k", launch(runs.clone()));
        let follower = registry.join_or_launch("k", launch(runs.clone()));
        assert!(matches!(leader, Slot::Leader(_)));
        let Slot::Follower(flight, _) = follower else {
            panic!("second caller should join");
        };

        assert!(matches!(land::<u32>(flight).await, Landing::Value(42)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slot_is_released_when_the_load_finishes() {
        let registry = FlightRegistry::new();
        let Slot::Leader(flight) =
            registry.join_or_launch("k", || async { "done".to_string() })
        else {
            panic!("empty registry should lead");
        };

        assert!(matches!(land::<String>(flight).await, Landing::Value(_)));
        tokio::task::yield_now().await;
        assert!(!registry.is_in_flight("k"));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_reported() {
        let registry = FlightRegistry::new();
        let Slot::Leader(flight) = registry.join_or_launch("k", || async { 1_u8 })
        else {
            panic!("empty registry should lead");
        };

        assert!(matches!(land::<String>(flight).await, Landing::Mismatch));
    }

    #[tokio::test]
    async fn test_panicking_load_is_reported_as_crashed() {
        let registry = FlightRegistry::new();
        let Slot::Leader(flight) = registry.join_or_launch("k", || async {
            if true {
                panic!("loader blew up");
            }
            0_u8
        }) else {
            panic!("empty registry should lead");
        };

        let Landing::Crashed(reason) = land::<u8>(flight).await else {
            panic!("panicking load should crash");
        };
        assert!(reason.contains("loader blew up"), "{reason}");
        assert!(!registry.is_in_flight("k"));
    }
}
