use std::collections::BTreeSet;

use crate::key::{CacheKey, EntityKind, KeyBuilder, KeyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOperation {
    Create,
    Update,
    Delete,
}

/// A committed write, described well enough to know which keys went stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationEvent {
    pub entity: EntityKind,
    pub operation: WriteOperation,
    pub id: i64,
    /// `(entity, id)` pairs addressing secondary-index keys, e.g. the
    /// customer an order belonged to before and after the write.
    pub related: BTreeSet<(EntityKind, i64)>,
}

impl InvalidationEvent {
    pub fn new(entity: EntityKind, operation: WriteOperation, id: i64) -> Self {
        Self {
            entity,
            operation,
            id,
            related: BTreeSet::new(),
        }
    }

    pub fn created(entity: EntityKind, id: i64) -> Self {
        Self::new(entity, WriteOperation::Create, id)
    }

    pub fn updated(entity: EntityKind, id: i64) -> Self {
        Self::new(entity, WriteOperation::Update, id)
    }

    pub fn deleted(entity: EntityKind, id: i64) -> Self {
        Self::new(entity, WriteOperation::Delete, id)
    }

    pub fn with_related(mut self, entity: EntityKind, id: i64) -> Self {
        self.related.insert((entity, id));
        self
    }
}

/// Maps a write to the set of keys it makes stale. Pure.
///
/// Page keys are only ever populated for pages `1..=max_cached_pages`, so
/// invalidating exactly that range is complete.
#[derive(Debug, Clone)]
pub struct InvalidationPolicy {
    keys: KeyBuilder,
    max_cached_pages: u32,
}

impl InvalidationPolicy {
    pub fn new(keys: KeyBuilder, max_cached_pages: u32) -> Self {
        Self {
            keys,
            max_cached_pages,
        }
    }

    pub fn max_cached_pages(&self) -> u32 { self.max_cached_pages }

    pub fn on_write(
        &self, event: &InvalidationEvent,
    ) -> Result<BTreeSet<CacheKey>, KeyError> {
        let entity = event.entity;
        let mut stale = BTreeSet::new();

        stale.insert(self.keys.all(entity)?);
        for page in 1..=self.max_cached_pages {
            stale.insert(self.keys.page(entity, page)?);
        }
        // Also on create: the id may be cached as absent.
        stale.insert(self.keys.item(entity, event.id)?);
        for &(related, id) in &event.related {
            stale.insert(self.keys.related(entity, related, id)?);
        }

        Ok(stale)
    }
}
