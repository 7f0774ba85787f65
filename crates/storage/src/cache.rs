//! Bounded cache of recently committed entities.
//!
//! The cache outlives a single batch. It only ever holds entities without
//! pending writes; the batch context hands out copies so a working-set entity
//! never aliases a cached one.

use crate::entity::{Entity, EntityId};
use blockstate_core::{Error, Result};
use lru::LruCache;
use std::num::NonZeroUsize;

/// LRU cache of committed entities keyed by identity.
pub struct RecentCache {
    entries: LruCache<EntityId, Entity>,
}

impl RecentCache {
    /// Creates a cache holding at most `capacity` entities.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| Error::config("cache capacity must be at least 1"))?;
        Ok(Self {
            entries: LruCache::new(capacity),
        })
    }

    /// Returns a copy of the cached entity and marks it as recently used.
    pub fn get(&mut self, id: &EntityId) -> Option<Entity> {
        self.entries.get(id).cloned()
    }

    /// Checks if an entity is cached without touching its recency.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entries.contains(id)
    }

    /// Caches the committed state of an entity. Pending writes are dropped.
    pub fn insert(&mut self, entity: &Entity) {
        let mut copy = entity.clone();
        copy.revert();
        self.entries.put(copy.id(), copy);
    }

    /// Removes one entity. Returns true if it was cached.
    pub fn invalidate(&mut self, id: &EntityId) -> bool {
        self.entries.pop(id).is_some()
    }

    /// Removes every entity.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of cached entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the maximum number of cached entities.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}
