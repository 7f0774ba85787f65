//! Batch context.
//!
//! A `Snapshot` owns every entity touched while one batch is processed. It
//! resolves `(table, id values)` to at most one live entity per identity, looking
//! in this order:
//!
//! 1. the working set of the current batch
//! 2. the recent-entity cache
//! 3. the state resolver
//! 4. a fresh entity, with defaults and the table's init hook applied
//!
//! Entities live in an arena and are handed out as [`EntityRef`] handles. A
//! handle is only valid for the batch that produced it.

use crate::cache::RecentCache;
use crate::client::{ChainClient, InitHook};
use crate::diff::Changeset;
use crate::entity::{Entity, EntityId};
use crate::resolver::{Attributes, StateResolver};
use blockstate_core::schema::{SchemaRegistry, Table};
use blockstate_core::{Error, Result, Value};
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Handle to an entity of the current batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityRef {
    index: usize,
    epoch: u64,
}

impl EntityRef {
    /// Returns the batch epoch this handle belongs to.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

struct ResolvedKey {
    table: Arc<Table>,
    keys: BTreeMap<String, String>,
    id: EntityId,
}

/// Working set and lookup logic for one in-flight batch.
pub struct Snapshot {
    schemas: Arc<SchemaRegistry>,
    resolver: Option<Arc<dyn StateResolver>>,
    client: Option<Arc<dyn ChainClient>>,
    hooks: HashMap<String, Arc<dyn InitHook>>,
    cache: RecentCache,
    arena: Vec<Entity>,
    index: HashMap<EntityId, usize>,
    epoch: u64,
    block: u64,
}

impl Snapshot {
    /// Creates a batch context over `schemas` with a cache of `cache_capacity`
    /// entities.
    pub fn new(schemas: Arc<SchemaRegistry>, cache_capacity: usize) -> Result<Self> {
        Ok(Self {
            schemas,
            resolver: None,
            client: None,
            hooks: HashMap::new(),
            cache: RecentCache::new(cache_capacity)?,
            arena: Vec::new(),
            index: HashMap::new(),
            epoch: 0,
            block: 0,
        })
    }

    /// Sets the resolver consulted on cache misses.
    pub fn set_resolver(&mut self, resolver: Arc<dyn StateResolver>) {
        self.resolver = Some(resolver);
    }

    /// Sets the chain client handed to init hooks.
    pub fn set_client(&mut self, client: Arc<dyn ChainClient>) {
        self.client = Some(client);
    }

    /// Registers the init hook of a table. The table must exist and have
    /// exactly one identity field.
    pub fn set_hook(&mut self, table: &str, hook: Arc<dyn InitHook>) -> Result<()> {
        let schema = self.schemas.get(table)?;
        if schema.id_count() != 1 {
            return Err(Error::invalid_schema(format!(
                "init hook on {} requires exactly one id field, found {}",
                table,
                schema.id_count()
            )));
        }
        self.hooks.insert(table.to_string(), hook);
        Ok(())
    }

    /// Returns the schema registry.
    #[inline]
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    /// Returns the block number of the current batch.
    #[inline]
    pub fn block(&self) -> u64 {
        self.block
    }

    /// Returns the current batch epoch.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the recent-entity cache.
    #[inline]
    pub fn cache(&self) -> &RecentCache {
        &self.cache
    }

    /// Starts a new batch. Anything left in the working set is dropped.
    pub fn begin(&mut self, block: u64) {
        self.reset();
        self.block = block;
    }

    fn reset(&mut self) {
        self.arena.clear();
        self.index.clear();
        self.epoch += 1;
    }

    fn resolve_key(&self, table: &str, ids: &[Value]) -> Result<ResolvedKey> {
        let table = Arc::clone(self.schemas.get(table)?);
        if ids.len() != table.id_count() {
            return Err(Error::IncorrectIdFields {
                table: table.name().to_string(),
                expected: table.id_count(),
                got: ids.len(),
            });
        }

        let mut encoded = Vec::with_capacity(ids.len());
        for (field, value) in table.id_fields().zip(ids) {
            let raw = field
                .encode(value)
                .map_err(|e| Error::set_encode(table.name(), field.name(), e))?;
            encoded.push((field.name().to_string(), raw));
        }
        let id = EntityId::derive(table.name(), encoded.iter().map(|(_, v)| v.as_str()));
        Ok(ResolvedKey {
            table,
            keys: encoded.into_iter().collect(),
            id,
        })
    }

    fn handle(&self, index: usize) -> EntityRef {
        EntityRef {
            index,
            epoch: self.epoch,
        }
    }

    fn adopt(&mut self, entity: Entity) -> EntityRef {
        let index = self.arena.len();
        self.index.insert(entity.id(), index);
        self.arena.push(entity);
        self.handle(index)
    }

    /// Looks in the working set, then in the cache, then asks the resolver.
    fn lookup(&mut self, key: &ResolvedKey) -> Result<Option<EntityRef>> {
        if let Some(&index) = self.index.get(&key.id) {
            return Ok(Some(self.handle(index)));
        }
        if let Some(entity) = self.cache.get(&key.id) {
            return Ok(Some(self.adopt(entity)));
        }

        let Some(resolver) = &self.resolver else {
            return Ok(None);
        };
        let row = resolver
            .get_obj(key.table.name(), &key.keys)
            .map_err(|e| Error::recover_object(key.table.name(), e))?;
        let Some(row) = row else {
            debug!(table = key.table.name(), entity = %key.id, "resolver miss");
            return Ok(None);
        };

        let entity = Entity::fetched(Arc::clone(&key.table), key.id, key.keys.clone(), row);
        self.cache.insert(&entity);
        Ok(Some(self.adopt(entity)))
    }

    /// Returns the entity of `table` identified by `ids`, creating it if it
    /// does not exist anywhere.
    ///
    /// Calling this twice with the same identity during one batch returns the
    /// same handle.
    pub fn get(&mut self, table: &str, ids: &[Value]) -> Result<EntityRef> {
        let key = self.resolve_key(table, ids)?;
        if let Some(found) = self.lookup(&key)? {
            return Ok(found);
        }

        let ResolvedKey { table, keys, id } = key;
        let mut entity = Entity::new(Arc::clone(&table), id, keys);
        for field in table.defaults() {
            if let Some(value) = field.get_default_value() {
                entity.set(field.name(), value.clone())?;
            }
        }

        if let Some(hook) = self.hooks.get(table.name()).cloned() {
            // hooks are restricted to single-key tables
            if let Some(field) = table.id_fields().next() {
                let raw = entity.keys().get(field.name()).cloned().unwrap_or_default();
                let decoded = field
                    .decode(&raw)
                    .map_err(|e| Error::get_decode(table.name(), field.name(), e))?;
                hook.init(&decoded, self.client.as_deref(), &mut entity)
                    .map_err(|e| Error::contract_init(table.name(), raw, e))?;
            }
        }

        debug!(table = table.name(), entity = %id, "entity created");
        Ok(self.adopt(entity))
    }

    /// Returns the entity if it exists in the working set, the cache or the
    /// resolver. Never creates an entity and never runs init hooks.
    pub fn get_ok(&mut self, table: &str, ids: &[Value]) -> Result<Option<EntityRef>> {
        let key = self.resolve_key(table, ids)?;
        self.lookup(&key)
    }

    fn check(&self, handle: EntityRef) -> Result<usize> {
        if handle.epoch != self.epoch || handle.index >= self.arena.len() {
            return Err(Error::StaleEntity {
                handle: handle.epoch,
                current: self.epoch,
            });
        }
        Ok(handle.index)
    }

    /// Borrows an entity of the current batch.
    pub fn entity(&self, handle: EntityRef) -> Result<&Entity> {
        let index = self.check(handle)?;
        Ok(&self.arena[index])
    }

    /// Mutably borrows an entity of the current batch.
    pub fn entity_mut(&mut self, handle: EntityRef) -> Result<&mut Entity> {
        let index = self.check(handle)?;
        Ok(&mut self.arena[index])
    }

    /// Returns handles to every entity in the working set, in the order they
    /// were first touched.
    pub fn refs(&self) -> Vec<EntityRef> {
        (0..self.arena.len()).map(|i| self.handle(i)).collect()
    }

    /// Returns handles to the working-set entities of one table.
    pub fn refs_for_table(&self, table: &str) -> Vec<EntityRef> {
        self.arena
            .iter()
            .enumerate()
            .filter(|(_, e)| e.table_name() == table)
            .map(|(i, _)| self.handle(i))
            .collect()
    }

    /// Returns the number of entities in the working set.
    pub fn working_set_len(&self) -> usize {
        self.arena.len()
    }

    /// Computes the changeset of the batch and clears the working set.
    ///
    /// Every entity with pending writes yields exactly one diff, is folded and
    /// its committed state refreshed in the cache.
    pub fn save(&mut self) -> Changeset {
        let mut diffs = Changeset::new();
        for entity in self.arena.iter_mut() {
            if let Some(diff) = entity.fold() {
                self.cache.insert(entity);
                diffs.push(diff);
            }
        }
        self.reset();
        diffs
    }

    /// Drops the working set without producing a changeset. The cache is left
    /// as is.
    pub fn discard(&mut self) {
        self.reset();
    }

    /// Empties the recent-entity cache.
    pub fn invalidate_cache(&mut self) {
        self.cache.clear();
    }

    /// Returns the identity keys of an entity as decoded values, in field
    /// declaration order.
    pub fn id_values(&self, handle: EntityRef) -> Result<Vec<Value>> {
        let entity = self.entity(handle)?;
        entity
            .schema()
            .id_fields()
            .map(|field| entity.get(field.name()))
            .collect()
    }
}

/// Convenience for handing encoded attributes to a resolver in tests and
/// tooling.
pub fn attributes<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Attributes {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
