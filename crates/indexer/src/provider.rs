//! Providers.
//!
//! A provider is a declarative bundle of tables, trackers and aggregates. Once
//! built it owns the schema registry and the batch context, and turns each
//! batch into a changeset.

use crate::aggregate::Aggregate;
use crate::config::IndexerConfig;
use crate::event::Action;
use crate::filter::LogFilter;
use crate::pipeline::Pipeline;
use crate::tracker::Tracker;
use blockstate_core::schema::{SchemaRegistry, Table};
use blockstate_core::{Error, Result};
use blockstate_storage::{ChainClient, Changeset, InitHook, Snapshot, StateResolver, StateStore};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

/// A table together with its optional init hook.
pub struct Resource {
    table: Table,
    hook: Option<Arc<dyn InitHook>>,
}

impl Resource {
    pub fn new(table: Table) -> Self {
        Self { table, hook: None }
    }

    /// Attaches a hook run for every newly created entity of this table.
    pub fn with_hook(mut self, hook: impl InitHook + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    #[inline]
    pub fn table(&self) -> &Table {
        &self.table
    }
}

/// Collects the parts of a provider.
pub struct ProviderBuilder {
    name: String,
    resources: Vec<Resource>,
    trackers: Vec<Tracker>,
    aggregates: Vec<Aggregate>,
    filter: LogFilter,
    config: IndexerConfig,
    resolver: Option<Arc<dyn StateResolver>>,
    client: Option<Arc<dyn ChainClient>>,
}

impl ProviderBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            trackers: Vec::new(),
            aggregates: Vec::new(),
            filter: LogFilter::default(),
            config: IndexerConfig::default(),
            resolver: None,
            client: None,
        }
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Adds a tracker. Trackers run in the order they are added.
    pub fn tracker(mut self, tracker: Tracker) -> Self {
        self.trackers.push(tracker);
        self
    }

    /// Adds an aggregate. Aggregates run after every tracker.
    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    pub fn filter(mut self, filter: LogFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn StateResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Registers every table, derives the aggregate tables and assembles the
    /// pipeline.
    pub fn build(self) -> Result<Provider> {
        self.config.validate()?;

        let mut registry = SchemaRegistry::new();
        let mut hooks = Vec::new();
        for resource in self.resources {
            let table = registry.register(resource.table)?;
            if let Some(hook) = resource.hook {
                hooks.push((table.name().to_string(), hook));
            }
        }

        let mut derived = Vec::with_capacity(self.aggregates.len());
        for aggregate in &self.aggregates {
            let source = Arc::clone(registry.get(aggregate.source())?);
            derived.push(aggregate.derive_schema(&source)?);
        }
        for table in derived {
            registry.register(table)?;
        }
        registry.validate_references()?;

        let mut pipeline = Pipeline::new();
        for tracker in self.trackers {
            pipeline.push(tracker);
        }
        for aggregate in self.aggregates {
            pipeline.push(aggregate);
        }

        let schemas = Arc::new(registry);
        let mut snapshot = Snapshot::new(Arc::clone(&schemas), self.config.cache_capacity)?;
        for (table, hook) in hooks {
            snapshot.set_hook(&table, hook)?;
        }
        if let Some(resolver) = self.resolver {
            snapshot.set_resolver(resolver);
        }
        if let Some(client) = self.client {
            snapshot.set_client(client);
        }

        info!(
            provider = %self.name,
            tables = schemas.len(),
            stages = pipeline.len(),
            "provider initialized"
        );

        Ok(Provider {
            name: self.name,
            schemas,
            pipeline,
            snapshot,
            filter: self.filter,
            config: self.config,
            last_block: None,
        })
    }
}

/// A built provider.
pub struct Provider {
    name: String,
    schemas: Arc<SchemaRegistry>,
    pipeline: Pipeline,
    snapshot: Snapshot,
    filter: LogFilter,
    config: IndexerConfig,
    last_block: Option<u64>,
}

impl Provider {
    pub fn builder(name: impl Into<String>) -> ProviderBuilder {
        ProviderBuilder::new(name)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns every table of this provider, derived ones included.
    #[inline]
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    #[inline]
    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    #[inline]
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Returns the names of the pipeline stages in run order.
    pub fn stages(&self) -> Vec<&str> {
        self.pipeline.names()
    }

    /// Returns the last successfully processed block.
    #[inline]
    pub fn last_block(&self) -> Option<u64> {
        self.last_block
    }

    /// Overrides the last processed block, e.g. when resuming from storage or
    /// when a produced changeset could not be persisted.
    pub fn set_last_block(&mut self, block: Option<u64>) {
        self.last_block = block;
    }

    pub fn set_resolver(&mut self, resolver: Arc<dyn StateResolver>) {
        self.snapshot.set_resolver(resolver);
    }

    pub fn set_client(&mut self, client: Arc<dyn ChainClient>) {
        self.snapshot.set_client(client);
    }

    /// Creates or migrates every table in `store`.
    pub fn init_storage(&self, store: &dyn StateStore) -> Result<()> {
        for table in self.schemas.tables() {
            store.upsert_table(table)?;
        }
        debug!(provider = %self.name, tables = self.schemas.len(), "storage initialized");
        Ok(())
    }

    /// Forgets every cached entity. Required whenever a produced changeset
    /// was not persisted.
    pub fn invalidate_cache(&mut self) {
        self.snapshot.invalidate_cache();
    }

    /// Turns one batch into a changeset.
    ///
    /// On error nothing from the batch survives: the working set is dropped
    /// and the batch can be retried as is.
    pub fn process(&mut self, action: &Action) -> Result<Changeset> {
        let span = info_span!("process", provider = %self.name, block = action.block_number);
        let _enter = span.enter();

        action.ensure_sorted()?;
        if self.config.strict_block_order {
            if let Some(last) = self.last_block {
                if action.block_number <= last {
                    return Err(Error::BlockOutOfOrder {
                        last,
                        got: action.block_number,
                    });
                }
            }
        }

        self.snapshot.begin(action.block_number);
        if let Err(err) = self.pipeline.run(action, &mut self.snapshot) {
            self.snapshot.discard();
            warn!(error = %err, "batch aborted");
            return Err(err);
        }

        let diffs = self.snapshot.save();
        self.last_block = Some(action.block_number);
        info!(events = action.len(), diffs = diffs.len(), "batch processed");
        Ok(diffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{AbiEvent, Token};
    use crate::aggregate::BlockBuckets;
    use crate::event::Event;
    use crate::tracker::HandlerReq;
    use alloy_primitives::{Address, U256};
    use blockstate_core::schema::{Field, TableBuilder};
    use blockstate_core::{FieldType, Value};
    use blockstate_storage::{find_diff, MemoryStore};

    fn counter_table() -> Table {
        TableBuilder::new("counter")
            .unwrap()
            .add_field(Field::new("id", FieldType::Address).id())
            .unwrap()
            .add_field(Field::new("total", FieldType::Uint).default_value(0u64))
            .unwrap()
            .build()
            .unwrap()
    }

    fn deposit() -> AbiEvent {
        AbiEvent::parse("Deposit(address indexed account, uint256 amount)").unwrap()
    }

    fn deposit_log(account: Address, amount: u64, log_index: u64) -> Event {
        let mut log = deposit()
            .encode_log(Address::ZERO, &[Token::Address(account), Token::Uint(U256::from(amount))])
            .unwrap();
        log.log_index = log_index;
        log
    }

    fn deposit_tracker() -> Tracker {
        Tracker::new(deposit(), |req: &mut HandlerReq<'_>| {
            let account = req.values().address("account")?;
            let amount = req.values().uint_value("amount")?;
            let counter = req.get("counter", &[Value::from(account)])?;
            req.entity_mut(counter)?.add("total", amount)
        })
    }

    fn provider() -> Provider {
        Provider::builder("test")
            .resource(Resource::new(counter_table()))
            .tracker(deposit_tracker())
            .aggregate(Aggregate::new(
                "counter_total",
                "counter",
                "total",
                BlockBuckets::new(10).unwrap(),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_registers_tables_and_stages() {
        let provider = provider();
        assert!(provider.schemas().contains("counter"));
        assert!(provider.schemas().contains("counter_total"));
        assert_eq!(provider.stages(), vec!["Deposit", "counter_total"]);
        assert_eq!(provider.last_block(), None);
    }

    #[test]
    fn test_build_rejects_unknown_aggregate_source() {
        let result = Provider::builder("test")
            .aggregate(Aggregate::new("x", "missing", "total", BlockBuckets::every_block()))
            .build();
        assert!(result.is_err());

        let result = Provider::builder("test")
            .config(IndexerConfig {
                cache_capacity: 0,
                ..Default::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_process_produces_changeset() {
        let mut provider = provider();
        let alice = Address::repeat_byte(0xa1);
        let action = Action::new(
            5,
            vec![deposit_log(alice, 3, 0), deposit_log(alice, 4, 1)],
        );

        let diffs = provider.process(&action).unwrap();
        let alice_key = alice.to_checksum(None);
        let counter = find_diff(&diffs, "counter", &[("id", alice_key.as_str())]).unwrap();
        assert!(counter.creation);
        assert_eq!(counter.val("total"), Some("7"));

        let sample = find_diff(
            &diffs,
            "counter_total",
            &[("id", alice_key.as_str()), ("bucket", "0")],
        )
        .unwrap();
        assert_eq!(sample.val("total"), Some("7"));
        assert_eq!(provider.last_block(), Some(5));
    }

    #[test]
    fn test_process_rejects_unsorted_and_stale_batches() {
        let mut provider = provider();
        let alice = Address::repeat_byte(0xa1);

        let unsorted = Action::new(5, vec![deposit_log(alice, 1, 3), deposit_log(alice, 1, 1)]);
        assert!(matches!(
            provider.process(&unsorted).unwrap_err(),
            Error::UnsortedEvents { .. }
        ));

        provider.process(&Action::new(5, Vec::new())).unwrap();
        assert!(matches!(
            provider.process(&Action::new(5, Vec::new())).unwrap_err(),
            Error::BlockOutOfOrder { last: 5, got: 5 }
        ));
    }

    #[test]
    fn test_process_with_persisted_state() {
        let store = Arc::new(MemoryStore::new());
        let mut provider = provider();
        provider.init_storage(store.as_ref()).unwrap();
        provider.set_resolver(store.clone());

        let alice = Address::repeat_byte(0xa1);
        let first = provider.process(&Action::new(1, vec![deposit_log(alice, 2, 0)])).unwrap();
        store.apply_changeset(&first, true).unwrap();

        provider.invalidate_cache();
        let second = provider.process(&Action::new(2, vec![deposit_log(alice, 5, 0)])).unwrap();
        let alice_key = alice.to_checksum(None);
        let counter = find_diff(&second, "counter", &[("id", alice_key.as_str())]).unwrap();
        assert!(!counter.creation);
        assert_eq!(counter.val("total"), Some("7"));
        store.apply_changeset(&second, true).unwrap();
        assert_eq!(
            store.value("counter", &[("id", alice_key.as_str())], "total"),
            Some("7".to_string())
        );
    }
}
