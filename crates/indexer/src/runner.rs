//! Batch delivery loop.
//!
//! The runner feeds batches to a provider and persists every changeset. A
//! failing batch is retried from scratch: the provider cache is flushed and
//! its block cursor rewound, so the retry sees exactly the stored state.

use crate::event::{group_by_block, Action};
use crate::filter::EventSource;
use crate::provider::Provider;
use blockstate_core::{Error, Result};
use blockstate_storage::{StateResolver, StateStore};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Drives one provider against one store.
pub struct BatchRunner<S: StateStore + 'static> {
    provider: Provider,
    store: Arc<S>,
    max_retries: u32,
}

impl<S: StateStore + 'static> BatchRunner<S> {
    /// Creates every provider table in `store` and resolves entities from it.
    pub fn new(mut provider: Provider, store: Arc<S>) -> Result<Self> {
        provider.init_storage(store.as_ref())?;
        let resolver: Arc<dyn StateResolver> = store.clone();
        provider.set_resolver(resolver);
        let max_retries = provider.config().max_retries;
        Ok(Self {
            provider,
            store,
            max_retries,
        })
    }

    #[inline]
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    #[inline]
    pub fn provider_mut(&mut self) -> &mut Provider {
        &mut self.provider
    }

    #[inline]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Processes and persists one batch. Returns the number of applied diffs.
    ///
    /// Blocks before the provider's start block are skipped. Batches that
    /// violate ordering are rejected without retry.
    pub fn run(&mut self, action: &Action) -> Result<usize> {
        if !self.provider.filter().accepts_block(action.block_number) {
            debug!(block = action.block_number, "block before start block, skipped");
            return Ok(0);
        }

        let previous = self.provider.last_block();
        let mut attempt = 0u32;
        loop {
            match self.attempt(action) {
                Ok(applied) => return Ok(applied),
                Err(err) => {
                    self.provider.invalidate_cache();
                    self.provider.set_last_block(previous);

                    let ordering = matches!(
                        err,
                        Error::UnsortedEvents { .. } | Error::BlockOutOfOrder { .. }
                    );
                    if ordering || attempt >= self.max_retries {
                        error!(
                            block = action.block_number,
                            attempts = attempt + 1,
                            error = %err,
                            "batch failed"
                        );
                        return Err(err);
                    }
                    attempt += 1;
                    warn!(block = action.block_number, attempt, error = %err, "retrying batch");
                }
            }
        }
    }

    /// Runs a sequence of batches, stopping at the first failure.
    pub fn run_all<'a>(&mut self, actions: impl IntoIterator<Item = &'a Action>) -> Result<usize> {
        let mut applied = 0;
        for action in actions {
            applied += self.run(action)?;
        }
        Ok(applied)
    }

    /// Fetches the provider's logs up to `head` from `source` and runs them
    /// block by block, resuming after the last processed block.
    pub fn sync_to(&mut self, source: &dyn EventSource, head: u64) -> Result<usize> {
        let filter = self.provider.filter().clone();
        let Some((from, to)) = filter.pending_range(self.provider.last_block(), head) else {
            return Ok(0);
        };
        let actions = group_by_block(source.logs(&filter, from, to)?);
        debug!(from, to, batches = actions.len(), "fetched logs");
        self.run_all(&actions)
    }

    fn attempt(&mut self, action: &Action) -> Result<usize> {
        let diffs = self.provider.process(action)?;
        self.store.apply_changeset(&diffs, true)?;
        Ok(diffs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{AbiEvent, Token};
    use crate::config::IndexerConfig;
    use crate::event::Event;
    use crate::filter::LogFilter;
    use crate::provider::Resource;
    use crate::tracker::{HandlerReq, Tracker};
    use alloy_primitives::{Address, U256};
    use blockstate_core::schema::{Field, Table, TableBuilder};
    use blockstate_core::{FieldType, Value};
    use blockstate_storage::{Attributes, Diff, MemoryStore};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A memory store whose first `failures` changesets are rejected.
    struct FlakyStore {
        inner: MemoryStore,
        failures: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures: AtomicU32::new(failures),
            }
        }
    }

    impl StateResolver for FlakyStore {
        fn get_obj(&self, table: &str, keys: &Attributes) -> Result<Option<Attributes>> {
            self.inner.get_obj(table, keys)
        }
    }

    impl StateStore for FlakyStore {
        fn upsert_table(&self, table: &Table) -> Result<()> {
            self.inner.upsert_table(table)
        }

        fn apply_changeset(&self, diffs: &[Diff], commit: bool) -> Result<()> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::storage("connection reset"));
            }
            self.inner.apply_changeset(diffs, commit)
        }
    }

    fn ping() -> AbiEvent {
        AbiEvent::parse("Ping(uint256 value)").unwrap()
    }

    fn provider(max_retries: u32, start_block: u64) -> Provider {
        let table = TableBuilder::new("counter")
            .unwrap()
            .add_field(Field::new("id", FieldType::Address).id())
            .unwrap()
            .add_field(Field::new("count", FieldType::Uint).default_value(0u64))
            .unwrap()
            .build()
            .unwrap();
        Provider::builder("counter")
            .resource(Resource::new(table))
            .tracker(Tracker::new(ping(), |req: &mut HandlerReq<'_>| {
                let value = req.values().uint_value("value")?;
                let counter = req.get("counter", &[Value::from("0")])?;
                req.entity_mut(counter)?.add("count", value)
            }))
            .filter(LogFilter::new().start_block(start_block))
            .config(IndexerConfig {
                max_retries,
                ..Default::default()
            })
            .build()
            .unwrap()
    }

    fn ping_log(block: u64, value: u64) -> Event {
        let mut log = ping()
            .encode_log(Address::ZERO, &[Token::Uint(U256::from(value))])
            .unwrap();
        log.block_number = block;
        log
    }

    fn ping_action(block: u64, value: u64) -> Action {
        Action::new(block, vec![ping_log(block, value)])
    }

    /// Serves a fixed log set and records every requested range.
    struct FixedSource {
        logs: Vec<Event>,
        requests: Mutex<Vec<(LogFilter, u64, u64)>>,
    }

    impl EventSource for FixedSource {
        fn logs(&self, filter: &LogFilter, from: u64, to: u64) -> Result<Vec<Event>> {
            self.requests.lock().push((filter.clone(), from, to));
            Ok(self
                .logs
                .iter()
                .filter(|log| (from..=to).contains(&log.block_number))
                .cloned()
                .collect())
        }
    }

    fn count(store: &MemoryStore) -> Option<String> {
        store.value("counter", &[("id", "0")], "count")
    }

    #[test]
    fn test_runner_persists_batches() {
        let store = Arc::new(MemoryStore::new());
        let mut runner = BatchRunner::new(provider(0, 0), store.clone()).unwrap();

        let applied = runner
            .run_all(&[ping_action(1, 2), ping_action(2, 3)])
            .unwrap();
        assert_eq!(applied, 2);
        assert_eq!(count(&store), Some("5".to_string()));
        assert_eq!(runner.provider().last_block(), Some(2));
    }

    #[test]
    fn test_runner_retries_failed_apply() {
        let store = Arc::new(FlakyStore::new(2));
        let mut runner = BatchRunner::new(provider(3, 0), store.clone()).unwrap();

        runner.run(&ping_action(1, 2)).unwrap();
        runner.run(&ping_action(2, 3)).unwrap();
        // the failed attempts must not leave the cached count ahead of storage
        assert_eq!(count(&store.inner), Some("5".to_string()));
    }

    #[test]
    fn test_runner_gives_up_after_max_retries() {
        let store = Arc::new(FlakyStore::new(10));
        let mut runner = BatchRunner::new(provider(2, 0), store.clone()).unwrap();

        assert!(runner.run(&ping_action(1, 2)).is_err());
        assert_eq!(store.failures.load(Ordering::SeqCst), 7);
        assert_eq!(runner.provider().last_block(), None);
        assert_eq!(store.inner.row_count("counter"), 0);
    }

    #[test]
    fn test_runner_skips_blocks_before_start() {
        let store = Arc::new(MemoryStore::new());
        let mut runner = BatchRunner::new(provider(0, 10), store.clone()).unwrap();

        assert_eq!(runner.run(&ping_action(9, 1)).unwrap(), 0);
        assert_eq!(runner.run(&ping_action(10, 1)).unwrap(), 1);
        assert_eq!(count(&store), Some("1".to_string()));
    }

    #[test]
    fn test_runner_does_not_retry_ordering_errors() {
        let store = Arc::new(FlakyStore::new(0));
        let mut runner = BatchRunner::new(provider(3, 0), store.clone()).unwrap();

        runner.run(&ping_action(5, 1)).unwrap();
        let err = runner.run(&ping_action(4, 1)).unwrap_err();
        assert!(matches!(err, Error::BlockOutOfOrder { last: 5, got: 4 }));
        assert_eq!(runner.provider().last_block(), Some(5));
    }

    #[test]
    fn test_runner_sync_to_resumes_after_last_block() {
        let store = Arc::new(MemoryStore::new());
        let mut runner = BatchRunner::new(provider(0, 10), store.clone()).unwrap();
        let source = FixedSource {
            logs: vec![ping_log(12, 1), ping_log(11, 2), ping_log(15, 4), ping_log(9, 8)],
            requests: Mutex::new(Vec::new()),
        };

        assert_eq!(runner.sync_to(&source, 12).unwrap(), 2);
        assert_eq!(count(&store), Some("3".to_string()));
        assert_eq!(runner.provider().last_block(), Some(12));

        assert_eq!(runner.sync_to(&source, 20).unwrap(), 1);
        assert_eq!(count(&store), Some("7".to_string()));
        assert_eq!(runner.sync_to(&source, 15).unwrap(), 0);

        let requests = source.requests.lock();
        let ranges: Vec<(u64, u64)> = requests.iter().map(|(_, from, to)| (*from, *to)).collect();
        assert_eq!(ranges, vec![(10, 12), (13, 20)]);
        assert_eq!(requests[0].0, *runner.provider().filter());
    }
}
