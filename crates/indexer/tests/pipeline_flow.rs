//! End-to-end batch processing through a provider.

use alloy_primitives::{Address, U256};
use blockstate_core::schema::{Field, TableBuilder};
use blockstate_core::{Error, FieldType, Value};
use blockstate_indexer::{
    AbiEvent, Action, Aggregate, BlockBuckets, Event, HandlerReq, Provider, Resource, Token,
    Tracker,
};
use blockstate_storage::{find_diff, MemoryStore, StateStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const ACCOUNT: &str = "0xaccount";

fn ping() -> AbiEvent {
    AbiEvent::parse("event Ping(uint256 value)").unwrap()
}

fn ping_log(value: u64, log_index: u64) -> Event {
    let mut log = ping()
        .encode_log(Address::ZERO, &[Token::Uint(U256::from(value))])
        .unwrap();
    log.log_index = log_index;
    log
}

fn pings(block: u64, values: &[u64]) -> Action {
    let events = values
        .iter()
        .enumerate()
        .map(|(i, v)| ping_log(*v, i as u64))
        .collect();
    Action::new(block, events)
}

/// Routes provider logs to the test output; `RUST_LOG=debug` shows every stage.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Adds every ping to `account.balance`; a ping of zero is an error.
fn provider() -> Provider {
    init_tracing();
    let table = TableBuilder::new("account")
        .unwrap()
        .add_field(Field::new("id", FieldType::Address).id())
        .unwrap()
        .add_field(Field::new("balance", FieldType::Uint).default_value(0u64))
        .unwrap()
        .add_field(Field::new("pings", FieldType::Uint).default_value(0u64))
        .unwrap()
        .build()
        .unwrap();

    let balance = Tracker::new(ping(), |req: &mut HandlerReq<'_>| {
        let value = req.values().u64("value")?;
        if value == 0 {
            return Err(Error::generic("zero ping"));
        }
        let account = req.get("account", &[Value::from(ACCOUNT)])?;
        req.entity_mut(account)?.add("balance", value)
    });
    let counter = Tracker::new(ping(), |req: &mut HandlerReq<'_>| {
        let account = req.get("account", &[Value::from(ACCOUNT)])?;
        req.entity_mut(account)?.incr("pings")
    });

    Provider::builder("accounts")
        .resource(Resource::new(table))
        .tracker(balance)
        .tracker(counter)
        .aggregate(Aggregate::new(
            "account_balance",
            "account",
            "balance",
            BlockBuckets::new(100).unwrap(),
        ))
        .build()
        .unwrap()
}

fn persisted_provider() -> (Provider, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let mut provider = provider();
    provider.init_storage(store.as_ref()).unwrap();
    provider.set_resolver(store.clone());
    (provider, store)
}

#[test]
fn test_handlers_share_one_entity_per_batch() {
    let mut provider = provider();
    let diffs = provider.process(&pings(1, &[2, 3])).unwrap();

    let accounts: Vec<_> = diffs.iter().filter(|d| d.table == "account").collect();
    assert_eq!(accounts.len(), 1);
    assert!(accounts[0].creation);
    assert_eq!(accounts[0].val("balance"), Some("5"));
    assert_eq!(accounts[0].val("pings"), Some("2"));
}

#[test]
fn test_bucketed_samples_follow_block_ranges() {
    let (mut provider, store) = persisted_provider();

    let first = provider.process(&pings(150, &[4])).unwrap();
    let sample = find_diff(
        &first,
        "account_balance",
        &[("id", ACCOUNT), ("bucket", "1")],
    )
    .unwrap();
    assert!(sample.creation);
    assert_eq!(sample.val("balance"), Some("4"));
    store.apply_changeset(&first, true).unwrap();

    let second = provider.process(&pings(250, &[1])).unwrap();
    let sample = find_diff(
        &second,
        "account_balance",
        &[("id", ACCOUNT), ("bucket", "2")],
    )
    .unwrap();
    assert!(sample.creation);
    assert_eq!(sample.val("balance"), Some("5"));
    assert!(find_diff(&second, "account_balance", &[("bucket", "1")]).is_none());
    store.apply_changeset(&second, true).unwrap();

    assert_eq!(
        store.value("account_balance", &[("id", ACCOUNT), ("bucket", "1")], "balance"),
        Some("4".to_string())
    );
    assert_eq!(store.row_count("account_balance"), 2);
}

#[test]
fn test_samples_within_one_bucket_update_in_place() {
    let (mut provider, store) = persisted_provider();

    let first = provider.process(&pings(110, &[1])).unwrap();
    store.apply_changeset(&first, true).unwrap();
    let second = provider.process(&pings(120, &[2])).unwrap();
    let sample = find_diff(&second, "account_balance", &[("bucket", "1")]).unwrap();
    assert!(!sample.creation);
    assert_eq!(sample.val("balance"), Some("3"));
}

#[test]
fn test_unsorted_batch_is_rejected() {
    let mut provider = provider();
    let action = Action::new(1, vec![ping_log(1, 5), ping_log(1, 2)]);

    let err = provider.process(&action).unwrap_err();
    assert!(matches!(
        err,
        Error::UnsortedEvents {
            position: 1,
            previous: 5,
            found: 2,
            ..
        }
    ));

    let mut sorted = action.clone();
    sorted.sort_events();
    assert!(provider.process(&sorted).is_ok());
}

#[test]
fn test_failed_batch_yields_no_diffs() {
    let mut provider = provider();

    // the second of three handler invocations fails
    assert!(provider.process(&pings(1, &[7, 0, 7])).is_err());
    assert_eq!(provider.last_block(), None);

    // nothing from the aborted batch leaks into the next one
    let diffs = provider.process(&pings(1, &[1])).unwrap();
    let account = find_diff(&diffs, "account", &[("id", ACCOUNT)]).unwrap();
    assert!(account.creation);
    assert_eq!(account.val("balance"), Some("1"));
    assert_eq!(account.val("pings"), Some("1"));
}

#[test]
fn test_empty_batch_yields_empty_changeset() {
    let mut provider = provider();
    assert!(provider.process(&Action::new(3, Vec::new())).unwrap().is_empty());
    assert_eq!(provider.last_block(), Some(3));
}
