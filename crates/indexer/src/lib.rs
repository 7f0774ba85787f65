//! Blockstate Indexer - turns ordered batches of event logs into changesets.
//!
//! A [`Provider`] bundles tables, event [`Tracker`]s and bucketed
//! [`Aggregate`]s. Each call to [`Provider::process`] runs every tracker, then
//! every aggregate, against a fresh batch context and returns the resulting
//! changeset. A failing batch yields an error and no diffs.
//!
//! # Example
//!
//! ```rust
//! use blockstate_core::schema::{Field, TableBuilder};
//! use blockstate_core::{FieldType, Value};
//! use blockstate_indexer::{AbiEvent, Action, HandlerReq, Provider, Resource, Tracker};
//!
//! let table = TableBuilder::new("counter").unwrap()
//!     .add_field(Field::new("id", FieldType::Address).id()).unwrap()
//!     .add_field(Field::new("pings", FieldType::Uint).default_value(0u64)).unwrap()
//!     .build().unwrap();
//!
//! let ping = AbiEvent::parse("Ping()").unwrap();
//! let mut provider = Provider::builder("pings")
//!     .resource(Resource::new(table))
//!     .tracker(Tracker::new(ping.clone(), |req: &mut HandlerReq<'_>| {
//!         let counter = req.get("counter", &[Value::from("0")])?;
//!         req.entity_mut(counter)?.incr("pings")
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let log = ping.encode_log(Default::default(), &[]).unwrap();
//! let diffs = provider.process(&Action::new(1, vec![log])).unwrap();
//! assert_eq!(diffs[0].val("pings"), Some("1"));
//! ```

pub mod abi;
mod aggregate;
mod caller;
mod config;
mod event;
mod filter;
mod pipeline;
mod provider;
mod registry;
mod runner;
mod tracker;

pub use abi::{selector, AbiEvent, AbiParam, EventValues, ParamKind, Token};
pub use aggregate::{Aggregate, BlockBuckets, BucketFn, BUCKET_FIELD};
pub use caller::{AbiString, AbiUint, Bytes32String, Caller, ContractCaller, ReturnDecoder};
pub use config::IndexerConfig;
pub use event::{group_by_block, Action, Event};
pub use filter::{EventSource, LogFilter};
pub use pipeline::{Pipeline, Stage};
pub use provider::{Provider, ProviderBuilder, Resource};
pub use registry::ProviderRegistry;
pub use runner::BatchRunner;
pub use tracker::{EventType, Handler, HandlerReq, Tracker};
