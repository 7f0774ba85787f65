//! Blockstate Storage - entity lifecycle and batch diffing.
//!
//! This crate provides the stateful half of the engine:
//!
//! - `Entity`: one logical row with committed and pending values
//! - `RecentCache`: bounded LRU of committed entities shared across batches
//! - `Snapshot`: the batch context that resolves identities and computes the
//!   changeset
//! - `Diff`/`Changeset`: what storage receives at the end of a batch
//! - `StateResolver`/`StateStore`: seams to persisted state, with `MemoryStore`
//!   as an in-memory implementation
//! - `ChainClient`/`InitHook`: seams to the chain for entity initialization
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use blockstate_core::schema::{Field, SchemaRegistry, TableBuilder};
//! use blockstate_core::{FieldType, Value};
//! use blockstate_storage::Snapshot;
//!
//! let mut schemas = SchemaRegistry::new();
//! schemas
//!     .register(
//!         TableBuilder::new("token")
//!             .unwrap()
//!             .add_field(Field::new("address", FieldType::Address).id())
//!             .unwrap()
//!             .add_field(Field::new("numPairs", FieldType::Uint).default_value(0u64))
//!             .unwrap()
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let mut snap = Snapshot::new(Arc::new(schemas), 128).unwrap();
//! snap.begin(1);
//! let token = snap.get("token", &[Value::from("0xa")]).unwrap();
//! snap.entity_mut(token).unwrap().incr("numPairs").unwrap();
//!
//! let changeset = snap.save();
//! assert_eq!(changeset.len(), 1);
//! assert_eq!(changeset[0].val("numPairs"), Some("1"));
//! ```

pub mod cache;
pub mod client;
pub mod diff;
pub mod entity;
pub mod memory;
pub mod resolver;
pub mod snapshot;

pub use cache::RecentCache;
pub use client::{ChainClient, InitHook};
pub use diff::{find_diff, Changeset, Diff};
pub use entity::{Entity, EntityId};
pub use memory::MemoryStore;
pub use resolver::{Attributes, StateResolver, StateStore};
pub use snapshot::{attributes, EntityRef, Snapshot};
