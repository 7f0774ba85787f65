//! Raw event logs and per-block batches.

use alloy_primitives::{Address, Bytes, B256};
use blockstate_core::{Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// One event log as emitted by a contract.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics; the first one identifies the event shape.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed parameters.
    pub data: Bytes,
    pub block_number: u64,
    pub block_hash: B256,
    pub tx_hash: B256,
    pub tx_index: u64,
    /// Position of the log within its block.
    pub log_index: u64,
    /// True if the log was dropped by a chain reorganization.
    pub removed: bool,
}

impl Event {
    /// Returns the event signature topic, if any.
    #[inline]
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// All events of one block, in log index order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Action {
    pub block_number: u64,
    pub events: Vec<Event>,
}

impl Action {
    /// Creates an action for `block_number`.
    pub fn new(block_number: u64, events: Vec<Event>) -> Self {
        Self {
            block_number,
            events,
        }
    }

    /// Sorts the events by log index. Equal indexes keep their order.
    pub fn sort_events(&mut self) {
        self.events.sort_by_key(|e| e.log_index);
    }

    /// Checks that log indexes never decrease.
    pub fn ensure_sorted(&self) -> Result<()> {
        for (position, pair) in self.events.windows(2).enumerate() {
            if pair[1].log_index < pair[0].log_index {
                return Err(Error::UnsortedEvents {
                    block: self.block_number,
                    position: position + 1,
                    previous: pair[0].log_index,
                    found: pair[1].log_index,
                });
            }
        }
        Ok(())
    }

    /// Returns the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the block carried no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Splits a flat list of logs into one sorted action per block, in block order.
/// Removed logs are dropped.
pub fn group_by_block(events: impl IntoIterator<Item = Event>) -> Vec<Action> {
    let mut blocks: BTreeMap<u64, Vec<Event>> = BTreeMap::new();
    for event in events {
        if event.removed {
            debug!(block = event.block_number, log_index = event.log_index, "dropping removed log");
            continue;
        }
        blocks.entry(event.block_number).or_default().push(event);
    }
    blocks
        .into_iter()
        .map(|(block_number, events)| {
            let mut action = Action::new(block_number, events);
            action.sort_events();
            action
        })
        .collect()
}
