//! Seams to the chain and to per-table initialization.

use crate::entity::Entity;
use alloy_primitives::{Address, Bytes};
use blockstate_core::{Result, Value};

/// Read-only access to contract state.
pub trait ChainClient: Send + Sync {
    /// Executes a call against `to` with the given calldata at the latest block
    /// and returns the raw return data.
    fn call(&self, to: Address, input: &Bytes) -> Result<Bytes>;
}

/// Populates a newly created single-key entity, typically with static fields
/// read from the chain.
pub trait InitHook: Send + Sync {
    /// `key` is the decoded identity value. `client` is `None` when no chain
    /// client was configured.
    fn init(&self, key: &Value, client: Option<&dyn ChainClient>, entity: &mut Entity) -> Result<()>;
}

impl<F> InitHook for F
where
    F: Fn(&Value, Option<&dyn ChainClient>, &mut Entity) -> Result<()> + Send + Sync,
{
    fn init(&self, key: &Value, client: Option<&dyn ChainClient>, entity: &mut Entity) -> Result<()> {
        self(key, client, entity)
    }
}
