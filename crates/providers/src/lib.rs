//! Blockstate Providers - builtin providers and their registry.

pub mod amm;

use blockstate_core::Result;
use blockstate_indexer::ProviderRegistry;

/// Returns a registry holding every builtin provider.
pub fn builtin_registry() -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register(amm::NAME, amm::provider)?;
    Ok(registry)
}
