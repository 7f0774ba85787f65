//! Indexer configuration.

use blockstate_core::{Error, Result};
use serde::Deserialize;
use std::str::FromStr;

const ENV_CACHE_CAPACITY: &str = "BLOCKSTATE_CACHE_CAPACITY";
const ENV_STRICT_BLOCK_ORDER: &str = "BLOCKSTATE_STRICT_BLOCK_ORDER";
const ENV_MAX_RETRIES: &str = "BLOCKSTATE_MAX_RETRIES";

/// Settings shared by a provider and the runner driving it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerConfig {
    /// Capacity of the recently-used entity cache.
    pub cache_capacity: usize,
    /// Reject batches whose block number does not increase.
    pub strict_block_order: bool,
    /// Attempts made on a failing batch before giving up.
    pub max_retries: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 10_000,
            strict_block_order: true,
            max_retries: 3,
        }
    }
}

impl IndexerConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| Error::config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from environment variables.
    ///
    /// - `BLOCKSTATE_CACHE_CAPACITY` (default 10000)
    /// - `BLOCKSTATE_STRICT_BLOCK_ORDER` (default true)
    /// - `BLOCKSTATE_MAX_RETRIES` (default 3)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            cache_capacity: parse_var(&lookup, ENV_CACHE_CAPACITY)?
                .unwrap_or(defaults.cache_capacity),
            strict_block_order: parse_var(&lookup, ENV_STRICT_BLOCK_ORDER)?
                .unwrap_or(defaults.strict_block_order),
            max_retries: parse_var(&lookup, ENV_MAX_RETRIES)?.unwrap_or(defaults.max_retries),
        };
        config.validate()?;
        tracing::debug!(
            cache_capacity = config.cache_capacity,
            strict_block_order = config.strict_block_order,
            max_retries = config.max_retries,
            "indexer configuration loaded"
        );
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(Error::config("cache_capacity must be at least 1"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| Error::config(format!("{}: invalid value {:?}", key, raw)))
}
