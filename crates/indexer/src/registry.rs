//! Named provider factories.

use crate::provider::Provider;
use blockstate_core::{Error, Result};
use std::collections::BTreeMap;

type Factory = Box<dyn Fn() -> Result<Provider> + Send + Sync>;

/// Maps provider names onto factories. Built once at startup and passed to
/// whatever needs to instantiate providers.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Factory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory. Names must be unique.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn() -> Result<Provider> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::config(format!("provider {} is already registered", name)));
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Builds a fresh provider.
    pub fn build(&self, name: &str) -> Result<Provider> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::config(format!("unknown provider {}", name)))?;
        factory()
    }

    /// Returns the registered names in order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
