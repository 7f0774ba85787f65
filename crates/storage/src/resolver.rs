//! Seams to persisted state.

use crate::diff::Diff;
use blockstate_core::schema::Table;
use blockstate_core::Result;
use std::collections::BTreeMap;

/// Encoded attributes of a persisted row: column name → canonical text.
pub type Attributes = BTreeMap<String, String>;

/// Point lookups of persisted entities.
pub trait StateResolver: Send + Sync {
    /// Returns the persisted row of `table` whose identity columns equal `keys`,
    /// or `None` if no such row exists.
    fn get_obj(&self, table: &str, keys: &Attributes) -> Result<Option<Attributes>>;
}

/// A resolver that can also create tables and apply changesets.
pub trait StateStore: StateResolver {
    /// Creates or migrates the storage for `table`. Calling it twice with the
    /// same definition is a no-op.
    fn upsert_table(&self, table: &Table) -> Result<()>;

    /// Applies every diff in one transaction. Creation diffs insert a row from
    /// keys and values, the others update values where the keys match. With
    /// `commit` false the changeset is validated and then dropped.
    fn apply_changeset(&self, diffs: &[Diff], commit: bool) -> Result<()>;
}
