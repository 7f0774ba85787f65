//! In-memory state store.
//!
//! Rows are kept per table, keyed by their identity values in field
//! declaration order. Changesets are staged against a copy of the tables and
//! swapped in only once every diff has been applied, so a failing diff leaves
//! the store untouched.

use crate::diff::Diff;
use crate::resolver::{Attributes, StateResolver, StateStore};
use blockstate_core::schema::Table;
use blockstate_core::{Error, FieldType, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone, Debug)]
struct StoredTable {
    columns: BTreeMap<String, FieldType>,
    id_columns: Vec<String>,
    rows: BTreeMap<Vec<String>, Attributes>,
}

impl StoredTable {
    fn row_key(&self, table: &str, keys: &Attributes) -> Result<Vec<String>> {
        self.id_columns
            .iter()
            .map(|column| {
                keys.get(column).cloned().ok_or_else(|| {
                    Error::storage(format!("{}: missing key column {}", table, column))
                })
            })
            .collect()
    }

    fn check_columns<'a>(&self, table: &str, names: impl Iterator<Item = &'a String>) -> Result<()> {
        for name in names {
            if !self.columns.contains_key(name) {
                return Err(Error::storage(format!("{}: unknown column {}", table, name)));
            }
        }
        Ok(())
    }
}

/// A `StateStore` that keeps everything in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, StoredTable>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the names of all tables.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Returns the number of rows in a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |t| t.rows.len())
    }

    /// Returns every row of a table, ordered by identity.
    pub fn rows(&self, table: &str) -> Vec<Attributes> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns a single value of a row.
    pub fn value(&self, table: &str, keys: &[(&str, &str)], column: &str) -> Option<String> {
        let keys: Attributes = keys
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.get_obj(table, &keys)
            .ok()
            .flatten()
            .and_then(|row| row.get(column).cloned())
    }

    fn apply_one(tables: &mut BTreeMap<String, StoredTable>, diff: &Diff) -> Result<()> {
        let stored = tables
            .get_mut(&diff.table)
            .ok_or_else(|| Error::storage(format!("table {} does not exist", diff.table)))?;
        stored.check_columns(&diff.table, diff.keys.keys())?;
        stored.check_columns(&diff.table, diff.vals.keys())?;
        let key = stored.row_key(&diff.table, &diff.keys)?;

        if diff.creation {
            if stored.rows.contains_key(&key) {
                return Err(Error::storage(format!(
                    "{}: row {:?} already exists",
                    diff.table, key
                )));
            }
            let mut row = diff.keys.clone();
            row.extend(diff.vals.iter().map(|(k, v)| (k.clone(), v.clone())));
            stored.rows.insert(key, row);
        } else {
            let row = stored.rows.get_mut(&key).ok_or_else(|| {
                Error::storage(format!("{}: row {:?} does not exist", diff.table, key))
            })?;
            row.extend(diff.vals.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(())
    }
}

impl StateResolver for MemoryStore {
    fn get_obj(&self, table: &str, keys: &Attributes) -> Result<Option<Attributes>> {
        let tables = self.tables.read();
        let stored = tables
            .get(table)
            .ok_or_else(|| Error::storage(format!("table {} does not exist", table)))?;
        let key = stored.row_key(table, keys)?;
        Ok(stored.rows.get(&key).cloned())
    }
}

impl StateStore for MemoryStore {
    fn upsert_table(&self, table: &Table) -> Result<()> {
        let mut tables = self.tables.write();
        let id_columns: Vec<String> = table.id_fields().map(|f| f.name().to_string()).collect();

        let Some(stored) = tables.get_mut(table.name()) else {
            debug!(table = table.name(), "creating table");
            let columns = table
                .fields()
                .iter()
                .map(|f| (f.name().to_string(), f.field_type()))
                .collect();
            tables.insert(
                table.name().to_string(),
                StoredTable {
                    columns,
                    id_columns,
                    rows: BTreeMap::new(),
                },
            );
            return Ok(());
        };

        if stored.id_columns != id_columns {
            return Err(Error::storage(format!(
                "{}: identity columns cannot change",
                table.name()
            )));
        }
        for field in table.fields() {
            match stored.columns.get(field.name()) {
                Some(existing) if *existing != field.field_type() => {
                    return Err(Error::storage(format!(
                        "{}.{}: cannot change type from {} to {}",
                        table.name(),
                        field.name(),
                        existing,
                        field.field_type()
                    )));
                }
                Some(_) => {}
                None => {
                    debug!(table = table.name(), column = field.name(), "adding column");
                    stored
                        .columns
                        .insert(field.name().to_string(), field.field_type());
                }
            }
        }
        Ok(())
    }

    fn apply_changeset(&self, diffs: &[Diff], commit: bool) -> Result<()> {
        let mut tables = self.tables.write();
        let mut staged = tables.clone();
        for diff in diffs {
            Self::apply_one(&mut staged, diff)?;
        }
        if commit {
            *tables = staged;
        }
        debug!(diffs = diffs.len(), commit, "changeset applied");
        Ok(())
    }
}
