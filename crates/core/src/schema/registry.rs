//! Registry of named tables.

use super::table::Table;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Holds every table a provider knows about, keyed by name.
///
/// Tables are shared as `Arc<Table>` so entities can keep a handle to their
/// schema without copying it.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    tables: BTreeMap<String, Arc<Table>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table. Names must be unique.
    pub fn register(&mut self, table: Table) -> Result<Arc<Table>> {
        let name = table.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(Error::invalid_schema(format!(
                "Table already exists: {}",
                name
            )));
        }
        let table = Arc::new(table);
        self.tables.insert(name, Arc::clone(&table));
        Ok(table)
    }

    /// Gets a table by name.
    pub fn get(&self, name: &str) -> Result<&Arc<Table>> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::schema_not_found(name))
    }

    /// Checks if a table exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Returns all tables ordered by name.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<Table>> + '_ {
        self.tables.values()
    }

    /// Returns the number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no table is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Checks that every field reference points at an existing table and field.
    pub fn validate_references(&self) -> Result<()> {
        for table in self.tables.values() {
            for field in table.fields() {
                let Some(reference) = field.reference() else {
                    continue;
                };
                let target = self.tables.get(&reference.table).ok_or_else(|| {
                    Error::invalid_schema(format!(
                        "{}.{} references unknown table {}",
                        table.name(),
                        field.name(),
                        reference.table
                    ))
                })?;
                if !target.has_field(&reference.field) {
                    return Err(Error::invalid_schema(format!(
                        "{}.{} references unknown field {}.{}",
                        table.name(),
                        field.name(),
                        reference.table,
                        reference.field
                    )));
                }
            }
        }
        Ok(())
    }
}
