//! Entities: one logical row with change tracking.
//!
//! An entity keeps three maps of encoded values:
//!
//! - `keys`: the identity fields, fixed for the entity's lifetime
//! - `committed`: the last values known to be persisted
//! - `pending`: values written during the current batch
//!
//! Reads consult `pending` first, then `committed`. Folding an entity moves
//! `pending` into `committed` and yields at most one [`Diff`].

use crate::diff::Diff;
use crate::resolver::Attributes;
use alloy_primitives::{hex, keccak256, B256};
use blockstate_core::schema::Table;
use blockstate_core::{BigUint, Error, FieldType, Result, Value};
use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Deterministic identity of an entity.
///
/// Keccak-256 over the table name followed by every encoded identity value, in
/// field declaration order. Each part is prefixed with its byte length so that
/// `("ab", "c")` and `("a", "bc")` never collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(B256);

impl EntityId {
    /// Derives the identity from a table name and its encoded key values.
    pub fn derive<'a>(table: &str, encoded_keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut buf = Vec::with_capacity(64);
        push_part(&mut buf, table.as_bytes());
        for key in encoded_keys {
            push_part(&mut buf, key.as_bytes());
        }
        Self(keccak256(&buf))
    }

    /// Returns the raw hash.
    #[inline]
    pub fn as_b256(&self) -> &B256 {
        &self.0
    }
}

fn push_part(buf: &mut Vec<u8>, part: &[u8]) {
    buf.extend_from_slice(&(part.len() as u32).to_be_bytes());
    buf.extend_from_slice(part);
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_prefixed(self.0))
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self)
    }
}

#[derive(Clone, Copy)]
enum Op {
    Add,
    Sub,
}

/// One logical row of a table.
#[derive(Clone, Debug)]
pub struct Entity {
    table: Arc<Table>,
    id: EntityId,
    created: bool,
    keys: BTreeMap<String, String>,
    committed: BTreeMap<String, String>,
    pending: BTreeMap<String, String>,
}

impl Entity {
    /// Creates an entity that has never been persisted.
    pub fn new(table: Arc<Table>, id: EntityId, keys: BTreeMap<String, String>) -> Self {
        Self {
            table,
            id,
            created: true,
            keys,
            committed: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    /// Creates an entity from a persisted row. Identity fields in `row` are
    /// ignored; they are already known from `keys`.
    pub fn fetched(
        table: Arc<Table>,
        id: EntityId,
        keys: BTreeMap<String, String>,
        row: Attributes,
    ) -> Self {
        let committed = row
            .into_iter()
            .filter(|(name, _)| !keys.contains_key(name))
            .collect();
        Self {
            table,
            id,
            created: false,
            keys,
            committed,
            pending: BTreeMap::new(),
        }
    }

    /// Returns the table name.
    #[inline]
    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    /// Returns the table schema.
    #[inline]
    pub fn schema(&self) -> &Arc<Table> {
        &self.table
    }

    /// Returns the identity.
    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns true until the entity has been folded into a diff once.
    #[inline]
    pub fn is_new(&self) -> bool {
        self.created
    }

    /// Returns the encoded identity values.
    #[inline]
    pub fn keys(&self) -> &BTreeMap<String, String> {
        &self.keys
    }

    /// Returns the values written during the current batch.
    #[inline]
    pub fn pending(&self) -> &BTreeMap<String, String> {
        &self.pending
    }

    /// Returns the last persisted values.
    #[inline]
    pub fn committed(&self) -> &BTreeMap<String, String> {
        &self.committed
    }

    /// Returns true if any field was written during the current batch.
    #[inline]
    pub fn has_changed(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns the pending encoded value of a field, if it changed this batch.
    pub fn changed_value(&self, field: &str) -> Option<&str> {
        self.pending.get(field).map(String::as_str)
    }

    /// Returns the effective encoded value of a field.
    pub fn raw(&self, field: &str) -> Option<&str> {
        self.pending
            .get(field)
            .or_else(|| self.committed.get(field))
            .or_else(|| self.keys.get(field))
            .map(String::as_str)
    }

    /// Reads a field, returning `None` if it has no value yet.
    pub fn get_opt(&self, field: &str) -> Result<Option<Value>> {
        let def = self.table.field(field)?;
        match self.raw(field) {
            Some(raw) => def
                .decode(raw)
                .map(Some)
                .map_err(|e| Error::get_decode(self.table.name(), field, e)),
            None => Ok(None),
        }
    }

    /// Reads a field. A field without a value is `ValueNotSet`.
    pub fn get(&self, field: &str) -> Result<Value> {
        self.get_opt(field)?
            .ok_or_else(|| Error::value_not_set(self.table.name(), field))
    }

    /// Reads a `Uint` field that fits in 64 bits.
    pub fn get_u64(&self, field: &str) -> Result<u64> {
        let value = self.get(field)?;
        value.as_u64().ok_or_else(|| {
            Error::arithmetic(format!(
                "{}.{} = {:?} does not fit in u64",
                self.table.name(),
                field,
                value
            ))
        })
    }

    /// Writes a field.
    ///
    /// Writing the value the field already holds is a no-op. Writing the
    /// committed value back drops any pending write for that field.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let def = self.table.field(field)?;
        if def.is_id() {
            return Err(Error::generic(format!(
                "{}.{} is an id field and cannot be written",
                self.table.name(),
                field
            )));
        }
        let encoded = def
            .encode(&value)
            .map_err(|e| Error::set_encode(self.table.name(), field, e))?;

        if self.committed.get(field) == Some(&encoded) {
            self.pending.remove(field);
            return Ok(());
        }
        if self.pending.get(field) == Some(&encoded) {
            return Ok(());
        }
        if def.is_static() && self.committed.contains_key(field) {
            warn!(
                table = self.table.name(),
                field,
                entity = %self.id,
                "static field rewritten on persisted entity"
            );
        }
        self.pending.insert(field.to_string(), encoded);
        Ok(())
    }

    /// Adds one to a `Uint` field.
    pub fn incr(&mut self, field: &str) -> Result<()> {
        self.add(field, 1u64)
    }

    /// Adds `delta` to a numeric field. The delta's type must match the field.
    pub fn add(&mut self, field: &str, delta: impl Into<Value>) -> Result<()> {
        self.apply(field, delta.into(), Op::Add)
    }

    /// Subtracts `delta` from a numeric field. `Uint` fields cannot go below zero.
    pub fn sub(&mut self, field: &str, delta: impl Into<Value>) -> Result<()> {
        self.apply(field, delta.into(), Op::Sub)
    }

    fn apply(&mut self, field: &str, delta: Value, op: Op) -> Result<()> {
        let declared = self.table.field(field)?.field_type();
        let delta_type = match &delta {
            Value::Uint(_) => FieldType::Uint,
            Value::Decimal(_) => FieldType::Decimal,
            other => return Err(Error::type_mismatch(declared, other.kind())),
        };
        if declared != delta_type {
            return Err(Error::field_bad_type(
                self.table.name(),
                field,
                declared,
                delta_type,
            ));
        }

        let current = self.get(field)?;
        let next = match (current, delta) {
            (Value::Uint(a), Value::Uint(b)) => Value::Uint(uint_apply(a, b, op)?),
            (Value::Decimal(a), Value::Decimal(b)) => Value::Decimal(match op {
                Op::Add => &a + &b,
                Op::Sub => &a - &b,
            }),
            (current, _) => {
                return Err(Error::get_decode(
                    self.table.name(),
                    field,
                    Error::type_mismatch(declared, current.kind()),
                ))
            }
        };
        self.set(field, next)
    }

    /// Folds pending writes into the committed values.
    ///
    /// Returns the diff describing the batch's net effect, or `None` if nothing
    /// was written. Afterwards the entity is no longer new.
    pub fn fold(&mut self) -> Option<Diff> {
        if self.pending.is_empty() {
            return None;
        }
        let vals = std::mem::take(&mut self.pending);
        let diff = Diff {
            table: self.table.name().to_string(),
            creation: self.created,
            keys: self.keys.clone(),
            vals: vals.clone(),
        };
        self.committed.extend(vals);
        self.created = false;
        Some(diff)
    }

    /// Drops every pending write.
    pub fn revert(&mut self) {
        self.pending.clear();
    }
}

fn uint_apply(a: BigUint, b: BigUint, op: Op) -> Result<BigUint> {
    match op {
        Op::Add => Ok(a + b),
        Op::Sub if b > a => Err(Error::arithmetic(format!("{} - {} underflows", a, b))),
        Op::Sub => Ok(a - b),
    }
}
