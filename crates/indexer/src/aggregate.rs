//! Bucketed aggregates.
//!
//! An aggregate samples one field of a source table once per bucket of block
//! numbers. Its rows are keyed by the source identity plus a synthetic
//! `bucket` field, and hold the value the field took on during the last batch
//! of that bucket.

use crate::event::Action;
use crate::pipeline::Stage;
use blockstate_core::schema::{Field, Table, TableBuilder};
use blockstate_core::{Error, FieldType, Result, Value};
use blockstate_storage::Snapshot;
use std::sync::Arc;
use tracing::debug;

/// Name of the synthetic bucket identity field.
pub const BUCKET_FIELD: &str = "bucket";

/// Maps a block number onto its bucket key.
pub trait BucketFn: Send + Sync {
    fn bucket(&self, block: u64) -> u64;
}

impl<F> BucketFn for F
where
    F: Fn(u64) -> u64 + Send + Sync,
{
    fn bucket(&self, block: u64) -> u64 {
        self(block)
    }
}

/// Fixed-width block ranges: `block / size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockBuckets {
    size: u64,
}

impl BlockBuckets {
    /// Creates buckets of `size` blocks. `size` must be at least 1.
    pub fn new(size: u64) -> Result<Self> {
        if size == 0 {
            return Err(Error::config("bucket size must be at least 1"));
        }
        Ok(Self { size })
    }

    /// One bucket per block.
    pub fn every_block() -> Self {
        Self { size: 1 }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl BucketFn for BlockBuckets {
    #[inline]
    fn bucket(&self, block: u64) -> u64 {
        block / self.size
    }
}

/// A bucketed rollup of one source field.
pub struct Aggregate {
    name: String,
    source: String,
    field: String,
    buckets: Arc<dyn BucketFn>,
}

impl Aggregate {
    /// Declares an aggregate table `name` sampling `source.field`.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        field: impl Into<String>,
        buckets: impl BucketFn + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            field: field.into(),
            buckets: Arc::new(buckets),
        }
    }

    /// Returns the derived table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the bucket key of a block.
    pub fn bucket_of(&self, block: u64) -> u64 {
        self.buckets.bucket(block)
    }

    /// Builds the derived table: the source identity fields, the indexed field
    /// and the bucket field.
    pub fn derive_schema(&self, source: &Table) -> Result<Table> {
        if source.name() != self.source {
            return Err(Error::invalid_schema(format!(
                "aggregate {} reads {}, got {}",
                self.name,
                self.source,
                source.name()
            )));
        }
        let indexed = source.field(&self.field)?;
        if indexed.is_id() {
            return Err(Error::invalid_schema(format!(
                "aggregate {}: {} is an identity field",
                self.name, self.field
            )));
        }

        let mut builder = TableBuilder::new(self.name.as_str())?;
        for id in source.id_fields() {
            builder = builder.add_field(id.plain().id())?;
        }
        builder
            .add_field(indexed.plain())?
            .add_field(Field::new(BUCKET_FIELD, FieldType::Uint).id())?
            .build()
    }
}

impl Stage for Aggregate {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, action: &Action, snapshot: &mut Snapshot) -> Result<()> {
        let bucket = self.bucket_of(action.block_number);
        let mut written = 0usize;

        for handle in snapshot.refs_for_table(&self.source) {
            let entity = snapshot.entity(handle)?;
            let Some(raw) = entity.changed_value(&self.field) else {
                continue;
            };
            let value = entity
                .schema()
                .field(&self.field)?
                .decode(raw)
                .map_err(|e| Error::get_decode(self.source.as_str(), self.field.as_str(), e))?;

            let mut ids = snapshot.id_values(handle)?;
            ids.push(Value::from(bucket));
            let sample = snapshot.get(&self.name, &ids)?;
            snapshot.entity_mut(sample)?.set(&self.field, value)?;
            written += 1;
        }

        if written > 0 {
            debug!(aggregate = %self.name, bucket, written, "bucket samples written");
        }
        Ok(())
    }
}
