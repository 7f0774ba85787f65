//! Schema module for blockstate.
//!
//! This module contains the field and table definitions and the registry that
//! owns them.

mod field;
mod registry;
mod table;

pub use field::{Field, Reference};
pub use registry::SchemaRegistry;
pub use table::{Table, TableBuilder};
