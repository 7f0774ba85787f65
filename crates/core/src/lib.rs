//! Blockstate Core - field types, values and schema definitions.
//!
//! This crate provides the foundational types of the blockstate engine:
//!
//! - `FieldType`: the closed set of field types (Address, Uint, Decimal) and their
//!   canonical text codec
//! - `Value`: native values accepted by `encode` and produced by `decode`
//! - `Decimal`: a decimal with a fixed scale and rounding policy
//! - `schema`: field and table definitions plus the `SchemaRegistry`
//! - `Error`: the error type shared by every blockstate crate
//!
//! # Example
//!
//! ```rust
//! use blockstate_core::{FieldType, Value};
//! use blockstate_core::schema::{Field, TableBuilder};
//!
//! let table = TableBuilder::new("token")
//!     .unwrap()
//!     .add_field(Field::new("address", FieldType::Address).id())
//!     .unwrap()
//!     .add_field(Field::new("numPairs", FieldType::Uint).default_value(0u64))
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let field = table.get_field("numPairs").unwrap();
//! assert_eq!(field.encode(&Value::from(3u64)).unwrap(), "3");
//! assert_eq!(field.decode("3").unwrap(), Value::from(3u64));
//! ```

mod decimal;
mod error;
pub mod schema;
mod types;
mod value;

pub use decimal::{Decimal, DECIMAL_SCALE};
pub use error::{Error, ErrorKind, Result};
pub use types::FieldType;
pub use value::Value;

pub use alloy_primitives::{Address, B256, U256};
pub use num_bigint::BigUint;
