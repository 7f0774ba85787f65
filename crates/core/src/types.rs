//! Field type definitions and their textual codec.
//!
//! Every stored value has one canonical string form. The same text is used to
//! detect changes in memory and to persist rows, so two values are equal exactly
//! when their encodings are.

use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::value::Value;
use core::fmt;
use num_bigint::BigUint;

/// Supported field types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Opaque identity string (an on-chain address or any other text key)
    Address,
    /// Unsigned integer of arbitrary width
    Uint,
    /// Signed decimal with 18 fractional digits
    Decimal,
}

impl FieldType {
    /// Returns the lowercase name of this type.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Address => "address",
            FieldType::Uint => "uint",
            FieldType::Decimal => "decimal",
        }
    }

    /// Returns whether the arithmetic helpers apply to this type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Uint | FieldType::Decimal)
    }

    /// Encodes a native value into its canonical text.
    pub fn encode(&self, value: &Value) -> Result<String> {
        match (self, value) {
            (FieldType::Address, Value::Text(s)) => Ok(s.clone()),
            (FieldType::Address, Value::Address(addr)) => Ok(addr.to_checksum(None)),
            (FieldType::Uint, Value::Uint(n)) => Ok(n.to_str_radix(10)),
            (FieldType::Decimal, Value::Decimal(d)) => Ok(d.to_string()),
            (field_type, other) => Err(Error::type_mismatch(*field_type, other.kind())),
        }
    }

    /// Decodes canonical text back into a native value.
    pub fn decode(&self, raw: &str) -> Result<Value> {
        match self {
            FieldType::Address => Ok(Value::Text(raw.to_string())),
            FieldType::Uint => parse_uint(raw).map(Value::Uint),
            FieldType::Decimal => raw.parse::<Decimal>().map(Value::Decimal),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses a canonical base-10 literal: digits only, no leading zeros.
fn parse_uint(raw: &str) -> Result<BigUint> {
    let canonical = !raw.is_empty()
        && raw.bytes().all(|b| b.is_ascii_digit())
        && (raw == "0" || !raw.starts_with('0'));
    if !canonical {
        return Err(Error::parse(FieldType::Uint, raw));
    }
    BigUint::parse_bytes(raw.as_bytes(), 10).ok_or_else(|| Error::parse(FieldType::Uint, raw))
}
