//! Native values accepted and produced by the field codec.

use crate::decimal::Decimal;
use alloy_primitives::{Address, U256};
use num_bigint::BigUint;
use num_traits::ToPrimitive;

/// A native value that can be written to or read from a field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// Pre-formatted text (address fields, free-form identifiers)
    Text(String),
    /// An on-chain address, encoded in checksummed form
    Address(Address),
    /// Unsigned integer of arbitrary width
    Uint(BigUint),
    /// Bounded-scale decimal
    Decimal(Decimal),
}

impl Value {
    /// Returns a short name of the runtime shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Address(_) => "address",
            Value::Uint(_) => "uint",
            Value::Decimal(_) => "decimal",
        }
    }

    /// Returns the text if this is `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the address, parsing `Text` if needed.
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Address(addr) => Some(*addr),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Returns a reference to the integer if this is `Uint`.
    pub fn as_uint(&self) -> Option<&BigUint> {
        match self {
            Value::Uint(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the integer as `u64` if it is a `Uint` that fits.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_uint().and_then(|n| n.to_u64())
    }

    /// Returns the decimal if this is `Decimal`.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(d.clone()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Address> for Value {
    fn from(value: Address) -> Self {
        Value::Address(value)
    }
}

impl From<BigUint> for Value {
    fn from(value: BigUint) -> Self {
        Value::Uint(value)
    }
}

impl From<U256> for Value {
    fn from(value: U256) -> Self {
        Value::Uint(BigUint::from_bytes_be(&value.to_be_bytes::<32>()))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Uint(BigUint::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Uint(BigUint::from(value))
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::Uint(BigUint::from(value))
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}
