//! Error types for blockstate.
//!
//! Every failure is scoped to one entity or one batch. None of them is fatal to
//! the process; a batch that returns an error simply produced nothing.

use crate::types::FieldType;
use thiserror::Error as ThisError;

/// Result type alias for blockstate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], stable across variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SetEncode,
    GetDecode,
    ContractInit,
    RecoverObject,
    FieldNotFound,
    FieldBadType,
    SchemaNotFound,
    IncorrectIdFields,
    Generic,
}

/// Error types for blockstate operations.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A native value does not have the shape its field type requires.
    #[error("type mismatch: {field_type} field cannot hold a {got} value")]
    TypeMismatch {
        field_type: FieldType,
        got: &'static str,
    },
    /// Stored text is not a valid literal for its field type.
    #[error("cannot parse {input:?} as {field_type}")]
    Parse { field_type: FieldType, input: String },

    /// Encoding a value during `set` failed.
    #[error("failed to encode {table}.{field}: {source}")]
    SetEncode {
        table: String,
        field: String,
        #[source]
        source: Box<Error>,
    },
    /// Decoding a stored value during `get` failed.
    #[error("failed to decode {table}.{field}: {source}")]
    GetDecode {
        table: String,
        field: String,
        #[source]
        source: Box<Error>,
    },
    /// The init hook of a newly created entity failed.
    #[error("init hook for {table} {key} failed: {source}")]
    ContractInit {
        table: String,
        key: String,
        #[source]
        source: Box<Error>,
    },
    /// The state resolver could not be queried.
    #[error("failed to recover {table} object: {source}")]
    RecoverObject {
        table: String,
        #[source]
        source: Box<Error>,
    },

    /// Field is not part of the table schema.
    #[error("field {field} not found in table {table}")]
    FieldNotFound { table: String, field: String },
    /// Field exists but holds no value yet.
    #[error("field {table}.{field} has no value")]
    ValueNotSet { table: String, field: String },
    /// Arithmetic helper used against a field of another type.
    #[error("field {table}.{field} is {found}, expected {expected}")]
    FieldBadType {
        table: String,
        field: String,
        expected: FieldType,
        found: FieldType,
    },
    /// Table is not registered.
    #[error("schema not found: {table}")]
    SchemaNotFound { table: String },
    /// Wrong number of identity values supplied for a table.
    #[error("table {table} has {expected} id fields, got {got} values")]
    IncorrectIdFields {
        table: String,
        expected: usize,
        got: usize,
    },
    /// Invalid table or field definition.
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    /// Events of a batch are not sorted by log index.
    #[error("block {block}: event {position} has log index {found} after {previous}")]
    UnsortedEvents {
        block: u64,
        position: usize,
        previous: u64,
        found: u64,
    },
    /// Batch delivered at or below the last processed block.
    #[error("block {got} delivered after block {last}")]
    BlockOutOfOrder { last: u64, got: u64 },
    /// An event could not be decoded into its declared shape.
    #[error("cannot decode event {event}: {message}")]
    EventDecode { event: String, message: String },

    /// Overflow, underflow or division by zero.
    #[error("arithmetic error: {message}")]
    Arithmetic { message: String },
    /// Entity handle used outside the batch that produced it.
    #[error("entity handle from batch {handle} used in batch {current}")]
    StaleEntity { handle: u64, current: u64 },

    /// Failure reported by a storage backend.
    #[error("storage error: {message}")]
    Storage { message: String },
    /// Failure reported by the chain client.
    #[error("rpc error: {message}")]
    Rpc { message: String },
    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config { message: String },
    /// Any other failure.
    #[error("{message}")]
    Generic { message: String },
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SetEncode { .. } => ErrorKind::SetEncode,
            Error::GetDecode { .. } => ErrorKind::GetDecode,
            Error::ContractInit { .. } => ErrorKind::ContractInit,
            Error::RecoverObject { .. } => ErrorKind::RecoverObject,
            Error::FieldNotFound { .. } | Error::ValueNotSet { .. } => ErrorKind::FieldNotFound,
            Error::FieldBadType { .. } => ErrorKind::FieldBadType,
            Error::SchemaNotFound { .. } => ErrorKind::SchemaNotFound,
            Error::IncorrectIdFields { .. } => ErrorKind::IncorrectIdFields,
            _ => ErrorKind::Generic,
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(field_type: FieldType, got: &'static str) -> Self {
        Error::TypeMismatch { field_type, got }
    }

    /// Creates a parse error.
    pub fn parse(field_type: FieldType, input: impl Into<String>) -> Self {
        Error::Parse {
            field_type,
            input: input.into(),
        }
    }

    /// Wraps an encode failure for `table.field`.
    pub fn set_encode(table: impl Into<String>, field: impl Into<String>, source: Error) -> Self {
        Error::SetEncode {
            table: table.into(),
            field: field.into(),
            source: Box::new(source),
        }
    }

    /// Wraps a decode failure for `table.field`.
    pub fn get_decode(table: impl Into<String>, field: impl Into<String>, source: Error) -> Self {
        Error::GetDecode {
            table: table.into(),
            field: field.into(),
            source: Box::new(source),
        }
    }

    /// Wraps an init hook failure.
    pub fn contract_init(table: impl Into<String>, key: impl Into<String>, source: Error) -> Self {
        Error::ContractInit {
            table: table.into(),
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Wraps a resolver failure.
    pub fn recover_object(table: impl Into<String>, source: Error) -> Self {
        Error::RecoverObject {
            table: table.into(),
            source: Box::new(source),
        }
    }

    /// Creates a field not found error.
    pub fn field_not_found(table: impl Into<String>, field: impl Into<String>) -> Self {
        Error::FieldNotFound {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Creates a value not set error.
    pub fn value_not_set(table: impl Into<String>, field: impl Into<String>) -> Self {
        Error::ValueNotSet {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Creates a field bad type error.
    pub fn field_bad_type(
        table: impl Into<String>,
        field: impl Into<String>,
        expected: FieldType,
        found: FieldType,
    ) -> Self {
        Error::FieldBadType {
            table: table.into(),
            field: field.into(),
            expected,
            found,
        }
    }

    /// Creates a schema not found error.
    pub fn schema_not_found(table: impl Into<String>) -> Self {
        Error::SchemaNotFound {
            table: table.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an arithmetic error.
    pub fn arithmetic(message: impl Into<String>) -> Self {
        Error::Arithmetic {
            message: message.into(),
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
        }
    }

    /// Creates an rpc error.
    pub fn rpc(message: impl Into<String>) -> Self {
        Error::Rpc {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a generic error.
    pub fn generic(message: impl Into<String>) -> Self {
        Error::Generic {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::type_mismatch(FieldType::Uint, "decimal");
        assert!(err.to_string().contains("type mismatch"));

        let err = Error::field_not_found("token", "symbol");
        assert!(err.to_string().contains("token"));
        assert!(err.to_string().contains("symbol"));

        let err = Error::schema_not_found("pair");
        assert!(err.to_string().contains("pair"));
    }

    #[test]
    fn test_error_kind() {
        let inner = Error::parse(FieldType::Uint, "-1");
        assert_eq!(inner.kind(), ErrorKind::Generic);

        let err = Error::set_encode("token", "decimals", inner);
        assert_eq!(err.kind(), ErrorKind::SetEncode);

        assert_eq!(
            Error::value_not_set("token", "name").kind(),
            ErrorKind::FieldNotFound
        );
        assert_eq!(
            Error::IncorrectIdFields {
                table: "pair".into(),
                expected: 1,
                got: 2
            }
            .kind(),
            ErrorKind::IncorrectIdFields
        );
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as _;

        let err = Error::recover_object("token", Error::storage("connection reset"));
        let source = err.source().unwrap();
        assert!(source.to_string().contains("connection reset"));
    }
}
