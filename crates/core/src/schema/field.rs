//! Field definition for blockstate table schemas.

use crate::error::{Error, Result};
use crate::types::FieldType;
use crate::value::Value;

/// Link from a field to a field of another table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub table: String,
    pub field: String,
}

/// A field definition in a table schema.
#[derive(Clone, Debug)]
pub struct Field {
    /// Field name.
    name: String,
    /// Declared type.
    field_type: FieldType,
    /// Whether this field is part of the entity identity.
    id: bool,
    /// Whether this field is written once at creation.
    static_field: bool,
    /// Value applied when the entity is created.
    default_value: Option<Value>,
    /// Optional link to another table.
    reference: Option<Reference>,
    /// Free-form documentation.
    description: Option<String>,
}

impl Field {
    /// Creates a new field definition.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            id: false,
            static_field: false,
            default_value: None,
            reference: None,
            description: None,
        }
    }

    /// Marks this field as an identity field.
    pub fn id(mut self) -> Self {
        self.id = true;
        self
    }

    /// Marks this field as static.
    ///
    /// Static fields are expected to be set once, at creation. Later writes are
    /// still applied but reported.
    pub fn static_field(mut self) -> Self {
        self.static_field = true;
        self
    }

    /// Sets the default value for this field.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Declares that this field references `table.field`.
    pub fn references(mut self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.reference = Some(Reference {
            table: table.into(),
            field: field.into(),
        });
        self
    }

    /// Sets the description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Returns a copy without identity, default or reference attributes.
    pub fn plain(&self) -> Self {
        Self::new(self.name.clone(), self.field_type)
    }

    /// Returns the field name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[inline]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns whether this field is part of the identity.
    #[inline]
    pub fn is_id(&self) -> bool {
        self.id
    }

    /// Returns whether this field is static.
    #[inline]
    pub fn is_static(&self) -> bool {
        self.static_field
    }

    /// Returns the default value, if any.
    #[inline]
    pub fn get_default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Returns the reference, if any.
    #[inline]
    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    /// Returns the description, if any.
    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Encodes a native value under this field's type.
    pub fn encode(&self, value: &Value) -> Result<String> {
        self.field_type.encode(value)
    }

    /// Decodes stored text under this field's type.
    pub fn decode(&self, raw: &str) -> Result<Value> {
        self.field_type.decode(raw)
    }

    /// Encodes the default value, if one is declared.
    pub fn encoded_default(&self) -> Result<Option<String>> {
        self.default_value
            .as_ref()
            .map(|v| {
                self.encode(v).map_err(|e| {
                    Error::invalid_schema(format!("default of {} is invalid: {}", self.name, e))
                })
            })
            .transpose()
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.field_type == other.field_type && self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Decimal;

    #[test]
    fn test_field_new() {
        let field = Field::new("address", FieldType::Address);
        assert_eq!(field.name(), "address");
        assert_eq!(field.field_type(), FieldType::Address);
        assert!(!field.is_id());
        assert!(!field.is_static());
        assert!(field.get_default_value().is_none());
    }

    #[test]
    fn test_field_builder() {
        let field = Field::new("token0", FieldType::Address)
            .static_field()
            .references("token", "address")
            .description("first token of the pair");

        assert!(field.is_static());
        assert_eq!(field.reference().unwrap().table, "token");
        assert_eq!(field.get_description(), Some("first token of the pair"));
    }

    #[test]
    fn test_field_encoded_default() {
        let field = Field::new("numPairs", FieldType::Uint).default_value(0u64);
        assert_eq!(field.encoded_default().unwrap(), Some("0".to_string()));

        let bad = Field::new("numPairs", FieldType::Uint).default_value(Decimal::ZERO);
        assert!(bad.encoded_default().is_err());

        let none = Field::new("name", FieldType::Address);
        assert_eq!(none.encoded_default().unwrap(), None);
    }

    #[test]
    fn test_field_plain() {
        let field = Field::new("address", FieldType::Address).id().default_value("x");
        let plain = field.plain();
        assert!(!plain.is_id());
        assert!(plain.get_default_value().is_none());
        assert_eq!(plain.name(), "address");
    }
}
