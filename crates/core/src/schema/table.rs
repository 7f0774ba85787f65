//! Table definition for blockstate schemas.

use super::field::Field;
use crate::error::{Error, Result};

/// A table definition: a name and an ordered list of fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    /// Table name.
    name: String,
    /// Field definitions, in declaration order.
    fields: Vec<Field>,
    /// Positions of the identity fields, in declaration order.
    id_positions: Vec<usize>,
}

impl Table {
    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fields.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Gets a field by name.
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Gets a field by name, failing with `FieldNotFound`.
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.get_field(name)
            .ok_or_else(|| Error::field_not_found(&self.name, name))
    }

    /// Returns whether a field with this name exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// Returns the identity fields, in declaration order.
    pub fn id_fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.id_positions.iter().map(move |&i| &self.fields[i])
    }

    /// Returns the number of identity fields.
    #[inline]
    pub fn id_count(&self) -> usize {
        self.id_positions.len()
    }

    /// Returns the fields that declare a default value.
    pub fn defaults(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter().filter(|f| f.get_default_value().is_some())
    }
}

/// Builder for creating table definitions.
pub struct TableBuilder {
    name: String,
    fields: Vec<Field>,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_identifier("table", &name)?;
        Ok(Self {
            name,
            fields: Vec::new(),
        })
    }

    /// Table and field names become storage identifiers: ASCII letters, digits
    /// and `_`, never starting with a digit.
    fn check_identifier(kind: &str, name: &str) -> Result<()> {
        let Some(first) = name.chars().next() else {
            return Err(Error::invalid_schema(format!("{} name is empty", kind)));
        };
        if first.is_ascii_digit() {
            return Err(Error::invalid_schema(format!(
                "{} name {:?} starts with a digit",
                kind, name
            )));
        }
        if let Some(bad) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
            return Err(Error::invalid_schema(format!(
                "{} name {:?} has {:?}, only ASCII letters, digits and _ are allowed",
                kind, name, bad
            )));
        }
        Ok(())
    }

    /// Adds a field to the table.
    pub fn add_field(mut self, field: Field) -> Result<Self> {
        Self::check_identifier("field", field.name())?;
        if self.fields.iter().any(|f| f.name() == field.name()) {
            return Err(Error::invalid_schema(format!(
                "Field already exists: {}.{}",
                self.name,
                field.name()
            )));
        }
        self.fields.push(field);
        Ok(self)
    }

    /// Adds several fields in order.
    pub fn add_fields(self, fields: impl IntoIterator<Item = Field>) -> Result<Self> {
        fields
            .into_iter()
            .try_fold(self, |builder, field| builder.add_field(field))
    }

    /// Builds the table definition.
    pub fn build(self) -> Result<Table> {
        let id_positions: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_id())
            .map(|(i, _)| i)
            .collect();

        if id_positions.is_empty() {
            return Err(Error::invalid_schema(format!(
                "Table {} has no id field",
                self.name
            )));
        }

        for field in &self.fields {
            if field.is_id() && field.get_default_value().is_some() {
                return Err(Error::invalid_schema(format!(
                    "Id field cannot have a default: {}.{}",
                    self.name,
                    field.name()
                )));
            }
            field.encoded_default()?;
        }

        Ok(Table {
            name: self.name,
            fields: self.fields,
            id_positions,
        })
    }
}
