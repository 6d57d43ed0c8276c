//! Field definition for layer schemas.

use crate::types::FieldType;
use alloc::string::String;

/// One attribute field of a layer schema.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDefn {
    /// Field name.
    name: String,
    /// Declared type.
    field_type: FieldType,
    /// Whether scans may skip this field.
    ignored: bool,
}

impl FieldDefn {
    /// Creates a new field definition.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            ignored: false,
        }
    }

    /// Marks this field as ignored.
    pub fn ignored(mut self, ignored: bool) -> Self {
        self.ignored = ignored;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    #[inline]
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub(crate) fn set_ignored(&mut self, ignored: bool) {
        self.ignored = ignored;
    }
}
