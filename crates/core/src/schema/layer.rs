//! Layer definition for featql schemas.

use super::field::FieldDefn;
use crate::error::{Error, Result};
use crate::special::{SpecialField, SPECIAL_FIELD_COUNT};
use crate::types::{FieldType, GeometryType};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// The schema of a layer: name, ordered fields and geometry type.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerDefn {
    name: String,
    fields: Vec<FieldDefn>,
    geometry_type: GeometryType,
    geometry_ignored: bool,
    style_ignored: bool,
}

impl LayerDefn {
    /// Creates a layer definition from already validated fields.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefn>, geometry_type: GeometryType) -> Self {
        Self {
            name: name.into(),
            fields,
            geometry_type,
            geometry_ignored: false,
            style_ignored: false,
        }
    }

    /// Returns the layer name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stored fields.
    #[inline]
    pub fn fields(&self) -> &[FieldDefn] {
        &self.fields
    }

    /// Returns the number of stored fields.
    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns a stored field by index.
    pub fn field(&self, index: usize) -> Option<&FieldDefn> {
        self.fields.get(index)
    }

    /// Finds a stored field by name, ignoring case.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Declared type of a stored field or pseudo-field index.
    pub fn field_type_at(&self, index: usize) -> Option<FieldType> {
        match self.fields.get(index) {
            Some(f) => Some(f.field_type()),
            None => SpecialField::from_field_index(index, self.fields.len()).map(|s| s.field_type()),
        }
    }

    /// Number of addressable fields, pseudo-fields included.
    #[inline]
    pub fn addressable_count(&self) -> usize {
        self.fields.len() + SPECIAL_FIELD_COUNT
    }

    #[inline]
    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn set_geometry_type(&mut self, geometry_type: GeometryType) {
        self.geometry_type = geometry_type;
    }

    #[inline]
    pub fn is_geometry_ignored(&self) -> bool {
        self.geometry_ignored
    }

    pub fn set_geometry_ignored(&mut self, ignored: bool) {
        self.geometry_ignored = ignored;
    }

    #[inline]
    pub fn is_style_ignored(&self) -> bool {
        self.style_ignored
    }

    pub fn set_style_ignored(&mut self, ignored: bool) {
        self.style_ignored = ignored;
    }

    /// Marks exactly the named stored fields as ignored. Names match
    /// case-insensitively; the pseudo-names `OGR_GEOMETRY` and `OGR_STYLE`
    /// toggle the geometry and style flags.
    pub fn set_ignored_fields(&mut self, names: &[String]) {
        for field in self.fields.iter_mut() {
            field.set_ignored(false);
        }
        self.geometry_ignored = false;
        self.style_ignored = false;
        for name in names {
            if let Some(idx) = self.field_index(name) {
                self.fields[idx].set_ignored(true);
            } else if name.eq_ignore_ascii_case(SpecialField::Geometry.name()) {
                self.geometry_ignored = true;
            } else if name.eq_ignore_ascii_case(SpecialField::Style.name()) {
                self.style_ignored = true;
            }
        }
    }
}

/// Builder for layer definitions.
pub struct LayerDefnBuilder {
    name: String,
    fields: Vec<FieldDefn>,
    geometry_type: GeometryType,
}

impl LayerDefnBuilder {
    /// Creates a new builder for a layer named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            geometry_type: GeometryType::None,
        }
    }

    /// Adds a field. Names must be non-empty and unique ignoring case, and
    /// must not shadow a pseudo-field.
    pub fn add_field(mut self, name: impl Into<String>, field_type: FieldType) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_operation("Field name cannot be empty"));
        }
        if self.fields.iter().any(|f| f.name().eq_ignore_ascii_case(&name)) {
            return Err(Error::invalid_operation(format!("Field already exists: {}", name)));
        }
        if SpecialField::from_name(&name).is_some() {
            return Err(Error::invalid_operation(format!("Field name is reserved: {}", name)));
        }
        self.fields.push(FieldDefn::new(name, field_type));
        Ok(self)
    }

    /// Sets the geometry type.
    pub fn geometry_type(mut self, geometry_type: GeometryType) -> Self {
        self.geometry_type = geometry_type;
        self
    }

    /// Builds the layer definition.
    pub fn build(self) -> LayerDefn {
        LayerDefn::new(self.name, self.fields, self.geometry_type)
    }
}
