//! Feature structure.
//!
//! A feature is one row of a layer: an optional identifier, typed attribute
//! values indexed by field position, an optional geometry and an optional
//! style string.

use crate::geometry::Geometry;
use crate::schema::LayerDefn;
use crate::special::SpecialField;
use crate::value::Value;
use alloc::string::String;
use alloc::vec::Vec;

/// Identifier of a feature within its layer.
pub type Fid = i64;

/// A row of a layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    /// Identifier, unset for synthetic rows.
    fid: Option<Fid>,
    /// Values stored in this feature, indexed by field position.
    fields: Vec<Value>,
    geometry: Option<Geometry>,
    style: Option<String>,
}

impl Feature {
    /// Creates a feature with the given identifier and values.
    pub fn new(fid: Fid, fields: Vec<Value>) -> Self {
        Self {
            fid: Some(fid),
            fields,
            geometry: None,
            style: None,
        }
    }

    /// Creates a feature with `field_count` null fields and no identifier.
    pub fn empty(field_count: usize) -> Self {
        Self {
            fid: None,
            fields: alloc::vec![Value::Null; field_count],
            geometry: None,
            style: None,
        }
    }

    /// Sets the geometry.
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Sets the style string.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Returns the feature identifier.
    #[inline]
    pub fn fid(&self) -> Option<Fid> {
        self.fid
    }

    /// Sets the feature identifier.
    pub fn set_fid(&mut self, fid: Option<Fid>) {
        self.fid = fid;
    }

    /// Returns the values.
    #[inline]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Returns the number of stored values.
    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Gets a value at the given field index.
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Returns true if the field exists and holds a non-null value.
    pub fn is_field_set(&self, index: usize) -> bool {
        self.fields.get(index).is_some_and(|v| !v.is_null())
    }

    /// Sets a value at the given field index.
    pub fn set_field(&mut self, index: usize, value: Value) -> bool {
        match self.fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geometry: Option<Geometry>) {
        self.geometry = geometry;
    }

    pub fn take_geometry(&mut self) -> Option<Geometry> {
        self.geometry.take()
    }

    #[inline]
    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn set_style(&mut self, style: Option<String>) {
        self.style = style;
    }

    /// Computes a pseudo-field of this feature.
    pub fn special_value(&self, field: SpecialField) -> Value {
        match field {
            SpecialField::Fid => self.fid.map(Value::Integer64).unwrap_or(Value::Null),
            SpecialField::Geometry => self
                .geometry
                .as_ref()
                .map(|g| Value::String(g.geometry_type().name().into()))
                .unwrap_or(Value::Null),
            SpecialField::Style => self
                .style
                .as_ref()
                .map(|s| Value::String(s.clone()))
                .unwrap_or(Value::Null),
            SpecialField::GeomWkt => self
                .geometry
                .as_ref()
                .map(|g| Value::String(g.to_wkt()))
                .unwrap_or(Value::Null),
            SpecialField::GeomArea => self
                .geometry
                .as_ref()
                .map(|g| Value::Real(g.area()))
                .unwrap_or(Value::Null),
        }
    }

    /// Resolves a stored field or pseudo-field index against the layer schema.
    pub fn field_value(&self, defn: &LayerDefn, index: usize) -> Value {
        if index < defn.field_count() {
            return self.fields.get(index).cloned().unwrap_or(Value::Null);
        }
        match SpecialField::from_field_index(index, defn.field_count()) {
            Some(special) => self.special_value(special),
            None => Value::Null,
        }
    }
}
