//! Pseudo-fields.
//!
//! Every table exposes a fixed set of computed columns after its stored
//! fields. They are addressed like ordinary fields: a pseudo-field of a table
//! with `n` stored fields has field index `n + SpecialField::index()`.

use crate::types::FieldType;

/// Number of pseudo-fields appended after the stored fields of a table.
pub const SPECIAL_FIELD_COUNT: usize = 5;

/// A computed, not physically stored column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpecialField {
    /// Feature identifier
    Fid,
    /// Geometry type name
    Geometry,
    /// Style string
    Style,
    /// Geometry as well-known text
    GeomWkt,
    /// Planar area of the geometry
    GeomArea,
}

impl SpecialField {
    /// All pseudo-fields in index order.
    pub const ALL: [SpecialField; SPECIAL_FIELD_COUNT] = [
        SpecialField::Fid,
        SpecialField::Geometry,
        SpecialField::Style,
        SpecialField::GeomWkt,
        SpecialField::GeomArea,
    ];

    /// Returns the column name used in SQL text.
    pub fn name(&self) -> &'static str {
        match self {
            SpecialField::Fid => "FID",
            SpecialField::Geometry => "OGR_GEOMETRY",
            SpecialField::Style => "OGR_STYLE",
            SpecialField::GeomWkt => "OGR_GEOM_WKT",
            SpecialField::GeomArea => "OGR_GEOM_AREA",
        }
    }

    /// Returns the declared type of the pseudo-field.
    pub fn field_type(&self) -> FieldType {
        match self {
            SpecialField::Fid => FieldType::Integer64,
            SpecialField::GeomArea => FieldType::Real,
            _ => FieldType::String,
        }
    }

    /// Position within the pseudo-field block.
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Looks up a pseudo-field by position within the block.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Looks up a pseudo-field by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// Resolves a field index of a table with `field_count` stored fields.
    pub fn from_field_index(index: usize, field_count: usize) -> Option<Self> {
        index.checked_sub(field_count).and_then(Self::from_index)
    }

    /// Returns true if computing the value requires reading the geometry.
    pub fn is_geometry_derived(&self) -> bool {
        matches!(
            self,
            SpecialField::Geometry | SpecialField::GeomWkt | SpecialField::GeomArea
        )
    }
}
