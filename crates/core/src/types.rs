//! Field and geometry type definitions.
//!
//! This module defines the attribute types a source layer can expose and the
//! geometry types carried by layer schemas.

/// Attribute field types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Boolean stored as an integer subtype.
    Boolean,
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    Integer64,
    /// 64-bit floating point number
    Real,
    /// UTF-8 string
    String,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Date and time of day
    DateTime,
}

impl FieldType {
    /// Returns true for integer, 64-bit integer, boolean and real types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Boolean | FieldType::Integer | FieldType::Integer64 | FieldType::Real
        )
    }

    /// Returns true for integer-like types.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            FieldType::Boolean | FieldType::Integer | FieldType::Integer64
        )
    }

    /// Returns true for date, time and date-time types.
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Time | FieldType::DateTime)
    }

    /// Returns the SQL keyword used for this type in `CAST(x AS type)`.
    pub fn sql_name(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Integer64 => "bigint",
            FieldType::Real => "float",
            FieldType::String => "character",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::DateTime => "timestamp",
        }
    }

    /// Parses a `CAST` target keyword. Matching is case-insensitive.
    pub fn from_sql_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "boolean" => Some(FieldType::Boolean),
            "integer" | "int" => Some(FieldType::Integer),
            "bigint" | "integer64" => Some(FieldType::Integer64),
            "float" | "real" | "numeric" | "double" => Some(FieldType::Real),
            "character" | "varchar" | "string" | "text" => Some(FieldType::String),
            "date" => Some(FieldType::Date),
            "time" => Some(FieldType::Time),
            "timestamp" | "datetime" => Some(FieldType::DateTime),
            _ => None,
        }
    }
}

/// Geometry types carried by a layer schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum GeometryType {
    /// The layer has no geometry.
    None,
    /// Geometry of any kind.
    #[default]
    Unknown,
    Point,
    LineString,
    Polygon,
}

impl GeometryType {
    /// Returns the upper-case type name, as exposed by the `OGR_GEOMETRY` pseudo-field.
    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::None => "NONE",
            GeometryType::Unknown => "GEOMETRY",
            GeometryType::Point => "POINT",
            GeometryType::LineString => "LINESTRING",
            GeometryType::Polygon => "POLYGON",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_classification() {
        assert!(FieldType::Integer.is_numeric());
        assert!(FieldType::Real.is_numeric());
        assert!(!FieldType::String.is_numeric());
        assert!(!FieldType::Date.is_numeric());
        assert!(FieldType::Integer64.is_integral());
        assert!(!FieldType::Real.is_integral());
    }

    #[test]
    fn test_temporal() {
        assert!(FieldType::Date.is_temporal());
        assert!(FieldType::Time.is_temporal());
        assert!(FieldType::DateTime.is_temporal());
        assert!(!FieldType::String.is_temporal());
    }

    #[test]
    fn test_sql_name_roundtrip() {
        for ft in [
            FieldType::Integer,
            FieldType::Integer64,
            FieldType::Real,
            FieldType::String,
            FieldType::Date,
        ] {
            assert_eq!(FieldType::from_sql_name(ft.sql_name()), Some(ft));
        }
        assert_eq!(FieldType::from_sql_name("FLOAT"), Some(FieldType::Real));
        assert_eq!(FieldType::from_sql_name("blob"), None);
    }

    #[test]
    fn test_geometry_type_name() {
        assert_eq!(GeometryType::Point.name(), "POINT");
        assert_eq!(GeometryType::default(), GeometryType::Unknown);
    }
}
