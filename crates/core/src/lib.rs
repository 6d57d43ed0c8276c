//! featql Core - value, geometry and schema types for the featql query layer.
//!
//! This crate provides the foundational types shared by source layers and the
//! SQL results layer:
//!
//! - `FieldType` / `Value`: attribute types and runtime values, with the
//!   explicit conversions used when a column declares a target type
//! - `Geometry` / `Envelope`: a small planar geometry model
//! - `Feature`: one row of a layer
//! - `schema`: layer and field definitions
//! - `SpecialField`: pseudo-fields addressable after the stored fields
//! - `Error`: error types shared by all featql crates
//!
//! # Example
//!
//! ```rust
//! use featql_core::{Feature, FieldType, Value};
//! use featql_core::schema::LayerDefnBuilder;
//!
//! let defn = LayerDefnBuilder::new("people")
//!     .add_field("id", FieldType::Integer)
//!     .unwrap()
//!     .add_field("name", FieldType::String)
//!     .unwrap()
//!     .build();
//!
//! let feature = Feature::new(1, vec![Value::Integer(1), Value::from("Alice")]);
//!
//! assert_eq!(defn.field_index("NAME"), Some(1));
//! // index 2 is the first pseudo-field, FID
//! assert_eq!(feature.field_value(&defn, 2), Value::Integer64(1));
//! ```

#![no_std]

extern crate alloc;

mod error;
mod feature;
pub mod geometry;
pub mod numfmt;
pub mod pattern_match;
pub mod schema;
mod special;
mod types;
mod value;

pub use error::{Error, Result};
pub use feature::{Feature, Fid};
pub use geometry::{Coord, Envelope, Geometry};
pub use special::{SpecialField, SPECIAL_FIELD_COUNT};
pub use types::{FieldType, GeometryType};
pub use value::{parse_datetime, parse_leading_f64, parse_leading_i64, parse_time, Value};
