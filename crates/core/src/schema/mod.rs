//! Layer schema definitions.
//!
//! A layer schema is an ordered list of typed attribute fields plus the
//! geometry type of the layer.

mod field;
mod layer;

pub use field::FieldDefn;
pub use layer::{LayerDefn, LayerDefnBuilder};
