//! featql Layer - the source layer contract and an in-memory implementation.
//!
//! This crate provides:
//!
//! - `SourceLayer`: the scan / random access / filter / count contract every
//!   table of a query implements, including the SQL results layer itself
//! - `Capability`: capability flags a layer can advertise
//! - `DataSource` / `DataSourceRegistry`: named collections of layers, and
//!   the lookup used to open secondary data sources for joins
//! - `MemoryLayer` / `MemoryDataSource` / `MemoryRegistry`: an in-memory
//!   implementation that records how it is accessed
//!
//! # Example
//!
//! ```rust
//! use featql_core::schema::LayerDefnBuilder;
//! use featql_core::{Feature, FieldType, Value};
//! use featql_layer::{MemoryLayer, SourceLayer};
//!
//! let defn = LayerDefnBuilder::new("depts")
//!     .add_field("dept_id", FieldType::Integer)
//!     .unwrap()
//!     .build();
//! let mut layer = MemoryLayer::new(defn);
//! layer.add_feature(Feature::new(0, vec![Value::Integer(10)])).unwrap();
//! layer.add_feature(Feature::new(1, vec![Value::Integer(20)])).unwrap();
//!
//! layer.set_attribute_filter(Some("dept_id = 20")).unwrap();
//! let found = layer.next_feature().unwrap().unwrap();
//! assert_eq!(found.fid(), Some(1));
//! assert!(layer.next_feature().unwrap().is_none());
//! ```

#![no_std]

extern crate alloc;

mod layer;
mod memory;
mod registry;

pub use layer::{layer_ref, Capability, LayerRef, SourceLayer};
pub use memory::{AccessStats, LayerCapabilities, MemoryLayer};
pub use registry::{DataSource, DataSourceRef, DataSourceRegistry, MemoryDataSource, MemoryRegistry};
