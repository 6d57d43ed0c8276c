//! featql Query - SQL results layers over featql source layers.
//!
//! This crate runs a compiled SELECT statement over one primary table and
//! any number of equi-joined secondary tables, and exposes the result as a
//! `SourceLayer` of its own:
//!
//! - `statement`: compiled statements and the `SelectBuilder` that assembles them
//! - `catalog`: the flat field catalog used for name resolution, and table lookup
//! - `pushdown`: query options, ignored fields and WHERE forwarding
//! - `executor`: joins, output translation, ORDER BY indexing and aggregation
//! - `results`: the `ResultsLayer` that ties the above together
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use featql_core::schema::LayerDefnBuilder;
//! use featql_core::{Feature, FieldType, Value};
//! use featql_layer::{layer_ref, DataSourceRef, MemoryDataSource, MemoryLayer, MemoryRegistry, SourceLayer};
//! use featql_query::{QueryOptions, ResultsLayer, SelectBuilder, TableDef};
//!
//! let defn = LayerDefnBuilder::new("emp")
//!     .add_field("name", FieldType::String)
//!     .unwrap()
//!     .add_field("dept_id", FieldType::Integer)
//!     .unwrap()
//!     .build();
//! let mut emp = MemoryLayer::new(defn);
//! emp.add_feature(Feature::new(0, vec![Value::from("x"), Value::Integer(10)])).unwrap();
//! emp.add_feature(Feature::new(1, vec![Value::from("y"), Value::Integer(20)])).unwrap();
//!
//! let ds: DataSourceRef = Rc::new(MemoryDataSource::new("db").with_layer(layer_ref(emp)).unwrap());
//! let query = SelectBuilder::new(TableDef::new("emp"))
//!     .column("name")
//!     .filter("dept_id = 20");
//! let mut result = ResultsLayer::open(query, &ds, &MemoryRegistry::default(), QueryOptions::new()).unwrap();
//!
//! let row = result.next_feature().unwrap().unwrap();
//! assert_eq!(row.field(0), Some(&Value::from("y")));
//! assert!(result.next_feature().unwrap().is_none());
//! ```

#![no_std]

extern crate alloc;

pub mod catalog;
pub mod executor;
pub mod pushdown;
pub mod results;
pub mod statement;

pub use catalog::{resolve_tables, CatalogField, FieldCatalog, ResolvedTables};
pub use pushdown::{Dialect, PushdownPlan, QueryOptions};
pub use results::ResultsLayer;
pub use statement::{
    ColumnDef, ColumnFunc, ColumnSpec, CompiledStatement, JoinDef, OrderDef, QueryMode, SelectBuilder, TableDef,
};
