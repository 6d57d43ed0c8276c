//! featql Expr - expression trees for the featql query layer.
//!
//! This crate provides:
//!
//! - `Expr`: the expression tree attached to computed columns, WHERE clauses
//!   and join conditions, with column references bound to
//!   `(table_index, field_index)` pairs
//! - `Evaluator` / `ExprEvaluator`: evaluation over a caller-supplied
//!   field resolver, using SQL three-valued logic
//! - `unparse`: renders a tree back to attribute-filter text
//! - `compile_filter` / `compile_expression`: compile attribute-filter text
//!   against one layer schema, as used by source layers that evaluate
//!   filters natively, or against any `ColumnResolver`
//!
//! # Example
//!
//! ```rust
//! use featql_core::schema::LayerDefnBuilder;
//! use featql_core::{FieldType, Value};
//! use featql_expr::{compile_filter, unparse, Evaluator, ExprEvaluator};
//!
//! let defn = LayerDefnBuilder::new("depts")
//!     .add_field("dept_id", FieldType::Integer)
//!     .unwrap()
//!     .build();
//!
//! let expr = compile_filter("dept_id = 10", &defn).unwrap();
//! assert_eq!(unparse(&expr), "\"dept_id\" = 10");
//!
//! let mut resolver = |_table: usize, _field: usize, _ty: FieldType| -> featql_core::Result<Value> {
//!     Ok(Value::Integer(10))
//! };
//! assert!(ExprEvaluator.test(&expr, &mut resolver).unwrap());
//! ```

#![no_std]

extern crate alloc;

mod ast;
mod eval;
mod filter;
mod unparse;

pub use ast::{ColumnRef, Expr, Op};
pub use eval::{Evaluator, ExprEvaluator};
pub use filter::{compile_expression, compile_filter, ColumnResolver};
pub use unparse::{quote_identifier, quote_string, unparse, unparse_literal};
