//! Row-level execution for results layers.
//!
//! - `join`: per-row lookup of joined secondary features
//! - `translate`: building output features from joined rows
//! - `order_by`: sort keys and the ORDER BY permutation
//! - `aggregate`: summary and distinct accumulation

mod aggregate;
mod join;
mod order_by;
mod translate;

pub use aggregate::{ColumnSummary, SummaryState, Summarizer};
pub use join::{join_literal, LookupJoin};
pub use order_by::{compare_keys, sort_key_values, sort_permutation, BestRow, KeyBuffer, OrderIndex};
pub use translate::Translator;

use alloc::format;
use alloc::vec::Vec;
use featql_core::schema::LayerDefn;
use featql_core::{Error, Feature, Result, Value};
use featql_expr::{Evaluator, Expr};

/// A primary feature together with the features it joined to.
///
/// Slot `i` of the joined list holds the match for table `i + 1`, or None
/// if that join found nothing.
#[derive(Clone, Debug, PartialEq)]
pub struct RowTuple {
    primary: Feature,
    joined: Vec<Option<Feature>>,
}

impl RowTuple {
    /// A tuple with no joined tables.
    pub fn new(primary: Feature) -> Self {
        Self {
            primary,
            joined: Vec::new(),
        }
    }

    /// A tuple with joined matches, in table order starting at table 1.
    pub fn with_joined(primary: Feature, joined: Vec<Option<Feature>>) -> Self {
        Self { primary, joined }
    }

    #[inline]
    pub fn primary(&self) -> &Feature {
        &self.primary
    }

    /// Feature of `table`, if that table has a row in this tuple.
    pub fn get(&self, table: usize) -> Option<&Feature> {
        match table {
            0 => Some(&self.primary),
            t => self.joined.get(t - 1).and_then(Option::as_ref),
        }
    }

    pub fn into_primary(self) -> Feature {
        self.primary
    }

    /// Value of field `field` of `table`. Tables without a matched row
    /// yield NULL.
    pub fn resolve(&self, defns: &[LayerDefn], table: usize, field: usize) -> Result<Value> {
        let defn = defns
            .get(table)
            .ok_or_else(|| Error::invalid_operation(format!("table index {} out of range", table)))?;
        Ok(self
            .get(table)
            .map(|f| f.field_value(defn, field))
            .unwrap_or(Value::Null))
    }

    /// Evaluates `expr` over this tuple.
    pub fn evaluate(&self, expr: &Expr, defns: &[LayerDefn], evaluator: &dyn Evaluator) -> Result<Value> {
        let mut resolver = |table: usize, field: usize, _ty| self.resolve(defns, table, field);
        evaluator.evaluate(expr, &mut resolver)
    }

    /// Evaluates `expr` over this tuple as a predicate.
    pub fn test(&self, expr: &Expr, defns: &[LayerDefn], evaluator: &dyn Evaluator) -> Result<bool> {
        let mut resolver = |table: usize, field: usize, _ty| self.resolve(defns, table, field);
        evaluator.test(expr, &mut resolver)
    }
}

/// Lazily built state of a results layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CacheState<T> {
    #[default]
    Unbuilt,
    /// A build is in progress. Seen only if a build is re-entered.
    Building,
    Ready(T),
}

impl<T> CacheState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            CacheState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut T> {
        match self {
            CacheState::Ready(value) => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, CacheState::Ready(_))
    }

    /// Drops any built value.
    pub fn invalidate(&mut self) {
        *self = CacheState::Unbuilt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use featql_core::schema::LayerDefnBuilder;
    use featql_core::{FieldType, Geometry};
    use featql_expr::{ExprEvaluator, Op};

    fn defns() -> Vec<LayerDefn> {
        vec![
            LayerDefnBuilder::new("A")
                .add_field("id", FieldType::Integer)
                .unwrap()
                .build(),
            LayerDefnBuilder::new("B")
                .add_field("label", FieldType::String)
                .unwrap()
                .build(),
        ]
    }

    #[test]
    fn test_resolve() {
        let primary = Feature::new(7, vec![Value::Integer(3)]).with_geometry(Geometry::point(1.0, 2.0));
        let row = RowTuple::with_joined(primary, vec![None]);
        let d = defns();
        assert_eq!(row.resolve(&d, 0, 0).unwrap(), Value::Integer(3));
        // FID pseudo-field of A
        assert_eq!(row.resolve(&d, 0, 1).unwrap(), Value::Integer64(7));
        assert_eq!(row.resolve(&d, 1, 0).unwrap(), Value::Null);
        assert!(row.resolve(&d, 2, 0).is_err());
    }

    #[test]
    fn test_evaluate_across_tables() {
        let row = RowTuple::with_joined(
            Feature::new(1, vec![Value::Integer(3)]),
            vec![Some(Feature::new(9, vec![Value::from("x")]))],
        );
        let expr = Expr::operation(
            Op::Concat,
            vec![
                Expr::column(1, 0, FieldType::String, "label"),
                Expr::column(0, 0, FieldType::Integer, "id"),
            ],
        );
        let v = row.evaluate(&expr, &defns(), &ExprEvaluator).unwrap();
        assert_eq!(v, Value::from("x3"));
    }

    #[test]
    fn test_cache_state() {
        let mut state: CacheState<u32> = CacheState::default();
        assert!(!state.is_ready());
        state = CacheState::Ready(4);
        assert_eq!(state.ready(), Some(&4));
        state.invalidate();
        assert_eq!(state, CacheState::Unbuilt);
    }
}
