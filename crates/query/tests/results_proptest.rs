//! Property-based tests for ordering, aggregation and distinct lists.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use featql_core::schema::LayerDefnBuilder;
use featql_core::{Feature, FieldType, Value};
use featql_layer::{DataSourceRef, LayerRef, MemoryDataSource, MemoryLayer, MemoryRegistry, SourceLayer};
use featql_query::executor::compare_keys;
use featql_query::{ColumnFunc, ColumnSpec, OrderDef, QueryOptions, ResultsLayer, SelectBuilder, TableDef};
use proptest::prelude::*;

type Memory = Rc<RefCell<MemoryLayer>>;

/// A table `T(a, b)` of integer columns, one feature per pair.
fn table(rows: &[(Option<i32>, Option<i32>)]) -> Memory {
    let defn = LayerDefnBuilder::new("T")
        .add_field("a", FieldType::Integer)
        .unwrap()
        .add_field("b", FieldType::Integer)
        .unwrap()
        .build();
    let mut layer = MemoryLayer::new(defn);
    for (fid, (a, b)) in rows.iter().enumerate() {
        layer
            .add_feature(Feature::new(fid as i64, vec![Value::from(*a), Value::from(*b)]))
            .unwrap();
    }
    Rc::new(RefCell::new(layer))
}

fn open(layer: &Memory, builder: SelectBuilder) -> ResultsLayer {
    let handle: LayerRef = layer.clone();
    let ds: DataSourceRef = Rc::new(MemoryDataSource::new("db").with_layer(handle).unwrap());
    ResultsLayer::open(builder, &ds, &MemoryRegistry::default(), QueryOptions::new()).unwrap()
}

fn collect(layer: &mut ResultsLayer) -> Vec<Feature> {
    let mut out = Vec::new();
    while let Some(f) = layer.next_feature().unwrap() {
        out.push(f);
    }
    out
}

fn keys() -> Vec<OrderDef> {
    vec![
        OrderDef {
            field_index: 0,
            field_type: FieldType::Integer,
            ascending: true,
        },
        OrderDef {
            field_index: 1,
            field_type: FieldType::Integer,
            ascending: false,
        },
    ]
}

fn ordered(layer: &Memory) -> Vec<Feature> {
    let builder = SelectBuilder::new(TableDef::new("T"))
        .column("a")
        .column("b")
        .order_by("a", true)
        .order_by("b", false);
    collect(&mut open(layer, builder))
}

fn keyed_rows(max: usize) -> impl Strategy<Value = Vec<(Option<i32>, Option<i32>)>> {
    prop::collection::vec((0i32..5, 0i32..5), 0..max)
        .prop_map(|rows| rows.into_iter().map(|(a, b)| (Some(a), Some(b))).collect())
}

fn nullable_rows(max: usize) -> impl Strategy<Value = Vec<(Option<i32>, Option<i32>)>> {
    prop::collection::vec((prop::option::of(0i32..5), prop::option::of(0i32..5)), 0..max)
}

proptest! {
    /// Property: adjacent output rows are in key order, and rows with equal
    /// keys keep their scan order.
    #[test]
    fn order_by_is_sorted_and_stable(rows in keyed_rows(60)) {
        let layer = table(&rows);
        let out = ordered(&layer);
        prop_assert_eq!(out.len(), rows.len());

        let keys = keys();
        for pair in out.windows(2) {
            let ord = compare_keys(pair[0].fields(), pair[1].fields(), &keys);
            prop_assert_ne!(ord, std::cmp::Ordering::Greater);
            if ord == std::cmp::Ordering::Equal {
                prop_assert!(pair[0].fid() < pair[1].fid());
            }
        }
    }

    /// Property: NULL keys never lose or duplicate rows.
    #[test]
    fn order_by_with_nulls_is_a_permutation(rows in nullable_rows(60)) {
        let layer = table(&rows);
        let mut fids: Vec<i64> = ordered(&layer).iter().filter_map(Feature::fid).collect();
        fids.sort_unstable();
        prop_assert_eq!(fids, (0..rows.len() as i64).collect::<Vec<_>>());
    }

    /// Property: input already in key order is read without random access.
    #[test]
    fn sorted_input_skips_the_index(mut rows in keyed_rows(60)) {
        rows.sort_by(|x, y| x.0.cmp(&y.0).then(y.1.cmp(&x.1)));
        let layer = table(&rows);
        layer.borrow_mut().reset_stats();
        let out = ordered(&layer);
        prop_assert_eq!(out.len(), rows.len());
        prop_assert_eq!(layer.borrow().stats().random_reads, 0);
    }

    /// Property: aggregates match an independent reduction of the column.
    #[test]
    fn aggregates_match_reduction(rows in nullable_rows(60), threshold in 0i32..5) {
        let layer = table(&rows);
        let builder = SelectBuilder::new(TableDef::new("T"))
            .select(ColumnSpec::aggregate(ColumnFunc::Count, "b"))
            .select(ColumnSpec::aggregate(ColumnFunc::Sum, "b"))
            .select(ColumnSpec::aggregate(ColumnFunc::Avg, "b"))
            .select(ColumnSpec::aggregate(ColumnFunc::Min, "b"))
            .select(ColumnSpec::aggregate(ColumnFunc::Max, "b"))
            .filter(format!("a >= {}", threshold));
        let mut result = open(&layer, builder);
        let row = result.next_feature().unwrap().unwrap();

        let values: Vec<i32> = rows
            .iter()
            .filter(|(a, _)| a.map(|a| a >= threshold).unwrap_or(false))
            .filter_map(|(_, b)| *b)
            .collect();
        prop_assert_eq!(row.field(0), Some(&Value::Integer64(values.len() as i64)));
        if values.is_empty() {
            prop_assert_eq!(&row.fields()[1..], &[Value::Null, Value::Null, Value::Null, Value::Null]);
        } else {
            let sum: i32 = values.iter().sum();
            prop_assert_eq!(row.field(1), Some(&Value::Integer(sum)));
            prop_assert_eq!(row.field(2), Some(&Value::Real(sum as f64 / values.len() as f64)));
            prop_assert_eq!(row.field(3), Some(&Value::Integer(*values.iter().min().unwrap())));
            prop_assert_eq!(row.field(4), Some(&Value::Integer(*values.iter().max().unwrap())));
        }
    }

    /// Property: a distinct list holds every value once and its count
    /// matches its length.
    #[test]
    fn distinct_list_is_complete(rows in nullable_rows(60)) {
        let layer = table(&rows);
        let builder = SelectBuilder::new(TableDef::new("T")).select(ColumnSpec::distinct("a"));
        let mut result = open(&layer, builder);
        let listed: Vec<Value> = collect(&mut result)
            .iter()
            .map(|f| f.field(0).cloned().unwrap_or(Value::Null))
            .collect();

        let expected: HashSet<Value> = rows.iter().map(|(a, _)| Value::from(*a)).collect();
        let unique: HashSet<Value> = listed.iter().cloned().collect();
        prop_assert_eq!(unique.len(), listed.len());
        prop_assert_eq!(unique, expected);
        prop_assert_eq!(result.feature_count(true).unwrap(), Some(listed.len() as u64));
    }
}
