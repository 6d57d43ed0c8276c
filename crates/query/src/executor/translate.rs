//! Output feature construction.

use super::RowTuple;
use crate::statement::ColumnDef;
use alloc::format;
use alloc::vec::Vec;
use featql_core::schema::LayerDefn;
use featql_core::{Error, Feature, Result, Value};
use featql_expr::Evaluator;

/// Builds result features from joined rows.
///
/// Each output column is one of: a computed expression, a stored field or
/// pseudo-field of the primary table, or a field of a joined table. The
/// output feature keeps the primary feature's identifier, geometry and style.
pub struct Translator<'a> {
    columns: &'a [ColumnDef],
    table_defns: &'a [LayerDefn],
    result_defn: &'a LayerDefn,
    evaluator: &'a dyn Evaluator,
}

impl<'a> Translator<'a> {
    pub fn new(
        columns: &'a [ColumnDef],
        table_defns: &'a [LayerDefn],
        result_defn: &'a LayerDefn,
        evaluator: &'a dyn Evaluator,
    ) -> Self {
        Self {
            columns,
            table_defns,
            result_defn,
            evaluator,
        }
    }

    pub fn translate(&self, row: &RowTuple) -> Result<Feature> {
        let mut values = Vec::with_capacity(self.columns.len());
        for (position, column) in self.columns.iter().enumerate() {
            let ignored = self
                .result_defn
                .field(position)
                .map(|f| f.is_ignored())
                .unwrap_or(false);
            if ignored {
                values.push(Value::Null);
                continue;
            }
            values.push(self.column_value(position, column, row)?);
        }

        let primary = row.primary();
        let mut feature = Feature::new(primary.fid().unwrap_or_default(), values);
        feature.set_fid(primary.fid());
        if !self.result_defn.is_geometry_ignored() {
            feature.set_geometry(primary.geometry().cloned());
        }
        if !self.result_defn.is_style_ignored() {
            feature.set_style(primary.style().map(Into::into));
        }
        Ok(feature)
    }

    fn column_value(&self, position: usize, column: &ColumnDef, row: &RowTuple) -> Result<Value> {
        let output_type = column.output_type();
        if let Some(expr) = &column.expr {
            let value = row
                .evaluate(expr, self.table_defns, self.evaluator)
                .map_err(|e| Error::evaluation(column.output_name(position), format!("{}", e)))?;
            return Ok(value.coerce(output_type));
        }
        let Some(field) = column.field_index else {
            return Ok(Value::Null);
        };
        // pseudo-fields already carry their declared type; joined fields are
        // copied as stored
        let value = row.resolve(self.table_defns, column.table_index, field)?;
        Ok(match column.target_type {
            Some(target) if column.table_index == 0 => value.coerce(target),
            _ => value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::ColumnDef;
    use alloc::vec;
    use featql_core::schema::{FieldDefn, LayerDefnBuilder};
    use featql_core::{FieldType, Geometry, GeometryType};
    use featql_expr::{Expr, ExprEvaluator, Op};

    fn defns() -> Vec<LayerDefn> {
        vec![
            LayerDefnBuilder::new("A")
                .add_field("id", FieldType::Integer)
                .unwrap()
                .add_field("name", FieldType::String)
                .unwrap()
                .geometry_type(GeometryType::Polygon)
                .build(),
            LayerDefnBuilder::new("B")
                .add_field("title", FieldType::String)
                .unwrap()
                .build(),
        ]
    }

    fn result_defn(columns: &[ColumnDef]) -> LayerDefn {
        let fields = columns
            .iter()
            .enumerate()
            .map(|(i, c)| FieldDefn::new(c.output_name(i), c.output_type()))
            .collect();
        LayerDefn::new("A", fields, GeometryType::Polygon)
    }

    fn square() -> Geometry {
        featql_core::Envelope::new(0.0, 0.0, 2.0, 2.0).to_polygon()
    }

    fn row(joined: Option<Feature>) -> RowTuple {
        let primary = Feature::new(5, vec![Value::Integer(12), Value::from("x")])
            .with_geometry(square())
            .with_style("PEN(c:#FF0000)");
        RowTuple::with_joined(primary, vec![joined])
    }

    #[test]
    fn test_translate_mixed_columns() {
        let d = defns();
        let mut cast_id = ColumnDef::field(0, 0, "id", FieldType::Integer);
        cast_id.target_type = Some(FieldType::String);
        let columns = vec![
            ColumnDef::field(0, 1, "name", FieldType::String),
            cast_id,
            // A has 2 stored fields; OGR_GEOM_AREA is 2 + 4
            ColumnDef::field(0, 6, "OGR_GEOM_AREA", FieldType::Real),
            ColumnDef::field(1, 0, "title", FieldType::String),
            ColumnDef::computed(Expr::operation(
                Op::Mul,
                vec![Expr::column(0, 0, FieldType::Integer, "id"), Expr::literal(2)],
            )),
        ];
        let rd = result_defn(&columns);
        let t = Translator::new(&columns, &d, &rd, &ExprEvaluator);

        let out = t
            .translate(&row(Some(Feature::new(0, vec![Value::from("Sales")]))))
            .unwrap();
        assert_eq!(out.fid(), Some(5));
        assert_eq!(
            out.fields(),
            &[
                Value::from("x"),
                Value::from("12"),
                Value::Real(4.0),
                Value::from("Sales"),
                Value::Integer64(24),
            ]
        );
        assert_eq!(out.geometry(), Some(&square()));
        assert_eq!(out.style(), Some("PEN(c:#FF0000)"));

        let unmatched = t.translate(&row(None)).unwrap();
        assert_eq!(unmatched.field(3), Some(&Value::Null));
    }

    #[test]
    fn test_cast_applies_to_primary_fields_only() {
        let d = defns();
        let mut cast_id = ColumnDef::field(0, 0, "id", FieldType::Integer);
        cast_id.target_type = Some(FieldType::Real);
        let mut cast_title = ColumnDef::field(1, 0, "title", FieldType::String);
        cast_title.target_type = Some(FieldType::Integer);
        let columns = vec![cast_id, cast_title];
        let rd = result_defn(&columns);
        let t = Translator::new(&columns, &d, &rd, &ExprEvaluator);

        let out = t.translate(&row(Some(Feature::new(0, vec![Value::from("42b")])))).unwrap();
        assert_eq!(out.fields(), &[Value::Real(12.0), Value::from("42b")]);
    }

    #[test]
    fn test_ignored_parts_are_dropped() {
        let d = defns();
        let columns = vec![
            ColumnDef::field(0, 0, "id", FieldType::Integer),
            ColumnDef::field(0, 1, "name", FieldType::String),
        ];
        let mut rd = result_defn(&columns);
        rd.set_ignored_fields(&["name".into(), "OGR_GEOMETRY".into(), "OGR_STYLE".into()]);
        let t = Translator::new(&columns, &d, &rd, &ExprEvaluator);
        let out = t.translate(&row(None)).unwrap();
        assert_eq!(out.fields(), &[Value::Integer(12), Value::Null]);
        assert_eq!(out.geometry(), None);
        assert_eq!(out.style(), None);
    }

    #[test]
    fn test_expression_failure_names_column() {
        let d = defns();
        let mut column = ColumnDef::computed(Expr::operation(
            Op::Substr,
            vec![Expr::column(0, 1, FieldType::String, "name")],
        ));
        column.alias = Some("short".into());
        let columns = vec![column];
        let rd = result_defn(&columns);
        let t = Translator::new(&columns, &d, &rd, &ExprEvaluator);
        match t.translate(&row(None)) {
            Err(Error::Evaluation { column, .. }) => assert_eq!(column, "short"),
            other => panic!("expected evaluation error, got {:?}", other),
        }
    }
}
