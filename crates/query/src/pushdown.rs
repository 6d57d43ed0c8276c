//! Query options and the pushdown plan.
//!
//! The plan is computed once when a results layer is constructed: which
//! stored fields each table may skip, and whether the WHERE clause can be
//! handed to the primary table's own filter evaluator.

use crate::statement::CompiledStatement;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use featql_core::schema::LayerDefn;
use featql_core::Geometry;
use featql_expr::{unparse, Expr};
use hashbrown::HashSet;

/// SQL dialect the statement was written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Dialect {
    /// The dialect source layers evaluate natively.
    #[default]
    Native,
    /// The extended dialect. Pseudo-fields in its WHERE clauses are not
    /// understood by source layers.
    Extended,
}

/// Construction options of a results layer.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    dialect: Dialect,
    spatial_filter: Option<Geometry>,
    where_text: Option<String>,
    max_sort_rows: Option<usize>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Initial spatial filter of the results layer.
    pub fn spatial_filter(mut self, geometry: Geometry) -> Self {
        self.spatial_filter = Some(geometry);
        self
    }

    /// Text forwarded to the primary table instead of the rendered WHERE tree.
    pub fn where_text(mut self, text: impl Into<String>) -> Self {
        self.where_text = Some(text.into());
        self
    }

    /// Upper bound on the rows an ORDER BY index may hold.
    pub fn max_sort_rows(mut self, rows: usize) -> Self {
        self.max_sort_rows = Some(rows);
        self
    }

    pub fn get_dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn get_spatial_filter(&self) -> Option<&Geometry> {
        self.spatial_filter.as_ref()
    }

    pub fn get_max_sort_rows(&self) -> Option<usize> {
        self.max_sort_rows
    }
}

/// Fixed decisions about what is delegated to source tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushdownPlan {
    /// Per table, the names of stored fields the statement never reads.
    ignored: Vec<Vec<String>>,
    /// WHERE text installed on the primary table, if forwarded.
    source_filter: Option<String>,
    /// The statement has a WHERE clause that is not forwarded.
    local_where: bool,
}

impl PushdownPlan {
    /// Computes the plan for `statement` over tables with schemas `defns`.
    pub fn build(statement: &CompiledStatement, defns: &[LayerDefn], options: &QueryOptions) -> Self {
        let referenced = referenced_fields(statement);
        let ignored: Vec<Vec<String>> = defns
            .iter()
            .enumerate()
            .map(|(table, defn)| {
                defn.fields()
                    .iter()
                    .enumerate()
                    .filter(|(field, _)| !referenced.contains(&(table, *field)))
                    .map(|(_, f)| f.name().to_string())
                    .collect()
            })
            .collect();

        let primary_fields = defns.first().map(LayerDefn::field_count).unwrap_or(0);
        let (source_filter, local_where) = match &statement.where_expr {
            None => (None, false),
            Some(expr) if forwardable(expr, primary_fields, options.dialect) => {
                let text = options.where_text.clone().unwrap_or_else(|| unparse(expr));
                (Some(text), false)
            }
            Some(_) => (None, true),
        };

        for (table, names) in ignored.iter().enumerate() {
            if !names.is_empty() {
                log::debug!("table {}: ignoring fields {:?}", table, names);
            }
        }
        if local_where {
            log::debug!("WHERE clause evaluated by the results layer");
        }

        Self {
            ignored,
            source_filter,
            local_where,
        }
    }

    /// Stored fields of `table` that need not be read.
    pub fn ignored_fields(&self, table: usize) -> &[String] {
        self.ignored.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    /// Filter text for the primary table, if the WHERE clause is forwarded.
    pub fn source_filter(&self) -> Option<&str> {
        self.source_filter.as_deref()
    }

    /// Returns true if the WHERE clause is forwarded to the primary table.
    pub fn forwards_where(&self) -> bool {
        self.source_filter.is_some()
    }

    /// Returns true if the results layer must evaluate the WHERE clause itself.
    pub fn evaluates_where_locally(&self) -> bool {
        self.local_where
    }
}

/// A WHERE tree can be forwarded when it reads only the primary table and,
/// in the extended dialect, no pseudo-field.
fn forwardable(expr: &Expr, primary_fields: usize, dialect: Dialect) -> bool {
    let joined = expr.references(&mut |c| c.table_index != 0);
    if joined {
        return false;
    }
    match dialect {
        Dialect::Native => true,
        Dialect::Extended => !expr.references(&mut |c| c.field_index >= primary_fields),
    }
}

/// Every `(table, field)` pair read by columns, WHERE, join keys or sort keys.
pub fn referenced_fields(statement: &CompiledStatement) -> HashSet<(usize, usize)> {
    let mut set = HashSet::new();
    for column in &statement.columns {
        if let Some(field) = column.field_index {
            set.insert((column.table_index, field));
        }
        if let Some(expr) = &column.expr {
            expr.visit_columns(&mut |c| {
                set.insert((c.table_index, c.field_index));
            });
        }
    }
    if let Some(expr) = &statement.where_expr {
        expr.visit_columns(&mut |c| {
            set.insert((c.table_index, c.field_index));
        });
    }
    for join in &statement.joins {
        set.insert((0, join.primary_field));
        set.insert((join.secondary_table, join.secondary_field));
    }
    for key in &statement.order_by {
        set.insert((0, key.field_index));
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldCatalog;
    use crate::statement::{SelectBuilder, TableDef};
    use alloc::vec;
    use featql_core::schema::LayerDefnBuilder;
    use featql_core::FieldType;

    fn defns() -> Vec<LayerDefn> {
        vec![
            LayerDefnBuilder::new("A")
                .add_field("id", FieldType::Integer)
                .unwrap()
                .add_field("name", FieldType::String)
                .unwrap()
                .add_field("dept_id", FieldType::Integer)
                .unwrap()
                .add_field("notes", FieldType::String)
                .unwrap()
                .build(),
            LayerDefnBuilder::new("B")
                .add_field("dept_id", FieldType::Integer)
                .unwrap()
                .add_field("dept_name", FieldType::String)
                .unwrap()
                .add_field("budget", FieldType::Real)
                .unwrap()
                .build(),
        ]
    }

    fn compile(builder: SelectBuilder) -> CompiledStatement {
        let tables = builder.tables().to_vec();
        builder
            .compile(&FieldCatalog::from_defns(&tables, &defns()))
            .unwrap()
    }

    fn base() -> SelectBuilder {
        SelectBuilder::new(TableDef::new("A"))
            .join(TableDef::new("B"), "dept_id", "dept_id")
            .column("A.name")
            .column("B.dept_name")
    }

    #[test]
    fn test_ignored_fields() {
        let stmt = compile(base().filter("id > 1"));
        let plan = PushdownPlan::build(&stmt, &defns(), &QueryOptions::default());
        assert_eq!(plan.ignored_fields(0), ["notes".to_string()]);
        assert_eq!(plan.ignored_fields(1), ["budget".to_string()]);
        assert!(plan.ignored_fields(5).is_empty());
    }

    #[test]
    fn test_order_keys_and_expressions_are_referenced() {
        let stmt = compile(
            SelectBuilder::new(TableDef::new("A"))
                .select(crate::statement::ColumnSpec::expression("UPPER(notes)"))
                .order_by("id", true),
        );
        let plan = PushdownPlan::build(&stmt, &defns(), &QueryOptions::default());
        assert_eq!(plan.ignored_fields(0), ["name".to_string(), "dept_id".to_string()]);
    }

    #[test]
    fn test_where_forwarded() {
        let stmt = compile(base().filter("dept_id = 10"));
        let plan = PushdownPlan::build(&stmt, &defns(), &QueryOptions::default());
        assert!(plan.forwards_where());
        assert!(!plan.evaluates_where_locally());
        assert_eq!(plan.source_filter(), Some("\"dept_id\" = 10"));

        let overridden = PushdownPlan::build(
            &stmt,
            &defns(),
            &QueryOptions::default().where_text("dept_id = 10"),
        );
        assert_eq!(overridden.source_filter(), Some("dept_id = 10"));
    }

    #[test]
    fn test_pseudo_field_where_in_extended_dialect() {
        let stmt = compile(base().filter("FID > 0"));
        let native = PushdownPlan::build(&stmt, &defns(), &QueryOptions::default());
        assert!(native.forwards_where());

        let extended = PushdownPlan::build(
            &stmt,
            &defns(),
            &QueryOptions::default().dialect(Dialect::Extended),
        );
        assert!(!extended.forwards_where());
        assert!(extended.evaluates_where_locally());
        assert_eq!(extended.source_filter(), None);
    }

    #[test]
    fn test_where_on_joined_table_stays_local() {
        let stmt = compile(base().filter("B.dept_name = 'Sales'"));
        let plan = PushdownPlan::build(&stmt, &defns(), &QueryOptions::default());
        assert!(plan.evaluates_where_locally());
    }

    #[test]
    fn test_no_where() {
        let plan = PushdownPlan::build(&compile(base()), &defns(), &QueryOptions::default());
        assert!(!plan.forwards_where());
        assert!(!plan.evaluates_where_locally());
    }
}
