//! Compiled SELECT statements.
//!
//! A `CompiledStatement` is the fully resolved form of a SELECT: every table
//! reference is a position in the table list, every column and sort key is a
//! `(table_index, field_index)` pair, and the execution mode is decided.
//! `SelectBuilder` assembles one from names, resolving them against a
//! `FieldCatalog`.

use crate::catalog::FieldCatalog;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use featql_core::schema::{FieldDefn, LayerDefn};
use featql_core::{Error, FieldType, GeometryType, Result, SpecialField};
use featql_expr::{compile_expression, Expr};

/// Aggregate function applied to an output column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ColumnFunc {
    #[default]
    None,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl ColumnFunc {
    /// SQL name, used to build output field names such as `SUM_salary`.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFunc::None => "",
            ColumnFunc::Count => "COUNT",
            ColumnFunc::Sum => "SUM",
            ColumnFunc::Avg => "AVG",
            ColumnFunc::Min => "MIN",
            ColumnFunc::Max => "MAX",
        }
    }

    #[inline]
    pub fn is_aggregate(&self) -> bool {
        !matches!(self, ColumnFunc::None)
    }
}

/// A table participating in a statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDef {
    /// Secondary data source holding the table, or None for the primary one.
    pub data_source: Option<String>,
    pub table_name: String,
    pub alias: Option<String>,
}

impl TableDef {
    /// A table of the primary data source.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            data_source: None,
            table_name: table_name.into(),
            alias: None,
        }
    }

    /// Places the table in a secondary data source.
    pub fn in_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name the table is referred to by in column qualifiers.
    pub fn alias_or_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }
}

/// One equi-join clause. Join `i` always targets table `i + 1`; the primary
/// key field belongs to table 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinDef {
    pub primary_field: usize,
    pub secondary_table: usize,
    pub secondary_field: usize,
}

/// One output column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDef {
    pub table_index: usize,
    /// Referenced field, or None for `COUNT(*)` and computed expressions.
    pub field_index: Option<usize>,
    pub field_name: String,
    /// Qualifier the column was written with, if any.
    pub table_name: Option<String>,
    pub alias: Option<String>,
    pub func: ColumnFunc,
    pub distinct: bool,
    /// Declared type of the referenced field or expression.
    pub field_type: FieldType,
    /// Explicit `CAST` target type.
    pub target_type: Option<FieldType>,
    pub expr: Option<Expr>,
}

impl ColumnDef {
    /// A direct reference to a field.
    pub fn field(
        table_index: usize,
        field_index: usize,
        field_name: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            table_index,
            field_index: Some(field_index),
            field_name: field_name.into(),
            table_name: None,
            alias: None,
            func: ColumnFunc::None,
            distinct: false,
            field_type,
            target_type: None,
            expr: None,
        }
    }

    /// `COUNT(*)`.
    pub fn count_star() -> Self {
        Self {
            table_index: 0,
            field_index: None,
            field_name: "*".into(),
            table_name: None,
            alias: None,
            func: ColumnFunc::Count,
            distinct: false,
            field_type: FieldType::Integer64,
            target_type: None,
            expr: None,
        }
    }

    /// A computed column.
    pub fn computed(expr: Expr) -> Self {
        Self {
            table_index: 0,
            field_index: None,
            field_name: String::new(),
            table_name: None,
            alias: None,
            func: ColumnFunc::None,
            distinct: false,
            field_type: expr.result_type(),
            target_type: None,
            expr: Some(expr),
        }
    }

    #[inline]
    pub fn is_count_star(&self) -> bool {
        self.func == ColumnFunc::Count && self.field_index.is_none() && self.expr.is_none()
    }

    /// Output field name at output position `position`.
    pub fn output_name(&self, position: usize) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        if self.func.is_aggregate() {
            return format!("{}_{}", self.func.name(), self.field_name);
        }
        if self.field_name.is_empty() {
            return format!("FIELD_{}", position + 1);
        }
        match &self.table_name {
            Some(table) => format!("{}.{}", table, self.field_name),
            None => self.field_name.clone(),
        }
    }

    /// Output field type.
    pub fn output_type(&self) -> FieldType {
        if let Some(target) = self.target_type {
            return target;
        }
        match self.func {
            ColumnFunc::Count => FieldType::Integer64,
            ColumnFunc::Avg if !self.field_type.is_temporal() => FieldType::Real,
            _ => self.field_type,
        }
    }
}

/// A sort key. Keys always refer to the primary table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderDef {
    pub field_index: usize,
    pub field_type: FieldType,
    pub ascending: bool,
}

/// How a statement produces rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// One output row per qualifying source row.
    #[default]
    Recordset,
    /// One row of aggregates.
    Summary,
    /// One row per distinct value of the single column.
    Distinct,
}

/// A SELECT statement with every name resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledStatement {
    pub tables: Vec<TableDef>,
    pub joins: Vec<JoinDef>,
    pub columns: Vec<ColumnDef>,
    pub where_expr: Option<Expr>,
    pub order_by: Vec<OrderDef>,
    pub mode: QueryMode,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl CompiledStatement {
    /// Checks the statement against the schemas of its resolved tables.
    pub fn validate(&self, defns: &[LayerDefn]) -> Result<()> {
        if self.tables.is_empty() || defns.len() != self.tables.len() {
            return Err(Error::invalid_operation("statement tables do not match resolved layers"));
        }
        let check = |table: usize, field: usize| -> Result<()> {
            let defn = defns
                .get(table)
                .ok_or_else(|| Error::invalid_operation(format!("table index {} out of range", table)))?;
            if field >= defn.addressable_count() {
                return Err(Error::field_not_found(defn.name(), format!("#{}", field)));
            }
            Ok(())
        };
        for (i, join) in self.joins.iter().enumerate() {
            if join.secondary_table != i + 1 {
                return Err(Error::invalid_operation(format!(
                    "join {} targets table {}, expected {}",
                    i,
                    join.secondary_table,
                    i + 1
                )));
            }
            check(0, join.primary_field)?;
            check(join.secondary_table, join.secondary_field)?;
        }
        for column in &self.columns {
            if let Some(field) = column.field_index {
                check(column.table_index, field)?;
            }
            if let Some(expr) = &column.expr {
                for c in expr.columns() {
                    check(c.table_index, c.field_index)?;
                }
            }
        }
        if let Some(expr) = &self.where_expr {
            for c in expr.columns() {
                check(c.table_index, c.field_index)?;
            }
        }
        for key in &self.order_by {
            check(0, key.field_index)?;
        }
        if self.mode == QueryMode::Distinct && self.columns.len() != 1 {
            return Err(Error::invalid_operation("DISTINCT list queries select exactly one column"));
        }
        Ok(())
    }

    /// Builds the schema of the result rows.
    ///
    /// The result is named after the primary table's alias and carries the
    /// primary geometry type in recordset mode, no geometry otherwise.
    pub fn result_defn(&self, defns: &[LayerDefn]) -> LayerDefn {
        let fields = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| FieldDefn::new(c.output_name(i), c.output_type()))
            .collect();
        let geometry_type = match (self.mode, defns.first()) {
            (QueryMode::Recordset, Some(primary)) => primary.geometry_type(),
            _ => GeometryType::None,
        };
        let name = self
            .tables
            .first()
            .map(|t| t.alias_or_name().to_string())
            .unwrap_or_default();
        LayerDefn::new(name, fields, geometry_type)
    }
}

/// One requested output column, before name resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    kind: SpecKind,
    alias: Option<String>,
    cast: Option<FieldType>,
}

#[derive(Clone, Debug, PartialEq)]
enum SpecKind {
    Wildcard,
    CountStar,
    Field {
        name: String,
        func: ColumnFunc,
        distinct: bool,
    },
    Expression(String),
}

impl ColumnSpec {
    /// A field by (possibly qualified) name.
    pub fn field(name: impl Into<String>) -> Self {
        Self::with_kind(SpecKind::Field {
            name: name.into(),
            func: ColumnFunc::None,
            distinct: false,
        })
    }

    /// `func(name)`, or `func(DISTINCT name)` when `distinct` is set.
    pub fn aggregate(func: ColumnFunc, name: impl Into<String>) -> Self {
        Self::with_kind(SpecKind::Field {
            name: name.into(),
            func,
            distinct: false,
        })
    }

    /// `DISTINCT name`.
    pub fn distinct(name: impl Into<String>) -> Self {
        Self::with_kind(SpecKind::Field {
            name: name.into(),
            func: ColumnFunc::None,
            distinct: true,
        })
    }

    /// `COUNT(DISTINCT name)`.
    pub fn count_distinct(name: impl Into<String>) -> Self {
        Self::with_kind(SpecKind::Field {
            name: name.into(),
            func: ColumnFunc::Count,
            distinct: true,
        })
    }

    pub fn count_star() -> Self {
        Self::with_kind(SpecKind::CountStar)
    }

    /// `*`: every stored field of every table.
    pub fn wildcard() -> Self {
        Self::with_kind(SpecKind::Wildcard)
    }

    /// A computed column given as expression text.
    pub fn expression(text: impl Into<String>) -> Self {
        Self::with_kind(SpecKind::Expression(text.into()))
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// `CAST(column AS ty)`.
    pub fn cast(mut self, ty: FieldType) -> Self {
        self.cast = Some(ty);
        self
    }

    fn with_kind(kind: SpecKind) -> Self {
        Self {
            kind,
            alias: None,
            cast: None,
        }
    }
}

/// Builder for compiled statements.
///
/// # Example
///
/// ```rust,ignore
/// let builder = SelectBuilder::new(TableDef::new("A"))
///     .join(TableDef::new("B"), "dept_id", "dept_id")
///     .column("A.name")
///     .column("B.dept_name")
///     .filter("A.dept_id > 5")
///     .order_by("name", true);
/// ```
#[derive(Clone, Debug)]
pub struct SelectBuilder {
    tables: Vec<TableDef>,
    joins: Vec<(String, String)>,
    columns: Vec<ColumnSpec>,
    where_text: Option<String>,
    order_by: Vec<(String, bool)>,
    offset: u64,
    limit: Option<u64>,
}

impl SelectBuilder {
    /// Starts a statement reading from `primary`.
    pub fn new(primary: TableDef) -> Self {
        Self {
            tables: alloc::vec![primary],
            joins: Vec::new(),
            columns: Vec::new(),
            where_text: None,
            order_by: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    /// Joins `table` on `primary_field = table.secondary_field`.
    pub fn join(
        mut self,
        table: TableDef,
        primary_field: impl Into<String>,
        secondary_field: impl Into<String>,
    ) -> Self {
        self.tables.push(table);
        self.joins.push((primary_field.into(), secondary_field.into()));
        self
    }

    /// Selects a field by name.
    pub fn column(self, name: impl Into<String>) -> Self {
        self.select(ColumnSpec::field(name))
    }

    pub fn select(mut self, spec: ColumnSpec) -> Self {
        self.columns.push(spec);
        self
    }

    /// Sets the WHERE clause text.
    pub fn filter(mut self, text: impl Into<String>) -> Self {
        self.where_text = Some(text.into());
        self
    }

    pub fn order_by(mut self, name: impl Into<String>, ascending: bool) -> Self {
        self.order_by.push((name.into(), ascending));
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Tables referenced by the statement, primary first.
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Resolves every name against `catalog` and decides the execution mode.
    pub fn compile(self, catalog: &FieldCatalog) -> Result<CompiledStatement> {
        let mut joins = Vec::with_capacity(self.joins.len());
        for (i, (primary, secondary)) in self.joins.iter().enumerate() {
            let table = i + 1;
            let primary_field = catalog.find_in_table(0, primary)?;
            let secondary_field = catalog.find_in_table(table, secondary)?;
            joins.push(JoinDef {
                primary_field: primary_field.field_index,
                secondary_table: table,
                secondary_field: secondary_field.field_index,
            });
        }

        let mut columns = Vec::new();
        for spec in &self.columns {
            match &spec.kind {
                SpecKind::Wildcard => columns.extend(catalog.expand_wildcard()),
                SpecKind::CountStar => {
                    let mut col = ColumnDef::count_star();
                    col.alias = spec.alias.clone();
                    columns.push(col);
                }
                SpecKind::Field {
                    name,
                    func,
                    distinct,
                } => {
                    let field = catalog.find(name)?;
                    let mut col = ColumnDef::field(
                        field.table_index,
                        field.field_index,
                        field.name.clone(),
                        field.field_type,
                    );
                    col.table_name = name
                        .split_once('.')
                        .map(|(table, _)| table.to_string());
                    col.func = *func;
                    col.distinct = *distinct;
                    col.alias = spec.alias.clone();
                    col.target_type = spec.cast;
                    columns.push(col);
                }
                SpecKind::Expression(text) => {
                    let expr = compile_expression(text, catalog)?;
                    let mut col = match expr.as_column() {
                        Some(c) => ColumnDef::field(c.table_index, c.field_index, c.name.clone(), c.field_type),
                        None => ColumnDef::computed(expr),
                    };
                    col.alias = spec.alias.clone();
                    col.target_type = spec.cast;
                    columns.push(col);
                }
            }
        }
        if columns.is_empty() {
            columns.extend(catalog.expand_wildcard());
        }

        let mode = decide_mode(&columns)?;

        let where_expr = match &self.where_text {
            Some(text) if !text.trim().is_empty() => Some(compile_expression(text, catalog)?),
            _ => None,
        };

        let mut order_by = Vec::with_capacity(self.order_by.len());
        for (name, ascending) in &self.order_by {
            let field = catalog.find_in_table(0, name)?;
            order_by.push(OrderDef {
                field_index: field.field_index,
                field_type: field.field_type,
                ascending: *ascending,
            });
        }

        Ok(CompiledStatement {
            tables: self.tables,
            joins,
            columns,
            where_expr,
            order_by,
            mode,
            offset: self.offset,
            limit: self.limit,
        })
    }
}

fn decide_mode(columns: &[ColumnDef]) -> Result<QueryMode> {
    let aggregates = columns.iter().filter(|c| c.func.is_aggregate()).count();
    let distinct_lists = columns
        .iter()
        .filter(|c| c.distinct && !c.func.is_aggregate())
        .count();

    if distinct_lists > 0 {
        if columns.len() != 1 {
            return Err(Error::unsupported(
                "SELECT DISTINCT with more than one column",
            ));
        }
        let c = &columns[0];
        if c.table_index != 0 || c.field_index.is_none() {
            return Err(Error::unsupported(format!(
                "DISTINCT over {} outside the primary table",
                c.output_name(0)
            )));
        }
        return Ok(QueryMode::Distinct);
    }
    if aggregates == 0 {
        return Ok(QueryMode::Recordset);
    }
    if aggregates != columns.len() {
        return Err(Error::unsupported(
            "mixing aggregate and plain columns without GROUP BY",
        ));
    }
    if let Some(c) = columns.iter().find(|c| {
        c.field_index
            .map(|_| c.table_index != 0)
            .unwrap_or(c.expr.is_some())
    }) {
        return Err(Error::unsupported(format!(
            "aggregate over {} outside the primary table",
            c.output_name(0)
        )));
    }
    if let Some(c) = columns.iter().find(|c| {
        matches!(c.func, ColumnFunc::Sum | ColumnFunc::Avg)
            && !(c.field_type.is_numeric() || c.field_type.is_temporal())
    }) {
        return Err(Error::unsupported(format!(
            "{}() on {} field {}",
            c.func.name(),
            c.field_type.sql_name(),
            c.field_name
        )));
    }
    Ok(QueryMode::Summary)
}

/// Returns true if `column` computes its value from the geometry.
pub(crate) fn reads_geometry(column: &ColumnDef, primary_field_count: usize) -> bool {
    if column.table_index == 0 {
        if let Some(field) = column.field_index {
            if SpecialField::from_field_index(field, primary_field_count)
                .map(|s| s.is_geometry_derived())
                .unwrap_or(false)
            {
                return true;
            }
        }
    }
    column
        .expr
        .as_ref()
        .map(|e| expr_reads_geometry(e, primary_field_count))
        .unwrap_or(false)
}

/// Returns true if `expr` references a geometry-derived pseudo-field of the
/// primary table.
pub(crate) fn expr_reads_geometry(expr: &Expr, primary_field_count: usize) -> bool {
    expr.references(&mut |c| {
        c.table_index == 0
            && SpecialField::from_field_index(c.field_index, primary_field_count)
                .map(|s| s.is_geometry_derived())
                .unwrap_or(false)
    })
}
