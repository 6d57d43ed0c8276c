//! Expression tree definitions.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use featql_core::{FieldType, Value};

/// Reference to a field of one of the tables of a statement.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Position of the table in the statement's table list (0 is the primary table).
    pub table_index: usize,
    /// Field index within that table; pseudo-fields follow the stored fields.
    pub field_index: usize,
    /// Declared type of the field.
    pub field_type: FieldType,
    /// Field name as written in filter text.
    pub name: String,
}

impl ColumnRef {
    /// Creates a new column reference.
    pub fn new(
        table_index: usize,
        field_index: usize,
        field_type: FieldType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            table_index,
            field_index,
            field_type,
            name: name.into(),
        }
    }
}

/// Operators and functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    Not,
    IsNull,
    // Pattern and set membership
    /// `value LIKE pattern [ESCAPE esc]`
    Like,
    /// `value IN (list...)`
    In,
    /// `value BETWEEN low AND high`
    Between,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    // String
    Concat,
    Upper,
    Lower,
    Length,
    /// `SUBSTR(text, start [, length])`, start is 1-based
    Substr,
    Coalesce,
    /// `CAST(value AS type)`
    Cast(FieldType),
}

impl Op {
    /// Returns the SQL spelling of infix operators.
    pub fn infix_symbol(&self) -> Option<&'static str> {
        let s = match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Concat => "||",
            _ => return None,
        };
        Some(s)
    }

    /// Returns the function name of function-style operators.
    pub fn function_name(&self) -> Option<&'static str> {
        let s = match self {
            Op::Upper => "UPPER",
            Op::Lower => "LOWER",
            Op::Length => "LENGTH",
            Op::Substr => "SUBSTR",
            Op::Coalesce => "COALESCE",
            _ => return None,
        };
        Some(s)
    }

    /// Looks up a function-style operator by name, ignoring case.
    pub fn from_function_name(name: &str) -> Option<Self> {
        [Op::Upper, Op::Lower, Op::Length, Op::Substr, Op::Coalesce]
            .into_iter()
            .find(|op| op.function_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Returns true for operators yielding a boolean.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Op::Eq
                | Op::Ne
                | Op::Lt
                | Op::Le
                | Op::Gt
                | Op::Ge
                | Op::And
                | Op::Or
                | Op::Not
                | Op::IsNull
                | Op::Like
                | Op::In
                | Op::Between
        )
    }
}

/// Expression tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Field reference.
    Column(ColumnRef),
    /// Literal value.
    Literal(Value),
    /// Operator or function applied to arguments.
    Operation { op: Op, args: Vec<Expr> },
}

impl Expr {
    /// Creates a column reference expression.
    pub fn column(
        table_index: usize,
        field_index: usize,
        field_type: FieldType,
        name: impl Into<String>,
    ) -> Self {
        Expr::Column(ColumnRef::new(table_index, field_index, field_type, name))
    }

    /// Creates a literal expression.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Creates an operation node.
    pub fn operation(op: Op, args: Vec<Expr>) -> Self {
        Expr::Operation { op, args }
    }

    fn binary(op: Op, left: Expr, right: Expr) -> Self {
        Expr::Operation {
            op,
            args: vec![left, right],
        }
    }

    /// Creates an equality expression.
    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Eq, left, right)
    }

    /// Creates a not-equal expression.
    pub fn ne(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Ne, left, right)
    }

    /// Creates a less-than expression.
    pub fn lt(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Lt, left, right)
    }

    /// Creates a less-than-or-equal expression.
    pub fn le(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Le, left, right)
    }

    /// Creates a greater-than expression.
    pub fn gt(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Gt, left, right)
    }

    /// Creates a greater-than-or-equal expression.
    pub fn ge(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Ge, left, right)
    }

    /// Creates an AND expression.
    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(Op::And, left, right)
    }

    /// Creates an OR expression.
    pub fn or(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Or, left, right)
    }

    /// Creates a NOT expression.
    pub fn not(expr: Expr) -> Self {
        Expr::operation(Op::Not, vec![expr])
    }

    /// Creates an IS NULL expression.
    pub fn is_null(expr: Expr) -> Self {
        Expr::operation(Op::IsNull, vec![expr])
    }

    /// Creates an IS NOT NULL expression.
    pub fn is_not_null(expr: Expr) -> Self {
        Expr::not(Expr::is_null(expr))
    }

    /// Creates a LIKE expression.
    pub fn like(expr: Expr, pattern: &str) -> Self {
        Self::binary(Op::Like, expr, Expr::literal(pattern))
    }

    /// Creates an IN expression.
    pub fn in_list(expr: Expr, values: Vec<Value>) -> Self {
        let mut args = Vec::with_capacity(values.len() + 1);
        args.push(expr);
        args.extend(values.into_iter().map(Expr::Literal));
        Expr::operation(Op::In, args)
    }

    /// Creates a BETWEEN expression.
    pub fn between(expr: Expr, low: Expr, high: Expr) -> Self {
        Expr::operation(Op::Between, vec![expr, low, high])
    }

    /// Creates an addition.
    pub fn add(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Add, left, right)
    }

    /// Creates a subtraction.
    pub fn sub(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Sub, left, right)
    }

    /// Creates a multiplication.
    pub fn mul(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Mul, left, right)
    }

    /// Creates a division.
    pub fn div(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Div, left, right)
    }

    /// Creates a string concatenation.
    pub fn concat(left: Expr, right: Expr) -> Self {
        Self::binary(Op::Concat, left, right)
    }

    /// Creates a `CAST(expr AS target)` expression.
    pub fn cast(expr: Expr, target: FieldType) -> Self {
        Expr::operation(Op::Cast(target), vec![expr])
    }

    /// Returns the column reference if this is a bare column.
    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Expr::Column(c) => Some(c),
            _ => None,
        }
    }

    /// Calls `f` for every column reference in the tree.
    pub fn visit_columns<F: FnMut(&ColumnRef)>(&self, f: &mut F) {
        match self {
            Expr::Column(c) => f(c),
            Expr::Literal(_) => {}
            Expr::Operation { args, .. } => {
                for arg in args {
                    arg.visit_columns(f);
                }
            }
        }
    }

    /// Collects all column references in the tree.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Expr::Column(c) => out.push(c),
            Expr::Literal(_) => {}
            Expr::Operation { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }

    /// Returns true if any column reference satisfies `pred`.
    pub fn references(&self, pred: &mut dyn FnMut(&ColumnRef) -> bool) -> bool {
        match self {
            Expr::Column(c) => pred(c),
            Expr::Literal(_) => false,
            Expr::Operation { args, .. } => args.iter().any(|a| a.references(pred)),
        }
    }

    /// Static result type of the expression, used to type computed columns.
    pub fn result_type(&self) -> FieldType {
        match self {
            Expr::Column(c) => c.field_type,
            Expr::Literal(v) => v.field_type().unwrap_or(FieldType::String),
            Expr::Operation { op, args } => match op {
                op if op.is_predicate() => FieldType::Boolean,
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => {
                    if args.iter().all(|a| a.result_type().is_integral()) {
                        FieldType::Integer64
                    } else {
                        FieldType::Real
                    }
                }
                Op::Neg => args.first().map(Expr::result_type).unwrap_or(FieldType::Real),
                Op::Length => FieldType::Integer,
                Op::Coalesce => args
                    .iter()
                    .find(|a| !matches!(a, Expr::Literal(Value::Null)))
                    .map(Expr::result_type)
                    .unwrap_or(FieldType::String),
                Op::Cast(target) => *target,
                _ => FieldType::String,
            },
        }
    }
}

impl From<ColumnRef> for Expr {
    fn from(c: ColumnRef) -> Self {
        Expr::Column(c)
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(table: usize, field: usize, ty: FieldType) -> Expr {
        Expr::column(table, field, ty, "f")
    }

    #[test]
    fn test_columns_collects_in_order() {
        let e = Expr::and(
            Expr::eq(col(0, 1, FieldType::Integer), Expr::literal(1)),
            Expr::like(col(1, 0, FieldType::String), "a%"),
        );
        let cols = e.columns();
        assert_eq!(cols.len(), 2);
        assert_eq!((cols[0].table_index, cols[0].field_index), (0, 1));
        assert_eq!((cols[1].table_index, cols[1].field_index), (1, 0));
    }

    #[test]
    fn test_references() {
        let e = Expr::not(Expr::is_null(col(0, 7, FieldType::Real)));
        assert!(e.references(&mut |c| c.field_index >= 5));
        assert!(!e.references(&mut |c| c.table_index == 1));
    }

    #[test]
    fn test_result_type() {
        let int = col(0, 0, FieldType::Integer);
        let real = col(0, 1, FieldType::Real);
        assert_eq!(Expr::add(int.clone(), int.clone()).result_type(), FieldType::Integer64);
        assert_eq!(Expr::mul(int.clone(), real).result_type(), FieldType::Real);
        assert_eq!(Expr::eq(int.clone(), Expr::literal(1)).result_type(), FieldType::Boolean);
        assert_eq!(Expr::cast(int.clone(), FieldType::String).result_type(), FieldType::String);
        assert_eq!(
            Expr::operation(Op::Length, vec![Expr::literal("abc")]).result_type(),
            FieldType::Integer
        );
    }

    #[test]
    fn test_function_lookup() {
        assert_eq!(Op::from_function_name("upper"), Some(Op::Upper));
        assert_eq!(Op::from_function_name("SubStr"), Some(Op::Substr));
        assert_eq!(Op::from_function_name("abs"), None);
    }
}
