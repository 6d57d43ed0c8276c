//! Rendering expression trees as attribute-filter text.
//!
//! The output is the dialect `compile_filter` reads, so text produced here can
//! be installed as a source layer's attribute filter.

use crate::ast::{Expr, Op};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use featql_core::numfmt::format_g;
use featql_core::Value;

/// Renders an expression as filter text.
///
/// Identifiers are double-quoted, string literals single-quoted with SQL
/// escaping, and every operand that is itself an operation is parenthesized.
pub fn unparse(expr: &Expr) -> String {
    match expr {
        Expr::Column(c) => quote_identifier(&c.name),
        Expr::Literal(v) => unparse_literal(v),
        Expr::Operation { op, args } => unparse_operation(*op, args),
    }
}

/// Renders a literal value.
///
/// Integers print in decimal, reals with the fewest significant digits that
/// read back as the same `f64`, everything else as a quoted string.
pub fn unparse_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".into(),
        Value::Boolean(_) | Value::Integer(_) | Value::Integer64(_) => value.to_text(),
        Value::Real(f) => unparse_real(*f),
        other => quote_string(&other.to_text()),
    }
}

fn unparse_real(f: f64) -> String {
    if !f.is_finite() {
        return format_g(f, 17);
    }
    // 17 significant digits always round-trip
    (15..17)
        .map(|precision| format_g(f, precision))
        .find(|text| text.parse::<f64>() == Ok(f))
        .unwrap_or_else(|| format_g(f, 17))
}

/// Single-quotes a string, doubling embedded quotes.
pub fn quote_string(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn operand(expr: &Expr) -> String {
    match expr {
        Expr::Operation { op, .. } if op.function_name().is_none() && !matches!(op, Op::Cast(_)) => {
            format!("({})", unparse(expr))
        }
        _ => unparse(expr),
    }
}

fn unparse_operation(op: Op, args: &[Expr]) -> String {
    if let Some(symbol) = op.infix_symbol() {
        let parts: Vec<String> = args.iter().map(operand).collect();
        return parts.join(&format!(" {} ", symbol));
    }
    if let Some(name) = op.function_name() {
        let parts: Vec<String> = args.iter().map(unparse).collect();
        return format!("{}({})", name, parts.join(", "));
    }
    let first = args.first().map(operand).unwrap_or_default();
    match op {
        Op::Not => format!("NOT {}", first),
        Op::Neg => format!("-{}", first),
        Op::IsNull => format!("{} IS NULL", first),
        Op::Like => {
            let mut s = format!("{} LIKE {}", first, args.get(1).map(operand).unwrap_or_default());
            if let Some(escape) = args.get(2) {
                s.push_str(" ESCAPE ");
                s.push_str(&operand(escape));
            }
            s
        }
        Op::In => {
            let list: Vec<String> = args.iter().skip(1).map(operand).collect();
            format!("{} IN ({})", first, list.join(", "))
        }
        Op::Between => format!(
            "{} BETWEEN {} AND {}",
            first,
            args.get(1).map(operand).unwrap_or_default(),
            args.get(2).map(operand).unwrap_or_default()
        ),
        Op::Cast(target) => format!(
            "CAST({} AS {})",
            args.first().map(unparse).unwrap_or_default(),
            target.sql_name()
        ),
        // infix and function forms returned above
        _ => String::new(),
    }
}
