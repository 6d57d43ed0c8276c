//! Expression evaluation.
//!
//! Evaluation never looks at rows directly. Every column reference is
//! resolved through a callback supplied by the caller, which lets the same
//! evaluator run over a single source feature (attribute filters) or over a
//! joined row tuple (computed columns of a results layer).

use crate::ast::{Expr, Op};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use featql_core::pattern_match::like_with_escape;
use featql_core::{parse_datetime, parse_time, Error, FieldType, Result, Value};

/// Evaluates expression trees.
pub trait Evaluator {
    /// Evaluates `expr`, resolving each column reference through
    /// `resolver(table_index, field_index, field_type)`.
    fn evaluate(
        &self,
        expr: &Expr,
        resolver: &mut dyn FnMut(usize, usize, FieldType) -> Result<Value>,
    ) -> Result<Value>;

    /// Evaluates `expr` as a predicate. Only a true result passes; NULL and
    /// false both reject.
    fn test(
        &self,
        expr: &Expr,
        resolver: &mut dyn FnMut(usize, usize, FieldType) -> Result<Value>,
    ) -> Result<bool> {
        Ok(truth(&self.evaluate(expr, resolver)?) == Some(true))
    }
}

/// Default evaluator with SQL three-valued logic.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExprEvaluator;

impl Evaluator for ExprEvaluator {
    fn evaluate(
        &self,
        expr: &Expr,
        resolver: &mut dyn FnMut(usize, usize, FieldType) -> Result<Value>,
    ) -> Result<Value> {
        match expr {
            Expr::Column(col) => resolver(col.table_index, col.field_index, col.field_type),
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Operation { op, args } => self.eval_operation(*op, args, resolver),
        }
    }
}

impl ExprEvaluator {
    fn eval_operation(
        &self,
        op: Op,
        args: &[Expr],
        resolver: &mut dyn FnMut(usize, usize, FieldType) -> Result<Value>,
    ) -> Result<Value> {
        match op {
            // AND / OR short-circuit before evaluating the right side
            Op::And | Op::Or => {
                let (left, right) = two_args(op, args)?;
                let l = truth(&self.evaluate(left, resolver)?);
                match (op, l) {
                    (Op::And, Some(false)) => return Ok(Value::Boolean(false)),
                    (Op::Or, Some(true)) => return Ok(Value::Boolean(true)),
                    _ => {}
                }
                let r = truth(&self.evaluate(right, resolver)?);
                Ok(match (op, l, r) {
                    (Op::And, _, Some(false)) => Value::Boolean(false),
                    (Op::And, Some(true), Some(true)) => Value::Boolean(true),
                    (Op::Or, _, Some(true)) => Value::Boolean(true),
                    (Op::Or, Some(false), Some(false)) => Value::Boolean(false),
                    _ => Value::Null,
                })
            }
            Op::Not => {
                let v = self.evaluate(one_arg(op, args)?, resolver)?;
                Ok(truth(&v).map(|b| Value::Boolean(!b)).unwrap_or(Value::Null))
            }
            Op::IsNull => {
                let v = self.evaluate(one_arg(op, args)?, resolver)?;
                Ok(Value::Boolean(v.is_null()))
            }
            Op::Coalesce => {
                for arg in args {
                    let v = self.evaluate(arg, resolver)?;
                    if !v.is_null() {
                        return Ok(v);
                    }
                }
                Ok(Value::Null)
            }
            _ => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg, resolver)?);
                }
                apply(op, &values)
            }
        }
    }
}

fn one_arg(op: Op, args: &[Expr]) -> Result<&Expr> {
    match args {
        [a] => Ok(a),
        _ => Err(arity_error(op, 1, args.len())),
    }
}

fn two_args(op: Op, args: &[Expr]) -> Result<(&Expr, &Expr)> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(arity_error(op, 2, args.len())),
    }
}

fn arity_error(op: Op, expected: usize, got: usize) -> Error {
    Error::invalid_operation(format!(
        "{:?} expects {} argument(s), got {}",
        op, expected, got
    ))
}

/// Truth value of a predicate result; None for NULL.
fn truth(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(!s.is_empty()),
        other => other.as_bool(),
    }
}

/// Applies an operator to already evaluated arguments.
fn apply(op: Op, values: &[Value]) -> Result<Value> {
    match op {
        Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            let [l, r] = values else {
                return Err(arity_error(op, 2, values.len()));
            };
            Ok(match compare(l, r)? {
                None => Value::Null,
                Some(ord) => Value::Boolean(match op {
                    Op::Eq => ord == Ordering::Equal,
                    Op::Ne => ord != Ordering::Equal,
                    Op::Lt => ord == Ordering::Less,
                    Op::Le => ord != Ordering::Greater,
                    Op::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                }),
            })
        }
        Op::Like => {
            let (value, pattern) = match values {
                [v, p] | [v, p, _] => (v, p),
                _ => return Err(arity_error(op, 2, values.len())),
            };
            if value.is_null() || pattern.is_null() {
                return Ok(Value::Null);
            }
            let escape = match values.get(2) {
                Some(Value::String(s)) => s.chars().next(),
                _ => None,
            };
            Ok(Value::Boolean(like_with_escape(
                &value.to_text(),
                &pattern.to_text(),
                escape,
            )))
        }
        Op::In => {
            let Some((value, list)) = values.split_first() else {
                return Err(arity_error(op, 1, 0));
            };
            if value.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                match compare(value, item)? {
                    Some(Ordering::Equal) => return Ok(Value::Boolean(true)),
                    None => saw_null = true,
                    _ => {}
                }
            }
            Ok(if saw_null { Value::Null } else { Value::Boolean(false) })
        }
        Op::Between => {
            let [v, low, high] = values else {
                return Err(arity_error(op, 3, values.len()));
            };
            match (compare(v, low)?, compare(v, high)?) {
                (Some(a), Some(b)) => Ok(Value::Boolean(a != Ordering::Less && b != Ordering::Greater)),
                (Some(Ordering::Less), None) | (None, Some(Ordering::Greater)) => {
                    Ok(Value::Boolean(false))
                }
                _ => Ok(Value::Null),
            }
        }
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => {
            let [l, r] = values else {
                return Err(arity_error(op, 2, values.len()));
            };
            arithmetic(op, l, r)
        }
        Op::Neg => match values {
            [Value::Null] => Ok(Value::Null),
            [Value::Integer(i)] => Ok(Value::Integer(i.wrapping_neg())),
            [Value::Integer64(i)] => Ok(Value::Integer64(i.wrapping_neg())),
            [Value::Real(f)] => Ok(Value::Real(-f)),
            [other] => Err(Error::invalid_operation(format!(
                "cannot negate {:?}",
                other.field_type()
            ))),
            _ => Err(arity_error(op, 1, values.len())),
        },
        Op::Concat => {
            let [l, r] = values else {
                return Err(arity_error(op, 2, values.len()));
            };
            if l.is_null() || r.is_null() {
                return Ok(Value::Null);
            }
            let mut s = l.to_text();
            s.push_str(&r.to_text());
            Ok(Value::String(s))
        }
        Op::Upper | Op::Lower | Op::Length => match values {
            [Value::Null] => Ok(Value::Null),
            [v] => {
                let text = v.to_text();
                Ok(match op {
                    Op::Upper => Value::String(text.to_uppercase()),
                    Op::Lower => Value::String(text.to_lowercase()),
                    _ => Value::Integer(text.chars().count() as i32),
                })
            }
            _ => Err(arity_error(op, 1, values.len())),
        },
        Op::Substr => substr(values),
        Op::Cast(target) => match values {
            [v] => Ok(v.coerce(target)),
            _ => Err(arity_error(op, 1, values.len())),
        },
        // handled in eval_operation
        Op::And | Op::Or | Op::Not | Op::IsNull | Op::Coalesce => {
            Err(Error::invalid_operation(format!("{:?} applied out of context", op)))
        }
    }
}

/// Compares two values for the comparison operators.
///
/// Returns None if either side is NULL. A string compared with a number is
/// read as a number; a string compared with a date or time is parsed.
fn compare(left: &Value, right: &Value) -> Result<Option<Ordering>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    let (lt, rt) = match (left.field_type(), right.field_type()) {
        (Some(l), Some(r)) => (l, r),
        _ => return Ok(None),
    };
    if lt == rt || (lt.is_numeric() && rt.is_numeric()) {
        return Ok(left.compare(right));
    }
    match (lt, rt) {
        (FieldType::String, t) if t.is_numeric() => {
            Ok(Value::Real(left.as_real().unwrap_or(0.0)).compare(right))
        }
        (t, FieldType::String) if t.is_numeric() => {
            Ok(left.compare(&Value::Real(right.as_real().unwrap_or(0.0))))
        }
        (FieldType::String, t) if t.is_temporal() => {
            Ok(parse_temporal(left, t).and_then(|l| l.compare(right)))
        }
        (t, FieldType::String) if t.is_temporal() => {
            Ok(parse_temporal(right, t).and_then(|r| left.compare(&r)))
        }
        (FieldType::Date, FieldType::DateTime) | (FieldType::DateTime, FieldType::Date) => {
            Ok(left.compare(right))
        }
        _ => Err(Error::type_mismatch(lt, rt)),
    }
}

fn parse_temporal(text: &Value, target: FieldType) -> Option<Value> {
    let s = text.as_str()?;
    match target {
        FieldType::Time => parse_time(s).map(Value::Time),
        _ => parse_datetime(s).map(Value::DateTime),
    }
}

fn arithmetic(op: Op, l: &Value, r: &Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let numeric = |v: &Value| v.field_type().is_some_and(|t| t.is_numeric());
    if !numeric(l) || !numeric(r) {
        return Err(Error::invalid_operation(format!(
            "arithmetic on non-numeric operands {:?} and {:?}",
            l.field_type(),
            r.field_type()
        )));
    }
    let integral = |v: &Value| v.field_type().is_some_and(|t| t.is_integral());
    if integral(l) && integral(r) {
        let (a, b) = (l.as_integer64().unwrap_or(0), r.as_integer64().unwrap_or(0));
        let result = match op {
            Op::Add => a.checked_add(b),
            Op::Sub => a.checked_sub(b),
            Op::Mul => a.checked_mul(b),
            Op::Div | Op::Mod if b == 0 => {
                return Err(Error::invalid_operation("division by zero"));
            }
            Op::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return match result {
            Some(v) => Ok(Value::Integer64(v)),
            None => Err(Error::invalid_operation("integer overflow")),
        };
    }
    let (a, b) = (l.as_real().unwrap_or(0.0), r.as_real().unwrap_or(0.0));
    Ok(Value::Real(match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => a / b,
        _ => libm::fmod(a, b),
    }))
}

fn substr(values: &[Value]) -> Result<Value> {
    let (text, start, len) = match values {
        [t, s] => (t, s, None),
        [t, s, l] => (t, s, Some(l)),
        _ => return Err(arity_error(Op::Substr, 2, values.len())),
    };
    if text.is_null() || start.is_null() || len.is_some_and(|l| l.is_null()) {
        return Ok(Value::Null);
    }
    let chars: Vec<char> = text.to_text().chars().collect();
    let count = chars.len() as i64;
    let start = start.as_integer64().unwrap_or(0);
    // 1-based; negative counts from the end
    let from = if start > 0 {
        (start - 1).min(count)
    } else if start < 0 {
        (count + start).max(0)
    } else {
        0
    };
    let to = match len.and_then(|l| l.as_integer64()) {
        Some(l) if l <= 0 => from,
        Some(l) => from.saturating_add(l).min(count),
        None => count,
    };
    let out: String = chars[from as usize..to as usize].iter().collect();
    Ok(Value::String(out))
}
