//! Attribute-filter compiler.
//!
//! Compiles the WHERE-clause text installed on a single source layer into an
//! expression tree bound to that layer's schema (table index 0). The same
//! grammar compiles expressions over several tables when names are resolved
//! through a `ColumnResolver` other than a layer schema. Supported grammar:
//!
//! - literals: integers, reals, `'strings'` (quotes doubled), `NULL`
//! - identifiers: bare or `"quoted"`, stored fields or pseudo-fields
//! - `=` `<>` `!=` `<` `<=` `>` `>=`, `AND` `OR` `NOT`
//! - `IS [NOT] NULL`, `[NOT] LIKE .. [ESCAPE ..]`, `[NOT] IN (..)`,
//!   `[NOT] BETWEEN .. AND ..`
//! - `+ - * / %`, `||`, unary minus
//! - `CAST(x AS type)`, `UPPER`, `LOWER`, `LENGTH`, `SUBSTR`, `COALESCE`

use crate::ast::{ColumnRef, Expr, Op};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use featql_core::schema::LayerDefn;
use featql_core::{Error, FieldType, Result, SpecialField, Value};

/// Maps column names found in expression text to column references.
pub trait ColumnResolver {
    /// Resolves a possibly `table.`-qualified column name.
    fn resolve_column(&self, name: &str) -> Result<ColumnRef>;
}

impl ColumnResolver for LayerDefn {
    fn resolve_column(&self, name: &str) -> Result<ColumnRef> {
        // accept a layer-name qualifier
        let field = match name.split_once('.') {
            Some((table, field)) if table.eq_ignore_ascii_case(self.name()) => field,
            _ => name,
        };
        if let Some(idx) = self.field_index(field) {
            let f = &self.fields()[idx];
            return Ok(ColumnRef::new(0, idx, f.field_type(), f.name()));
        }
        if let Some(special) = SpecialField::from_name(field) {
            return Ok(ColumnRef::new(
                0,
                self.field_count() + special.index(),
                special.field_type(),
                special.name(),
            ));
        }
        Err(Error::field_not_found(self.name(), name))
    }
}

/// Compiles filter text against the schema of one layer.
pub fn compile_filter(text: &str, defn: &LayerDefn) -> Result<Expr> {
    compile_expression(text, defn)
}

/// Compiles expression text, resolving names through `columns`.
pub fn compile_expression(text: &str, columns: &dyn ColumnResolver) -> Result<Expr> {
    let tokens = tokenize(text).map_err(|m| Error::invalid_filter(text, m))?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        columns,
    };
    let expr = parser.parse_or().map_err(|e| wrap(text, e))?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::invalid_filter(
            text,
            format!("unexpected {:?}", parser.tokens[parser.pos]),
        ));
    }
    Ok(expr)
}

fn wrap(text: &str, err: Error) -> Error {
    match err {
        Error::InvalidOperation { message } => Error::invalid_filter(text, message),
        other => other,
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Quoted(String),
    Str(String),
    Int(i64),
    Real(f64),
    Symbol(&'static str),
}

const SYMBOLS: [&str; 16] = [
    "<>", "!=", "<=", ">=", "||", "=", "<", ">", "(", ")", ",", "+", "-", "*", "/", "%",
];

fn tokenize(text: &str) -> core::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' || c == '"' {
            chars.next();
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some((_, ch)) if ch == c => {
                        if matches!(chars.peek(), Some(&(_, next)) if next == c) {
                            chars.next();
                            value.push(c);
                        } else {
                            break;
                        }
                    }
                    Some((_, ch)) => value.push(ch),
                    None => return Err(format!("unterminated quote at {}", start)),
                }
            }
            tokens.push(if c == '\'' {
                Token::Str(value)
            } else {
                Token::Quoted(value)
            });
        } else if c.is_ascii_digit() || (c == '.' && text[start + 1..].starts_with(|d: char| d.is_ascii_digit())) {
            let mut end = start;
            let mut is_real = false;
            while let Some(&(i, ch)) = chars.peek() {
                let exponent_sign = (ch == '+' || ch == '-')
                    && matches!(text[..i].chars().last(), Some('e') | Some('E'));
                if ch.is_ascii_digit() || exponent_sign {
                    end = i + 1;
                } else if ch == '.' || ch == 'e' || ch == 'E' {
                    is_real = true;
                    end = i + 1;
                } else {
                    break;
                }
                chars.next();
            }
            let literal = &text[start..end];
            let token = if is_real {
                literal.parse().map(Token::Real).map_err(|_| format!("bad number {}", literal))?
            } else {
                match literal.parse() {
                    Ok(v) => Token::Int(v),
                    Err(_) => literal
                        .parse()
                        .map(Token::Real)
                        .map_err(|_| format!("bad number {}", literal))?,
                }
            };
            tokens.push(token);
        } else if c.is_alphabetic() || c == '_' {
            let mut end = start;
            while let Some(&(i, ch)) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                    end = i + ch.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Ident(text[start..end].to_string()));
        } else {
            let rest = &text[start..];
            let Some(symbol) = SYMBOLS.iter().find(|s| rest.starts_with(**s)) else {
                return Err(format!("unexpected character '{}' at {}", c, start));
            };
            for _ in 0..symbol.len() {
                chars.next();
            }
            tokens.push(Token::Symbol(*symbol));
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    columns: &'a dyn ColumnResolver,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", symbol)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", keyword)))
        }
    }

    fn error(&self, message: String) -> Error {
        match self.peek() {
            Some(t) => Error::invalid_operation(format!("{} near {:?}", message, t)),
            None => Error::invalid_operation(format!("{} at end of input", message)),
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Expr::or(left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("AND") {
            let right = self.parse_not()?;
            left = Expr::and(left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::not(self.parse_not()?));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;

        if let Some(Token::Symbol(s)) = self.peek() {
            let op = match *s {
                "=" => Some(Op::Eq),
                "<>" | "!=" => Some(Op::Ne),
                "<" => Some(Op::Lt),
                "<=" => Some(Op::Le),
                ">" => Some(Op::Gt),
                ">=" => Some(Op::Ge),
                _ => None,
            };
            if let Some(op) = op {
                self.pos += 1;
                let right = self.parse_additive()?;
                return Ok(Expr::operation(op, vec![left, right]));
            }
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            let e = Expr::is_null(left);
            return Ok(if negated { Expr::not(e) } else { e });
        }

        let negated = self.eat_keyword("NOT");
        let expr = if self.eat_keyword("LIKE") {
            let pattern = self.parse_additive()?;
            let mut args = vec![left, pattern];
            if self.eat_keyword("ESCAPE") {
                args.push(self.parse_additive()?);
            }
            Expr::operation(Op::Like, args)
        } else if self.eat_keyword("IN") {
            self.expect_symbol("(")?;
            let mut args = vec![left];
            loop {
                args.push(self.parse_additive()?);
                if !self.eat_symbol(",") {
                    break;
                }
            }
            self.expect_symbol(")")?;
            Expr::operation(Op::In, args)
        } else if self.eat_keyword("BETWEEN") {
            let low = self.parse_additive()?;
            self.expect_keyword("AND")?;
            let high = self.parse_additive()?;
            Expr::between(left, low, high)
        } else if negated {
            return Err(self.error("expected LIKE, IN or BETWEEN after NOT".into()));
        } else {
            return Ok(left);
        };
        Ok(if negated { Expr::not(expr) } else { expr })
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_symbol("+") {
                Op::Add
            } else if self.eat_symbol("-") {
                Op::Sub
            } else if self.eat_symbol("||") {
                Op::Concat
            } else {
                return Ok(left);
            };
            let right = self.parse_multiplicative()?;
            left = Expr::operation(op, vec![left, right]);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.eat_symbol("*") {
                Op::Mul
            } else if self.eat_symbol("/") {
                Op::Div
            } else if self.eat_symbol("%") {
                Op::Mod
            } else {
                return Ok(left);
            };
            let right = self.parse_unary()?;
            left = Expr::operation(op, vec![left, right]);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat_symbol("-") {
            return Ok(match self.parse_unary()? {
                Expr::Literal(Value::Integer64(i)) => Expr::Literal(Value::Integer64(-i)),
                Expr::Literal(Value::Real(f)) => Expr::Literal(Value::Real(-f)),
                other => Expr::operation(Op::Neg, vec![other]),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Integer64(i))),
            Some(Token::Real(f)) => Ok(Expr::Literal(Value::Real(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Quoted(name)) => self.resolve_column(&name),
            Some(Token::Symbol("(")) => {
                let e = self.parse_or()?;
                self.expect_symbol(")")?;
                Ok(e)
            }
            Some(Token::Ident(word)) => {
                if word.eq_ignore_ascii_case("NULL") {
                    return Ok(Expr::Literal(Value::Null));
                }
                if word.eq_ignore_ascii_case("CAST") && self.eat_symbol("(") {
                    let inner = self.parse_or()?;
                    self.expect_keyword("AS")?;
                    let type_name = match self.next() {
                        Some(Token::Ident(t)) => t,
                        _ => return Err(self.error("expected type name".into())),
                    };
                    let target = FieldType::from_sql_name(&type_name)
                        .ok_or_else(|| self.error(format!("unknown type {}", type_name)))?;
                    // optional width, e.g. CHARACTER(32)
                    if self.eat_symbol("(") {
                        self.parse_additive()?;
                        self.expect_symbol(")")?;
                    }
                    self.expect_symbol(")")?;
                    return Ok(Expr::cast(inner, target));
                }
                if let Some(op) = Op::from_function_name(&word) {
                    if self.eat_symbol("(") {
                        let mut args = Vec::new();
                        if !self.eat_symbol(")") {
                            loop {
                                args.push(self.parse_or()?);
                                if !self.eat_symbol(",") {
                                    break;
                                }
                            }
                            self.expect_symbol(")")?;
                        }
                        return Ok(Expr::operation(op, args));
                    }
                }
                self.resolve_column(&word)
            }
            Some(other) => Err(Error::invalid_operation(format!("unexpected {:?}", other))),
            None => Err(Error::invalid_operation("unexpected end of input")),
        }
    }

    fn resolve_column(&self, name: &str) -> Result<Expr> {
        self.columns.resolve_column(name).map(Expr::Column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Evaluator, ExprEvaluator};
    use crate::unparse::unparse;
    use featql_core::schema::LayerDefnBuilder;

    fn defn() -> LayerDefn {
        LayerDefnBuilder::new("people")
            .add_field("id", FieldType::Integer)
            .unwrap()
            .add_field("name", FieldType::String)
            .unwrap()
            .add_field("score", FieldType::Real)
            .unwrap()
            .build()
    }

    fn passes(filter: &str, row: &[Value]) -> bool {
        let expr = compile_filter(filter, &defn()).unwrap();
        let mut resolver = |_t: usize, f: usize, _ty: FieldType| -> Result<Value> {
            Ok(row.get(f).cloned().unwrap_or(Value::Null))
        };
        ExprEvaluator.test(&expr, &mut resolver).unwrap()
    }

    #[test]
    fn test_simple_comparison() {
        let row = [Value::Integer(10), Value::from("x"), Value::Real(1.5)];
        assert!(passes("id = 10", &row));
        assert!(passes("\"id\" <> 11", &row));
        assert!(passes("score >= 1.5 AND name = 'x'", &row));
        assert!(!passes("id = 10 AND NOT name = 'x'", &row));
        assert!(passes("id < 0 OR (score * 2 = 3)", &row));
    }

    #[test]
    fn test_predicates() {
        let row = [Value::Integer(3), Value::from("O'Neil"), Value::Null];
        assert!(passes("name LIKE 'o''%'", &row));
        assert!(passes("name NOT LIKE 'x%'", &row));
        assert!(passes("id IN (1, 2, 3)", &row));
        assert!(passes("id NOT BETWEEN 4 AND 9", &row));
        assert!(passes("score IS NULL", &row));
        assert!(!passes("score IS NOT NULL", &row));
        assert!(passes("id = -(-3)", &row));
    }

    #[test]
    fn test_cast_and_functions() {
        let row = [Value::Integer(3), Value::from("10"), Value::Null];
        assert!(passes("CAST(\"name\" AS float) = 10", &row));
        assert!(passes("UPPER(name || 'a') = '10A'", &row));
        assert!(passes("COALESCE(score, 7) = 7", &row));
    }

    #[test]
    fn test_pseudo_field_resolution() {
        let expr = compile_filter("FID > 2", &defn()).unwrap();
        let cols = expr.columns();
        assert_eq!(cols[0].field_index, 3);
        assert_eq!(cols[0].field_type, FieldType::Integer64);
    }

    #[test]
    fn test_reals_and_exponents() {
        let row = [Value::Null, Value::Null, Value::Real(1.0e-7)];
        assert!(passes("score = 1e-07", &row));
        assert!(passes("score < .5", &row));
    }

    #[test]
    fn test_roundtrip_through_unparse() {
        let text = "(\"id\" = 1) OR (\"name\" LIKE 'a%')";
        let expr = compile_filter(text, &defn()).unwrap();
        assert_eq!(unparse(&expr), text);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            compile_filter("missing = 1", &defn()),
            Err(Error::FieldNotFound { .. })
        ));
        assert!(matches!(
            compile_filter("id = ", &defn()),
            Err(Error::InvalidFilter { .. })
        ));
        assert!(matches!(
            compile_filter("name = 'open", &defn()),
            Err(Error::InvalidFilter { .. })
        ));
        assert!(compile_filter("id = 1 2", &defn()).is_err());
    }
}
