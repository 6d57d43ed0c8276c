//! SQL LIKE pattern matching.
//!
//! Shared by the expression evaluator and by source layers that evaluate
//! attribute filters natively, so that a filter gives the same answer
//! whether it is pushed down or evaluated by the results layer.
//!
//! Two wildcards are recognized:
//! - `%` matches zero or more characters
//! - `_` matches exactly one character
//!
//! Matching is **case-insensitive** and operates on Unicode scalar values.
//! An optional escape character makes the following wildcard literal.

use alloc::vec::Vec;

/// SQL LIKE pattern matching without an escape character.
///
/// ```
/// use featql_core::pattern_match::like;
/// assert!(like("Hello", "h%O"));
/// assert!(like("hello", "_ello"));
/// assert!(!like("hello", "world"));
/// ```
pub fn like(value: &str, pattern: &str) -> bool {
    like_with_escape(value, pattern, None)
}

/// SQL LIKE pattern matching with an optional escape character.
///
/// ```
/// use featql_core::pattern_match::like_with_escape;
/// assert!(like_with_escape("50%", "50\\%", Some('\\')));
/// assert!(!like_with_escape("500", "50\\%", Some('\\')));
/// ```
pub fn like_with_escape(value: &str, pattern: &str, escape: Option<char>) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p = tokenize(pattern, escape);
    like_tokens(&v, &p)
}

#[derive(Clone, Copy)]
enum Token {
    Any,
    One,
    Char(char),
}

fn tokenize(pattern: &str, escape: Option<char>) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        let token = match ch {
            c if Some(c) == escape => match chars.next() {
                Some(next) => Token::Char(next),
                None => Token::Char(c),
            },
            '%' => Token::Any,
            '_' => Token::One,
            c => Token::Char(c),
        };
        tokens.push(token);
    }
    tokens
}

fn chars_equal(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Greedy matcher. Only the most recent `%` is ever revisited, which keeps
/// matching linear in the text length for each pattern position.
fn like_tokens(v: &[char], p: &[Token]) -> bool {
    let (mut vi, mut pi) = (0, 0);
    // pattern index after the last `%`, and the text index it resumes from
    let mut backtrack: Option<(usize, usize)> = None;
    while vi < v.len() {
        match p.get(pi) {
            Some(Token::Any) => {
                pi += 1;
                backtrack = Some((pi, vi));
                continue;
            }
            Some(Token::One) => {
                vi += 1;
                pi += 1;
                continue;
            }
            Some(Token::Char(ch)) if chars_equal(v[vi], *ch) => {
                vi += 1;
                pi += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((resume, from)) => {
                pi = resume;
                vi = from + 1;
                backtrack = Some((resume, from + 1));
            }
            None => return false,
        }
    }
    p[pi..].iter().all(|t| matches!(t, Token::Any))
}
