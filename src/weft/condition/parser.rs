// SPDX-License-Identifier: MIT

//! Condition expression parser
//!
//! Grammar, loosest binding first:
//! - `a or b`
//! - `a and b`
//! - `not a`
//! - `( a )`
//! - `path op literal` where op is one of `== != > >= < <= contains`
//!
//! Literals are quoted strings, numbers, `true`, `false` and `null`.

use crate::adk::error::ValidationError;

use super::ast::{CompareOp, Expression, Literal};

/// Parse a condition expression
pub fn parse(input: &str) -> Result<Expression, ValidationError> {
    parse_expr(input).map_err(|reason| ValidationError::InvalidCondition {
        expr: input.to_string(),
        reason,
    })
}

fn parse_expr(input: &str) -> Result<Expression, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty expression".to_string());
    }

    if let Some(pos) = find_top_level(input, " or ") {
        let left = parse_expr(&input[..pos])?;
        let right = parse_expr(&input[pos + 4..])?;
        return Ok(Expression::Or(Box::new(left), Box::new(right)));
    }
    if let Some(pos) = find_top_level(input, " and ") {
        let left = parse_expr(&input[..pos])?;
        let right = parse_expr(&input[pos + 5..])?;
        return Ok(Expression::And(Box::new(left), Box::new(right)));
    }
    if let Some(rest) = input.strip_prefix("not ") {
        return Ok(Expression::Not(Box::new(parse_expr(rest)?)));
    }
    if let Some(inner) = strip_parens(input) {
        return parse_expr(inner);
    }

    match input {
        "true" => Ok(Expression::True),
        "false" => Ok(Expression::False),
        _ => parse_comparison(input),
    }
}

fn parse_comparison(input: &str) -> Result<Expression, String> {
    // two-character operators before their one-character prefixes
    let operators = [
        ("!=", CompareOp::NotEq),
        (">=", CompareOp::Gte),
        ("<=", CompareOp::Lte),
        ("==", CompareOp::Eq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
        (" contains ", CompareOp::Contains),
    ];

    for (symbol, op) in operators {
        if let Some(pos) = find_top_level(input, symbol) {
            let path = input[..pos].trim();
            if path.is_empty() || path.contains(char::is_whitespace) {
                return Err(format!("invalid field path '{path}'"));
            }
            let value = parse_literal(&input[pos + symbol.len()..])?;
            return Ok(Expression::Compare {
                path: path.to_string(),
                op,
                value,
            });
        }
    }

    Err(format!("no comparison operator in '{input}'"))
}

/// Byte offset of the first `pattern` outside quotes and parentheses
fn find_top_level(input: &str, pattern: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut depth = 0i32;

    for (i, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                _ if depth == 0 && input[i..].starts_with(pattern) => return Some(i),
                _ => {}
            },
        }
    }
    None
}

/// Inner text when the whole input is one parenthesised group
fn strip_parens(input: &str) -> Option<&str> {
    let inner = input.strip_prefix('(')?.strip_suffix(')')?;
    // reject `(a) and (b)` style inputs whose first group closes early
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in inner.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return None;
                    }
                }
                _ => {}
            },
        }
    }
    (depth == 0).then_some(inner)
}

fn parse_literal(input: &str) -> Result<Literal, String> {
    let input = input.trim();
    match input {
        "null" => return Ok(Literal::Null),
        "true" => return Ok(Literal::Boolean(true)),
        "false" => return Ok(Literal::Boolean(false)),
        _ => {}
    }

    let quoted = input.len() >= 2
        && ((input.starts_with('\'') && input.ends_with('\''))
            || (input.starts_with('"') && input.ends_with('"')));
    if quoted {
        return Ok(Literal::String(input[1..input.len() - 1].to_string()));
    }

    input
        .parse::<f64>()
        .map(Literal::Number)
        .map_err(|_| format!("invalid literal '{input}'"))
}
