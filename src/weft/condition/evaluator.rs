// SPDX-License-Identifier: MIT

//! Condition evaluation against workflow state

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::weft::state::{StateValue, WorkflowState};

use super::ast::{CompareOp, Expression, Literal};

/// Evaluate `expr` against `state`. Missing fields read as `null`;
/// comparisons between incompatible types are false.
pub fn evaluate(expr: &Expression, state: &WorkflowState) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::Compare { path, op, value } => compare(state.get_path(path), *op, value),
        Expression::And(left, right) => evaluate(left, state) && evaluate(right, state),
        Expression::Or(left, right) => evaluate(left, state) || evaluate(right, state),
        Expression::Not(inner) => !evaluate(inner, state),
    }
}

fn compare(actual: Option<&StateValue>, op: CompareOp, expected: &Literal) -> bool {
    match op {
        CompareOp::Eq => equals(actual, expected),
        CompareOp::NotEq => !equals(actual, expected),
        CompareOp::Gt => ordering(actual, expected) == Some(Ordering::Greater),
        CompareOp::Gte => matches!(
            ordering(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Lt => ordering(actual, expected) == Some(Ordering::Less),
        CompareOp::Lte => matches!(
            ordering(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Contains => contains(actual, expected),
    }
}

fn equals(actual: Option<&StateValue>, expected: &Literal) -> bool {
    match (actual, expected) {
        (None | Some(StateValue::Null), Literal::Null) => true,
        (Some(value), literal) => matches_literal(value, literal),
        (None, _) => false,
    }
}

fn matches_literal(value: &StateValue, literal: &Literal) -> bool {
    match (value, literal) {
        (StateValue::Null, Literal::Null) => true,
        (StateValue::String(s), Literal::String(l)) => s == l,
        (StateValue::Bool(b), Literal::Boolean(l)) => b == l,
        (StateValue::DateTime(dt), Literal::String(l)) => parse_date(l) == Some(*dt),
        (v, Literal::Number(l)) => v.as_f64().is_some_and(|n| (n - l).abs() < f64::EPSILON),
        _ => false,
    }
}

fn ordering(actual: Option<&StateValue>, expected: &Literal) -> Option<Ordering> {
    match (actual?, expected) {
        (StateValue::String(s), Literal::String(l)) => Some(s.as_str().cmp(l.as_str())),
        (StateValue::DateTime(dt), Literal::String(l)) => Some(dt.cmp(&parse_date(l)?)),
        (v, Literal::Number(l)) => v.as_f64()?.partial_cmp(l),
        _ => None,
    }
}

fn contains(actual: Option<&StateValue>, expected: &Literal) -> bool {
    match (actual, expected) {
        (Some(StateValue::String(s)), Literal::String(sub)) => s.contains(sub.as_str()),
        (Some(StateValue::List(items)), literal) => {
            items.iter().any(|item| matches_literal(item, literal))
        }
        (Some(StateValue::Map(map)), Literal::String(key)) => map.contains_key(key),
        _ => false,
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
