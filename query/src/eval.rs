use keyspace_keyexpr::{extract_field, DataAccessError, Record};
use keyspace_tuple::Value;
use thiserror::Error;

use crate::predicate::{FieldCondition, Op, Predicate};

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

/// Apply a predicate tree to a record in memory (spec §4.11: post-filter
/// for conditions the chosen index doesn't cover, or the sole filter for a
/// full entity-type scan). `isNil`/field-not-found treat a missing field as
/// `Value::Null`, matching the tuple codec's "nulls lowest" ordering.
pub fn evaluate_predicate<R: Record>(record: &R, predicate: &Predicate) -> Result<bool, EvalError> {
    match predicate {
        Predicate::True => Ok(true),
        Predicate::False => Ok(false),
        Predicate::Not(inner) => Ok(!evaluate_predicate(record, inner)?),
        Predicate::And(children) => {
            for child in children {
                if !evaluate_predicate(record, child)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(children) => {
            for child in children {
                if evaluate_predicate(record, child)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Field(cond) => evaluate_field(record, cond),
    }
}

fn evaluate_field<R: Record>(record: &R, cond: &FieldCondition) -> Result<bool, EvalError> {
    let actual = match extract_field(record, &cond.path) {
        Ok(value) => value,
        Err(DataAccessError::FieldNotFound(_)) => Value::Null,
        Err(other) => return Err(other.into()),
    };

    Ok(match cond.op {
        Op::IsNil => matches!(actual, Value::Null),
        Op::IsNotNil => !matches!(actual, Value::Null),
        Op::Eq => cond.values.first().is_some_and(|v| &actual == v),
        Op::Ne => cond.values.first().is_some_and(|v| &actual != v),
        Op::Lt => cond.values.first().is_some_and(|v| compare(&actual, v).is_lt()),
        Op::Le => cond.values.first().is_some_and(|v| compare(&actual, v).is_le()),
        Op::Gt => cond.values.first().is_some_and(|v| compare(&actual, v).is_gt()),
        Op::Ge => cond.values.first().is_some_and(|v| compare(&actual, v).is_ge()),
        Op::In => cond.values.iter().any(|v| v == &actual),
        Op::Contains => text_op(&actual, &cond.values, |haystack, needle| haystack.contains(needle)),
        Op::HasPrefix => text_op(&actual, &cond.values, |haystack, needle| haystack.starts_with(needle)),
        Op::HasSuffix => text_op(&actual, &cond.values, |haystack, needle| haystack.ends_with(needle)),
    })
}

fn text_op(actual: &Value, values: &[Value], f: impl Fn(&str, &str) -> bool) -> bool {
    match (actual, values.first()) {
        (Value::String(haystack), Some(Value::String(needle))) => f(haystack, needle),
        _ => false,
    }
}

/// Ordering for sort descriptors and range-typed comparisons (spec §4.11):
/// numeric comparison coerces any int/float widths to double, UUIDs compare
/// by canonical string, strings lexicographically, booleans false < true.
fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Uuid(x), Value::Uuid(y)) => x.to_string().cmp(&y.to_string()),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        (Value::Tuple(x), Value::Tuple(y)) => x.iter().cmp_by(y.iter(), compare),
        _ => Ordering::Equal,
    }
}

trait IterCmpBy: Iterator + Sized {
    fn cmp_by<J: Iterator<Item = Self::Item>>(
        self,
        other: J,
        mut f: impl FnMut(&Self::Item, &Self::Item) -> std::cmp::Ordering,
    ) -> std::cmp::Ordering {
        let mut a = self;
        let mut b = other;
        loop {
            return match (a.next(), b.next()) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (Some(x), Some(y)) => match f(&x, &y) {
                    std::cmp::Ordering::Equal => continue,
                    other => other,
                },
            };
        }
    }
}

impl<I: Iterator> IterCmpBy for I {}
