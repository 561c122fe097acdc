use keyspace_keyexpr::{extract_field, Record};
use keyspace_tuple::Value;

use crate::eval::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortDescriptor {
    pub path: String,
    pub order: SortOrder,
}

impl SortDescriptor {
    pub fn asc(path: impl Into<String>) -> Self {
        Self { path: path.into(), order: SortOrder::Ascending }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self { path: path.into(), order: SortOrder::Descending }
    }
}

/// Stable in-memory sort over a sequence of records (spec §4.11), applied
/// before offset/limit. Comparison follows the same coercion rules as
/// predicate evaluation: int/float widths to double, UUIDs by canonical
/// string, strings lexicographically, booleans false < true, with a
/// missing field treated as `Value::Null` (sorting lowest ascending).
pub fn apply_sort<R: Record>(records: &mut [R], descriptors: &[SortDescriptor]) -> Result<(), EvalError> {
    if descriptors.is_empty() {
        return Ok(());
    }

    let mut keyed: Vec<(usize, Vec<Value>)> = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let mut key = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let value = match extract_field(record, &descriptor.path) {
                Ok(v) => v,
                Err(keyspace_keyexpr::DataAccessError::FieldNotFound(_)) => Value::Null,
                Err(other) => return Err(other.into()),
            };
            key.push(value);
        }
        keyed.push((i, key));
    }

    keyed.sort_by(|(_, a), (_, b)| {
        for (i, descriptor) in descriptors.iter().enumerate() {
            let ordering = compare_sort_values(&a[i], &b[i]);
            let ordering = match descriptor.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });

    // `sort_by` is stable; reorder `records` to match the sorted key order.
    let order: Vec<usize> = keyed.into_iter().map(|(i, _)| i).collect();
    reorder_in_place(records, &order);
    Ok(())
}

fn reorder_in_place<R>(records: &mut [R], order: &[usize]) {
    // Apply a permutation in place using a visited bitmap + cycle walk, since
    // `R` need not be `Clone` and records can be large.
    let mut visited = vec![false; order.len()];
    for start in 0..order.len() {
        if visited[start] || order[start] == start {
            visited[start] = true;
            continue;
        }
        let mut current = start;
        loop {
            visited[current] = true;
            let next = order[current];
            if next == start {
                break;
            }
            records.swap(current, next);
            current = next;
        }
    }
}

fn compare_sort_values(a: &Value, b: &Value) -> std::cmp::Ordering {
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
        _ => Ordering::Equal,
    }
}

/// Apply offset then limit, in that order (spec §4.11).
pub fn apply_offset_limit<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let skipped: Vec<T> = items.into_iter().skip(offset).collect();
    match limit {
        Some(n) => skipped.into_iter().take(n).collect(),
        None => skipped,
    }
}
