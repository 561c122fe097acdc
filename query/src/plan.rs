use std::cmp::Ordering;

use keyspace_tuple::{cmp_values, Value};

use crate::predicate::{FieldCondition, Op, Predicate};

/// One end of a scan range.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Unbounded,
    Included(Value),
    Excluded(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub lower: Bound,
    pub upper: Bound,
}

impl Range {
    pub fn everything() -> Self {
        Self { lower: Bound::Unbounded, upper: Bound::Unbounded }
    }
}

/// A candidate index as the planner needs to see it: just enough shape to
/// match the leading conditions of an AND-chain against it (spec §4.5/§4.11).
/// `keyspace-core` builds these from its `IndexDescriptor`s.
#[derive(Debug, Clone)]
pub struct IndexCandidate {
    pub name: String,
    /// Ordered key-expression field paths, leading field first.
    pub fields: Vec<String>,
    pub readable: bool,
}

/// The plan chosen for a query (spec §4.11).
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Scan `indexName` over `range` on its leading unmatched field, after
    /// consuming `equality_prefix` leading `=` columns. Whatever of the
    /// original predicate the index doesn't cover is re-applied in memory.
    Index { index_name: String, equality_prefix: Vec<Value>, range: Range, remaining: Predicate },
    /// No usable, readable index: scan every record of the entity type.
    TableScan { remaining: Predicate },
    /// The predicate can never match (a literal `False`, or contradictory
    /// equality conditions on the same field).
    EmptyScan,
}

/// Choose a plan for `predicate` given the set of candidate indexes on an
/// entity type (spec §4.11 steps 1-4).
pub fn plan(predicate: &Predicate, candidates: &[IndexCandidate]) -> Plan {
    if matches!(predicate, Predicate::False) {
        return Plan::EmptyScan;
    }

    let chain = predicate.flatten_and_chain();
    if chain.is_empty() {
        return Plan::TableScan { remaining: predicate.clone() };
    }

    // Most recent condition per field path wins the scan-driver slot;
    // duplicate equality on the same field with different values can never
    // match, so the plan is empty.
    let mut by_field: std::collections::HashMap<&str, Vec<&crate::predicate::FieldCondition>> = std::collections::HashMap::new();
    for cond in &chain {
        by_field.entry(cond.path.as_str()).or_default().push(cond);
    }
    for conds in by_field.values() {
        let equalities: Vec<&Value> = conds.iter().filter(|c| c.op.is_equality()).filter_map(|c| c.values.first()).collect();
        if equalities.windows(2).any(|w| w[0] != w[1]) {
            return Plan::EmptyScan;
        }
    }

    // Step 2: prefer `=` over range on the same field.
    let best_for_field = |path: &str| -> Option<&crate::predicate::FieldCondition> {
        let conds = by_field.get(path)?;
        conds.iter().find(|c| c.op.is_equality()).or_else(|| conds.first()).copied()
    };

    // Step 3: (a) compound index whose leading k>=2 fields all have `=`.
    let mut best: Option<(&IndexCandidate, usize)> = None;
    for candidate in candidates.iter().filter(|c| c.readable) {
        let leading_equalities = candidate
            .fields
            .iter()
            .take_while(|field| by_field.get(field.as_str()).is_some_and(|conds| conds.iter().any(|c| c.op.is_equality())))
            .count();
        if leading_equalities >= 2 && leading_equalities > best.map_or(0, |(_, n)| n) {
            best = Some((candidate, leading_equalities));
        }
    }
    if let Some((candidate, leading_equalities)) = best {
        return build_index_plan(predicate, candidate, leading_equalities, &by_field, &best_for_field);
    }

    // (b) any index whose leading field has `=`.
    for candidate in candidates.iter().filter(|c| c.readable) {
        if let Some(leading) = candidate.fields.first() {
            if by_field.get(leading.as_str()).is_some_and(|conds| conds.iter().any(|c| c.op.is_equality())) {
                return build_index_plan(predicate, candidate, 1, &by_field, &best_for_field);
            }
        }
    }

    // (c) any index whose leading field has a range condition.
    for candidate in candidates.iter().filter(|c| c.readable) {
        if let Some(leading) = candidate.fields.first() {
            if by_field.contains_key(leading.as_str()) {
                return build_index_plan(predicate, candidate, 0, &by_field, &best_for_field);
            }
        }
    }

    // No readable index applies: full scan, whole predicate applied in memory.
    Plan::TableScan { remaining: predicate.clone() }
}

fn build_index_plan<'a>(
    predicate: &Predicate,
    candidate: &IndexCandidate,
    leading_equalities: usize,
    by_field: &std::collections::HashMap<&str, Vec<&'a crate::predicate::FieldCondition>>,
    best_for_field: &impl Fn(&str) -> Option<&'a crate::predicate::FieldCondition>,
) -> Plan {
    let mut equality_prefix = Vec::with_capacity(leading_equalities);
    let mut covered_fields: Vec<&str> = Vec::new();
    for field in candidate.fields.iter().take(leading_equalities) {
        let cond = best_for_field(field).expect("field known to have an equality condition");
        equality_prefix.push(cond.values.first().cloned().expect("equality condition carries a value"));
        covered_fields.push(field.as_str());
    }

    // The driver field, by construction, has no equality condition of its
    // own (otherwise it would already be part of `leading_equalities`), so
    // every indexable condition on it is a range bound; a two-sided
    // predicate (e.g. `x >= lo AND x <= hi`) must intersect all of them
    // rather than pick just one, or the unconsumed side would silently
    // vanish once `strip_covered` drops the whole field below.
    let range = if let Some(driver_field) = candidate.fields.get(leading_equalities) {
        let indexable: Vec<&FieldCondition> =
            by_field.get(driver_field.as_str()).map(|conds| conds.iter().filter(|c| c.op.is_indexable()).copied().collect()).unwrap_or_default();
        if indexable.is_empty() {
            Range::everything()
        } else {
            covered_fields.push(driver_field.as_str());
            combine_ranges(&indexable)
        }
    } else {
        Range::everything()
    };

    let remaining = strip_covered(predicate, &covered_fields);
    Plan::Index { index_name: candidate.name.clone(), equality_prefix, range, remaining }
}

/// The scan-shape rules of spec §4.11 for a single driving condition.
fn scan_shape(op: Op, value: Option<&Value>) -> Range {
    let value = value.cloned();
    match op {
        Op::Eq => Range { lower: Bound::Included(value.clone().unwrap()), upper: Bound::Included(value.unwrap()) },
        Op::Gt => Range { lower: Bound::Excluded(value.unwrap()), upper: Bound::Unbounded },
        Op::Ge => Range { lower: Bound::Included(value.unwrap()), upper: Bound::Unbounded },
        Op::Lt => Range { lower: Bound::Unbounded, upper: Bound::Excluded(value.unwrap()) },
        Op::Le => Range { lower: Bound::Unbounded, upper: Bound::Included(value.unwrap()) },
        _ => Range::everything(),
    }
}

/// Intersect every condition's scan shape into a single `Range`, tightening
/// as each is folded in.
fn combine_ranges(conds: &[&FieldCondition]) -> Range {
    let mut range = Range::everything();
    for cond in conds {
        let shape = scan_shape(cond.op, cond.values.first());
        range = Range { lower: tighter_lower(range.lower, shape.lower), upper: tighter_upper(range.upper, shape.upper) };
    }
    range
}

fn tighter_lower(a: Bound, b: Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other,
        (Bound::Included(v1), Bound::Included(v2)) => Bound::Included(if cmp_values(&v1, &v2).is_ge() { v1 } else { v2 }),
        (Bound::Excluded(v1), Bound::Excluded(v2)) => Bound::Excluded(if cmp_values(&v1, &v2).is_ge() { v1 } else { v2 }),
        (Bound::Included(v1), Bound::Excluded(v2)) | (Bound::Excluded(v2), Bound::Included(v1)) => {
            if cmp_values(&v2, &v1) == Ordering::Greater || cmp_values(&v2, &v1) == Ordering::Equal {
                Bound::Excluded(v2)
            } else {
                Bound::Included(v1)
            }
        }
    }
}

fn tighter_upper(a: Bound, b: Bound) -> Bound {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other,
        (Bound::Included(v1), Bound::Included(v2)) => Bound::Included(if cmp_values(&v1, &v2).is_le() { v1 } else { v2 }),
        (Bound::Excluded(v1), Bound::Excluded(v2)) => Bound::Excluded(if cmp_values(&v1, &v2).is_le() { v1 } else { v2 }),
        (Bound::Included(v1), Bound::Excluded(v2)) | (Bound::Excluded(v2), Bound::Included(v1)) => {
            if cmp_values(&v2, &v1) == Ordering::Less || cmp_values(&v2, &v1) == Ordering::Equal {
                Bound::Excluded(v2)
            } else {
                Bound::Included(v1)
            }
        }
    }
}

/// Remove the AND-chain leaves the index scan already covers, returning
/// whatever predicate still needs an in-memory post-filter.
fn strip_covered(predicate: &Predicate, covered_fields: &[&str]) -> Predicate {
    match predicate {
        Predicate::Field(cond) if covered_fields.contains(&cond.path.as_str()) => Predicate::True,
        Predicate::And(children) => {
            let remaining: Vec<Predicate> =
                children.iter().map(|child| strip_covered(child, covered_fields)).filter(|p| *p != Predicate::True).collect();
            match remaining.len() {
                0 => Predicate::True,
                1 => remaining.into_iter().next().unwrap(),
                _ => Predicate::And(remaining),
            }
        }
        other => other.clone(),
    }
}
