use keyspace_tuple::Value;

/// A comparison or text operator usable in a [`Predicate::Field`] leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    HasPrefix,
    HasSuffix,
    In,
    IsNil,
    IsNotNil,
}

impl Op {
    /// Operators a planner may lift onto an index scan when they appear in
    /// an AND-chain. Disjunctions and negations are never index-lifted
    /// regardless of the operator they contain.
    pub fn is_indexable(self) -> bool {
        matches!(self, Op::Eq | Op::Lt | Op::Le | Op::Gt | Op::Ge)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Op::Eq)
    }

    pub fn is_range(self) -> bool {
        matches!(self, Op::Lt | Op::Le | Op::Gt | Op::Ge)
    }
}

/// A predicate tree over an entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Field(FieldCondition),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    True,
    False,
}

/// An absent predicate matches every record (spec §4.11: `True`).
impl Default for Predicate {
    fn default() -> Self { Predicate::True }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub path: String,
    pub op: Op,
    /// Absent for `isNil`/`isNotNil`; a single-element list for most
    /// operators; a multi-element list for `in`.
    pub values: Vec<Value>,
}

impl Predicate {
    pub fn field(path: impl Into<String>, op: Op, value: Value) -> Self {
        Predicate::Field(FieldCondition { path: path.into(), op, values: vec![value] })
    }

    pub fn is_nil(path: impl Into<String>) -> Self {
        Predicate::Field(FieldCondition { path: path.into(), op: Op::IsNil, values: Vec::new() })
    }

    pub fn is_not_nil(path: impl Into<String>) -> Self {
        Predicate::Field(FieldCondition { path: path.into(), op: Op::IsNotNil, values: Vec::new() })
    }

    pub fn and(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(predicates.into_iter().collect())
    }

    pub fn or(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(predicates.into_iter().collect())
    }

    /// Gather the atomic, indexable conditions out of a top-level AND-chain
    /// (spec §4.11 step 1). A bare indexable `Field` leaf counts as a
    /// one-element AND-chain; disjunctions and negations never contribute,
    /// even nested inside an otherwise-indexable AND.
    pub fn flatten_and_chain(&self) -> Vec<&FieldCondition> {
        match self {
            Predicate::Field(cond) if cond.op.is_indexable() => vec![cond],
            Predicate::And(children) => children
                .iter()
                .filter_map(|child| match child {
                    Predicate::Field(cond) if cond.op.is_indexable() => Some(cond),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
