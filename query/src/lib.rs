//! Predicate evaluation, in-memory sorting, and index-aware query planning
//! over an entity type (spec §4.11).

mod eval;
mod plan;
mod predicate;
mod sort;

pub use eval::{evaluate_predicate, EvalError};
pub use plan::{plan, Bound, IndexCandidate, Plan, Range};
pub use predicate::{FieldCondition, Op, Predicate};
pub use sort::{apply_offset_limit, apply_sort, SortDescriptor, SortOrder};
