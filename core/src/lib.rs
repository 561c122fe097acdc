//! Secondary indexes, online index maintenance, and a query planner/executor
//! layered atop a transactional key-value store (spec §1).
//!
//! This crate wires together four narrower crates — `keyspace-tuple` (the
//! order-preserving byte codec), `keyspace-keyexpr` (field-extraction AST),
//! `keyspace-kv` (the transactional KV contract plus two backends), and
//! `keyspace-query` (predicate/plan/sort) — into the schema, maintainers,
//! builder, scrubber, and `DataStore` facade a caller actually persists
//! records through.

pub mod builder;
pub mod error;
pub mod executor;
pub mod index_kind;
pub mod index_state;
pub mod keys;
pub mod maintainer;
pub mod metrics;
pub mod range_set;
mod retry;
pub mod schema;
pub mod scrubber;
pub mod store;

pub use builder::{BuildSummary, Builder, BuilderConfig, TerminationReason};
pub use error::{MaintainError, MutationError, RetrievalError, SchemaError, ValidationError};
pub use executor::{Executor, PlanMetrics, Query};
pub use index_kind::{IndexKind, SubspaceStructure};
pub use index_state::{read_state_in_tx, IndexState, IndexStateManager};
pub use keys::{Keys, ScrubPhase};
pub use maintainer::{make_maintainer, CountMaintainer, CustomBuildStrategy, IndexMaintainer, MaxMaintainer, MinMaintainer, ScalarMaintainer, SumMaintainer};
pub use metrics::{MetricsDelegate, NoopMetrics};
pub use range_set::{ByteRange, RangeSet};
pub use schema::{CommonOptions, EnumMeta, Entity, FormerIndex, IndexDescriptor, Schema, SchemaVersion};
pub use scrubber::{ScrubSummary, Scrubber, ScrubberConfig};
pub use store::{BatchCtx, BatchOp, DataStore, DeleteOp, InsertOp, Persistable};

// Re-exported so a caller depending only on `keyspace-core` still has every
// type its public API surface mentions (spec §1's crate-layout diagram: the
// core crate is the one integration point applications depend on).
pub use keyspace_keyexpr::{
    extract_field, extract_id, BoundSide, DataAccessError, IntoValue, KeyExpr, Record, RecordCodec,
};
pub use keyspace_kv::{
    validate_key, validate_value, KeyRange, KvError, KvLimitError, KvResult, KvStore, KvTransaction, MemoryKv, ReadMode, SledKv,
};
pub use keyspace_query::{
    apply_offset_limit, apply_sort, evaluate_predicate, plan, Bound, EvalError, FieldCondition, IndexCandidate, Op, Plan, Predicate,
    Range, SortDescriptor, SortOrder,
};
pub use keyspace_tuple::{pack, strinc, unpack, Subspace, Tuple, TupleError, Value};
