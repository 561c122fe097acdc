//! Error taxonomy (§7): a family of enums rather than one flat type.

use keyspace_keyexpr::DataAccessError;
use keyspace_kv::{KvError, KvLimitError};
use keyspace_query::EvalError;
use keyspace_tuple::{TupleError, Value};
use thiserror::Error;

/// Validation errors (spec §7.1): surfaced to the caller, never recovered
/// locally.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("duplicate index name {name:?}: declared with key paths {key_paths_a:?} and {key_paths_b:?}")]
    DuplicateIndexName { name: String, key_paths_a: Vec<String>, key_paths_b: Vec<String> },
    #[error("index {index} requires at least {expected} key path(s), got {actual}")]
    InvalidTypeCount { index: String, expected: usize, actual: usize },
    #[error("index {index} does not support type {actual} for this key path: {reason}")]
    UnsupportedType { index: String, actual: String, reason: String },
    #[error("custom validation failed for index {index}: {reason}")]
    CustomValidationFailed { index: String, reason: String },
    #[error(transparent)]
    KvLimit(#[from] KvLimitError),
}

/// Schema/state errors (spec §7.2): the planner converts `IndexNotReadable`
/// into "fall back to scan" rather than propagating it.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("index not found: {0}")]
    IndexNotFound(String),
    #[error("entity not found: {0}")]
    EntityNotFound(String),
    #[error("index {0} is not readable")]
    IndexNotReadable(String),
    #[error("unsupported index kind: {0}")]
    UnsupportedIndexKind(String),
    #[error(transparent)]
    Kv(#[from] KvError),
}

/// Logical conflicts and invariant failures raised by an `IndexMaintainer`
/// (spec §7.3/§4.6.5).
#[derive(Debug, Error)]
pub enum MaintainError {
    #[error("unique constraint violated on index {index_name}: {values:?}")]
    UniqueViolation { index_name: String, values: Vec<Value> },
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
    #[error(transparent)]
    Tuple(#[from] TupleError),
    #[error(transparent)]
    Kv(#[from] KvError),
}

/// Data/codec and read-path errors (spec §7.4).
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Tuple(#[from] TupleError),
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),
}

/// Write-path errors (spec §7.4/§7.1 as they surface through `DataStore`).
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Maintain(#[from] MaintainError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
    #[error(transparent)]
    Tuple(#[from] TupleError),
    #[error("entity {entity} id is immutable: record already exists with a different id")]
    IdReassignment { entity: String },
    #[error("serialization failed: {0}")]
    SerializationFailed(String),
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),
}

impl From<RetrievalError> for MutationError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Schema(e) => MutationError::Schema(e),
            RetrievalError::Kv(e) => MutationError::Kv(e),
            RetrievalError::Tuple(e) => MutationError::Tuple(e),
            RetrievalError::DataAccess(e) => MutationError::DataAccess(e),
            RetrievalError::Eval(_) => MutationError::DeserializationFailed("predicate evaluation error during write path".into()),
            RetrievalError::DeserializationFailed(msg) => MutationError::DeserializationFailed(msg),
        }
    }
}
