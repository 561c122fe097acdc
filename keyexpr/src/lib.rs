//! Key-expression AST (spec §4.2) and DataAccess primitives (spec §4.3).
//!
//! Record serialization itself is an external collaborator (spec §1): this
//! crate only defines the `Record`/`RecordCodec` seams a concrete entity
//! type must implement, plus the declarative AST used to pull tuple
//! elements (index key components, ids) out of a record.

use keyspace_tuple::Value;
use thiserror::Error;

mod convert;
mod expr;
mod visit;

pub use convert::IntoValue;
pub use expr::{BoundSide, KeyExpr};
pub use visit::evaluate;

#[derive(Debug, Error, PartialEq)]
pub enum DataAccessError {
    #[error("field not found: {0}")]
    FieldNotFound(String),
    #[error("path traverses an unsupported nested structure: {0}")]
    NestedFieldUnsupported(String),
    #[error("range boundary expressions have no record-side value")]
    RangeBoundaryUnsupported,
}

/// A record that can answer field-path lookups by dotted path segments
/// (e.g. `["context", "session_id"]` for `context.session_id`). This is the
/// only seam the index/query subsystems need into a concrete entity type;
/// how a `Record` stores its fields is entirely up to the implementor.
pub trait Record {
    /// Resolve a dotted field path to a single canonical [`Value`].
    ///
    /// Implementors should fold primitive widths per spec §4.3: all integer
    /// widths to `Value::Int`, all float widths to `Value::Float`, byte
    /// arrays/blobs to `Value::Bytes`, enums to their case name
    /// (`Value::String`), anything else to its printable form as a
    /// last-resort lossy encoding.
    fn field(&self, path: &[&str]) -> Result<Value, DataAccessError>;
}

/// Serialize/deserialize a concrete record type to/from the opaque byte
/// format the KV store persists (spec §4.3: "codec is opaque but must be
/// self-consistent and stable across restarts").
pub trait RecordCodec: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    fn serialize(&self) -> Result<Vec<u8>, Self::Error>;
    fn deserialize(bytes: &[u8]) -> Result<Self, Self::Error>;
}

/// `extractField(record, path)` (spec §4.3): a convenience wrapper around
/// [`Record::field`] for a single dotted path string.
pub fn extract_field<R: Record>(record: &R, path: &str) -> Result<Value, DataAccessError> {
    let segments: Vec<&str> = path.split('.').collect();
    record.field(&segments)
}

/// `extractId(record, idExpression)` (spec §4.3): evaluates the id
/// expression and folds a multi-column result into a single tuple value,
/// per spec §3 ("composite primary keys are represented as a tuple").
pub fn extract_id<R: Record>(record: &R, id_expr: &KeyExpr) -> Result<Value, DataAccessError> {
    let mut values = evaluate(record, id_expr)?;
    if values.len() == 1 {
        Ok(values.pop().unwrap())
    } else {
        Ok(Value::Tuple(values))
    }
}
