//! The ordered, transactional key-value contract every index maintainer,
//! builder, and scrubber is written against (spec §6), plus two backends:
//! an in-memory reference engine for tests and a `sled`-backed engine for
//! real persistence.

mod limits;
mod memory;
mod sled_engine;

pub use limits::{validate_key, validate_value, KvLimitError, MAX_KEY_BYTES, MAX_VALUE_BYTES};
pub use memory::MemoryKv;
pub use sled_engine::SledKv;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error(transparent)]
    Limit(#[from] KvLimitError),
    #[error("transaction conflicted with a concurrent writer after exhausting retries")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}

pub type KvResult<T> = Result<T, KvError>;

/// A half-open byte range `[begin, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub begin: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    pub fn new(begin: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self { begin: begin.into(), end: end.into() }
    }
}

/// Whether a range read takes part in the enclosing transaction's
/// read-conflict set (spec §5: "reads use snapshot semantics by default for
/// scans; point fetches use serialisable reads when they participate in a
/// write transaction").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Snapshot,
    Serializable,
}

/// One committed-or-not-at-all unit of work against the store. Every method
/// suspends (spec §5); none block a thread. Dropping a transaction without
/// calling `commit` aborts it.
#[async_trait]
pub trait KvTransaction: Send {
    async fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    async fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()>;

    async fn clear(&mut self, key: &[u8]) -> KvResult<()>;

    /// Range read, keys in byte order.
    async fn range(&mut self, range: &KeyRange, mode: ReadMode) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>>;

    async fn clear_range(&mut self, range: &KeyRange) -> KvResult<()>;

    /// Atomic little-endian 64-bit add; creates the key as `delta` if absent.
    async fn atomic_add(&mut self, key: &[u8], delta: i64) -> KvResult<()>;

    /// Commit this transaction. Consumes `self`: there is no path back to
    /// an uncommitted transaction after this call, success or failure.
    async fn commit(self: Box<Self>) -> KvResult<()>;
}

/// The store itself: begins the scoped transactions that a surrounding
/// retry helper (spec §5: "a scoped helper that guarantees either commit or
/// abort on every exit path") drives to completion.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn begin(&self) -> KvResult<Box<dyn KvTransaction>>;
}
