use crate::{pack, strinc, unpack, Tuple, TupleError, Value};

/// A subspace is a key prefix formed by packing a prefix tuple. Every key
/// written through a subspace shares that prefix, so a subspace also
/// defines the half-open byte range covering every such key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    /// A subspace rooted at an arbitrary raw byte prefix (e.g. a single
    /// ASCII tag byte like `b"R"` for the record subspace, §6).
    pub fn from_raw_prefix(prefix: impl Into<Vec<u8>>) -> Self { Self { prefix: prefix.into() } }

    /// A subspace whose prefix is the packed encoding of `tuple`.
    pub fn new(tuple: &[Value]) -> Self { Self { prefix: pack(tuple) } }

    /// A child subspace nested under this one, extended by `tuple`.
    pub fn child(&self, tuple: &[Value]) -> Self {
        let mut prefix = self.prefix.clone();
        prefix.extend_from_slice(&pack(tuple));
        Self { prefix }
    }

    pub fn prefix(&self) -> &[u8] { &self.prefix }

    /// Pack `tuple` as a key within this subspace.
    pub fn pack(&self, tuple: &[Value]) -> Vec<u8> {
        let mut out = self.prefix.clone();
        out.extend_from_slice(&pack(tuple));
        out
    }

    /// Unpack a key that was produced by [`Subspace::pack`], stripping this
    /// subspace's prefix first.
    pub fn unpack(&self, key: &[u8]) -> Result<Tuple, TupleError> {
        let rest = key.strip_prefix(self.prefix.as_slice()).ok_or(TupleError::Truncated)?;
        unpack(rest)
    }

    /// The half-open `[begin, end)` byte range covering every key whose
    /// prefix is this subspace's prefix.
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        let begin = self.prefix.clone();
        let end = strinc(&self.prefix);
        (begin, end)
    }
}
