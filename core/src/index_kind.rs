//! `IndexKind` protocol (spec §4.5): metadata contract shared by every
//! built-in kind, plus the open extension point for third-party kinds.

use crate::error::ValidationError;

/// The shape an index's subspace takes, used by the builder/scrubber to
/// decide whether per-record ids are present in the index key at all
/// (spec §3's `subspaceStructure` discriminator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubspaceStructure {
    Flat,
    Hierarchical,
    Aggregation,
}

/// A value with a stable identifier, a subspace-structure discriminator,
/// and a field-count/type validator (spec §4.5 table). Built-in kinds are a
/// closed tagged union; `Extension` is the open third-party seam (spec §9:
/// "closed tagged union for the built-in kinds... plus an open extension
/// trait/interface").
#[derive(Debug, Clone, PartialEq)]
pub enum IndexKind {
    Scalar,
    Count,
    Sum,
    Min,
    Max,
    Version,
    Extension { identifier: String, subspace_structure: SubspaceStructure },
}

impl IndexKind {
    pub fn identifier(&self) -> &str {
        match self {
            IndexKind::Scalar => "scalar",
            IndexKind::Count => "count",
            IndexKind::Sum => "sum",
            IndexKind::Min => "min",
            IndexKind::Max => "max",
            IndexKind::Version => "version",
            IndexKind::Extension { identifier, .. } => identifier,
        }
    }

    pub fn subspace_structure(&self) -> SubspaceStructure {
        match self {
            IndexKind::Scalar | IndexKind::Version => SubspaceStructure::Flat,
            IndexKind::Min | IndexKind::Max => SubspaceStructure::Hierarchical,
            IndexKind::Count | IndexKind::Sum => SubspaceStructure::Aggregation,
            IndexKind::Extension { subspace_structure, .. } => *subspace_structure,
        }
    }

    /// Field-count validation per §4.5's table. Built-in kinds only
    /// validate arity here; per-element type comparability is enforced by
    /// the tuple codec itself (every `Value` variant is totally ordered).
    pub fn validate_types(&self, index_name: &str, key_path_count: usize) -> Result<(), ValidationError> {
        let min = match self {
            IndexKind::Scalar => 1,
            IndexKind::Count => 1,
            IndexKind::Sum => 2,
            IndexKind::Min | IndexKind::Max => 2,
            IndexKind::Version => 0,
            IndexKind::Extension { .. } => return Ok(()),
        };
        if key_path_count < min {
            return Err(ValidationError::InvalidTypeCount { index: index_name.to_string(), expected: min, actual: key_path_count });
        }
        Ok(())
    }
}
