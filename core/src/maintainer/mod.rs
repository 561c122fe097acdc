//! `IndexMaintainer` protocol (spec §4.6): one implementation per
//! `IndexKind`, each keeping a single index's subspace in sync as records
//! are written, and each able to recompute its contribution from scratch
//! during an online build or scrub.
//!
//! Maintainers operate on pre-extracted `&[Value]` rather than `&dyn
//! Record`, since `Record::field` is resolved generically by the caller
//! (`keyspace_keyexpr::evaluate`) before a maintainer ever sees the data;
//! this is what keeps the trait dyn-safe while still async.

mod count;
mod minmax;
mod scalar;
mod sum;

use async_trait::async_trait;
use keyspace_kv::KvTransaction;
use keyspace_tuple::{Subspace, Value};

use crate::error::{MaintainError, SchemaError};
use crate::schema::IndexDescriptor;

pub use count::CountMaintainer;
pub use minmax::{MaxMaintainer, MinMaintainer};
pub use scalar::ScalarMaintainer;
pub use sum::SumMaintainer;

/// Marker for a third-party `IndexKind::Extension`'s own build strategy,
/// returned from [`IndexMaintainer::custom_build_strategy`] (spec §4.9:
/// "an index kind may supply its own build strategy instead of the
/// generic record-by-record rebuild").
pub trait CustomBuildStrategy: Send + Sync {
    fn name(&self) -> &str;
}

/// Keeps one index's subspace consistent with record writes, and can also
/// recompute its own contribution for a single record from scratch (used
/// by the online builder and scrubber).
#[async_trait]
pub trait IndexMaintainer: Send + Sync {
    /// Apply the delta between `old` and `new` extracted key-path values
    /// for record `id` (spec §4.6). Both `None` is a no-op; `old` present
    /// with `new` absent is a delete; `old` absent with `new` present is an
    /// insert; both present is an update.
    async fn update(
        &self,
        old: Option<&[Value]>,
        new: Option<&[Value]>,
        id: &Value,
        tx: &mut dyn KvTransaction,
    ) -> Result<(), MaintainError>;

    /// Recompute this index's contribution for `values`/`id` as if inserting
    /// fresh (spec §4.9 step 4: "for every record in the batch, compute the
    /// index entries and write them").
    async fn scan(&self, values: &[Value], id: &Value, tx: &mut dyn KvTransaction) -> Result<(), MaintainError>;

    /// The raw index keys a record with `values`/`id` would currently own,
    /// used by the scrubber to detect dangling entries. Aggregation-shaped
    /// kinds (count/sum) have no per-record key and return an empty list.
    fn compute_index_keys(&self, _values: &[Value], _id: &Value) -> Vec<Vec<u8>> {
        Vec::new()
    }

    /// An index kind may opt out of the generic record-by-record rebuild.
    fn custom_build_strategy(&self) -> Option<&dyn CustomBuildStrategy> {
        None
    }
}

/// Construct the maintainer for `descriptor`, rooted at `subspace` (spec
/// §4.6: `makeMaintainer(descriptor)`).
pub fn make_maintainer(descriptor: &IndexDescriptor, subspace: Subspace) -> Result<Box<dyn IndexMaintainer>, SchemaError> {
    use crate::index_kind::IndexKind;
    match &descriptor.kind {
        IndexKind::Scalar | IndexKind::Version => {
            Ok(Box::new(ScalarMaintainer::new(descriptor.name.clone(), subspace, descriptor.common_options.unique)))
        }
        IndexKind::Count => Ok(Box::new(CountMaintainer::new(subspace))),
        IndexKind::Sum => Ok(Box::new(SumMaintainer::new(subspace))),
        IndexKind::Min => Ok(Box::new(MinMaintainer::new(subspace))),
        IndexKind::Max => Ok(Box::new(MaxMaintainer::new(subspace))),
        IndexKind::Extension { identifier, .. } => Err(SchemaError::UnsupportedIndexKind(identifier.clone())),
    }
}
