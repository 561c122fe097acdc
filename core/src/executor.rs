//! Query planning and execution (spec §4.11): turns a `Predicate` into an
//! index scan or a full table scan, applies whatever the chosen plan
//! doesn't cover in memory, then sorts and pages.

use keyspace_keyexpr::{Record, RecordCodec};
use keyspace_kv::{KeyRange, KvStore, KvTransaction, ReadMode};
use keyspace_query::{apply_offset_limit, apply_sort, evaluate_predicate, plan, Bound, IndexCandidate, Plan, Predicate, Range, SortDescriptor};
use keyspace_tuple::{strinc, Subspace, Value};

use crate::error::RetrievalError;
use crate::index_kind::SubspaceStructure;
use crate::index_state::{IndexState, IndexStateManager};
use crate::keys::Keys;
use crate::metrics::MetricsDelegate;
use crate::schema::Schema;

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub predicate: Predicate,
    pub sort: Vec<SortDescriptor>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new(predicate: Predicate) -> Self {
        Self { predicate, sort: Vec::new(), limit: None, offset: 0 }
    }
}

/// Which plan an executed query actually took, reported to the metrics
/// delegate (spec §5: "observability into whether a query used an index").
#[derive(Debug, Clone)]
pub struct PlanMetrics {
    pub used_index: bool,
    pub index_name: Option<String>,
}

pub struct Executor<'a, K: KvStore> {
    kv: &'a K,
    keys: &'a Keys,
    schema: &'a Schema,
}

impl<'a, K: KvStore> Executor<'a, K> {
    pub fn new(kv: &'a K, keys: &'a Keys, schema: &'a Schema) -> Self {
        Self { kv, keys, schema }
    }

    async fn candidates(&self, entity_name: &str) -> Result<Vec<IndexCandidate>, RetrievalError> {
        let state_manager = IndexStateManager::new(self.kv, self.keys);
        let mut out = Vec::new();
        for descriptor in self.schema.index_descriptors_for(entity_name) {
            // Only flat-shaped (scalar/version) indexes support the
            // multi-row range scans the planner reasons about; min/max are
            // single-value-per-group lookups and count/sum are scalar
            // aggregates, neither of which this general-purpose planner
            // drives.
            if descriptor.kind.subspace_structure() != SubspaceStructure::Flat {
                continue;
            }
            let readable = state_manager.state(&descriptor.name).await? == IndexState::Readable;
            out.push(IndexCandidate { name: descriptor.name.clone(), fields: descriptor.key_paths.clone(), readable });
        }
        Ok(out)
    }

    /// Plans and runs `query` against `entity_name`, returning matching
    /// records plus which plan was taken.
    pub async fn fetch<R: Record + RecordCodec>(
        &self,
        entity_name: &str,
        query: &Query,
        metrics: &dyn MetricsDelegate,
    ) -> Result<(Vec<R>, PlanMetrics), RetrievalError> {
        let candidates = self.candidates(entity_name).await?;
        let index_candidates: Vec<IndexCandidate> = candidates.clone();
        let chosen = plan(&query.predicate, &index_candidates);

        let (mut records, plan_metrics) = match &chosen {
            Plan::EmptyScan => (Vec::new(), PlanMetrics { used_index: false, index_name: None }),
            Plan::TableScan { remaining } => {
                metrics.used_table_scan(entity_name);
                (self.scan_records::<R>(entity_name, remaining).await?, PlanMetrics { used_index: false, index_name: None })
            }
            Plan::Index { index_name, equality_prefix, range, remaining } => {
                metrics.used_index_scan(entity_name, index_name);
                let records = self.scan_index::<R>(entity_name, index_name, equality_prefix, range, remaining).await?;
                (records, PlanMetrics { used_index: true, index_name: Some(index_name.clone()) })
            }
        };

        apply_sort(&mut records, &query.sort).map_err(|e| RetrievalError::Eval(e))?;
        let paged = apply_offset_limit(records, query.offset, query.limit);
        Ok((paged, plan_metrics))
    }

    pub async fn full_scan<R: Record + RecordCodec>(&self, entity_name: &str) -> Result<Vec<R>, RetrievalError> {
        self.scan_records(entity_name, &Predicate::True).await
    }

    pub async fn fetch_by_id<R: Record + RecordCodec>(&self, entity_name: &str, id: &Value) -> Result<Option<R>, RetrievalError> {
        let mut tx = self.kv.begin().await?;
        let key = self.keys.record_key(entity_name, id);
        match tx.get(&key).await? {
            Some(bytes) => Ok(Some(R::deserialize(&bytes).map_err(|e| RetrievalError::DeserializationFailed(e.to_string()))?)),
            None => Ok(None),
        }
    }

    /// Count short-circuit (spec §4.11): an unconditional count reads only
    /// the record subspace's key count; a fully-index-covered predicate
    /// reads only the index range's key count. Anything else falls back to
    /// a full fetch and measures its length.
    pub async fn fetch_count<R: Record + RecordCodec>(&self, entity_name: &str, predicate: &Predicate) -> Result<usize, RetrievalError> {
        if matches!(predicate, Predicate::True) {
            let subspace = self.keys.records(entity_name);
            return self.count_range(&subspace.range()).await;
        }

        let candidates = self.candidates(entity_name).await?;
        let index_candidates: Vec<IndexCandidate> = candidates.clone();
        if let Plan::Index { index_name, equality_prefix, range, remaining } = plan(predicate, &index_candidates) {
            if remaining == Predicate::True {
                let subspace = self.keys.index(&index_name);
                let bounds = scan_bounds(&subspace, &equality_prefix, &range);
                return self.count_range(&bounds).await;
            }
        }

        let (records, _) = self.fetch::<R>(entity_name, &Query::new(predicate.clone()), &crate::metrics::NoopMetrics).await?;
        Ok(records.len())
    }

    async fn count_range(&self, range: &(Vec<u8>, Vec<u8>)) -> Result<usize, RetrievalError> {
        let mut tx = self.kv.begin().await?;
        let entries = tx.range(&KeyRange::new(range.0.clone(), range.1.clone()), ReadMode::Snapshot).await?;
        Ok(entries.len())
    }

    async fn scan_records<R: Record + RecordCodec>(&self, entity_name: &str, remaining: &Predicate) -> Result<Vec<R>, RetrievalError> {
        let subspace = self.keys.records(entity_name);
        let (begin, end) = subspace.range();
        let mut tx = self.kv.begin().await?;
        let entries = tx.range(&KeyRange::new(begin, end), ReadMode::Snapshot).await?;
        let mut out = Vec::with_capacity(entries.len());
        for (_, bytes) in entries {
            let record = R::deserialize(&bytes).map_err(|e| RetrievalError::DeserializationFailed(e.to_string()))?;
            if evaluate_predicate(&record, remaining)? {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn scan_index<R: Record + RecordCodec>(
        &self,
        entity_name: &str,
        index_name: &str,
        equality_prefix: &[Value],
        range: &Range,
        remaining: &Predicate,
    ) -> Result<Vec<R>, RetrievalError> {
        let index_subspace = self.keys.index(index_name);
        let (begin, end) = scan_bounds(&index_subspace, equality_prefix, range);
        let mut tx = self.kv.begin().await?;
        let entries = tx.range(&KeyRange::new(begin, end), ReadMode::Snapshot).await?;

        let mut out = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let mut tuple = index_subspace.unpack(&key)?;
            let Some(id) = tuple.pop() else { continue };
            let record_key = self.keys.record_key(entity_name, &id);
            let Some(bytes) = tx.get(&record_key).await? else { continue };
            let record = R::deserialize(&bytes).map_err(|e| RetrievalError::DeserializationFailed(e.to_string()))?;
            if evaluate_predicate(&record, remaining)? {
                out.push(record);
            }
        }
        Ok(out)
    }
}

/// Translate an index's equality prefix plus a driving-field `Range` into
/// the literal `[begin, end)` byte bounds to scan, per §4.11's
/// per-operator scan-shape table.
fn scan_bounds(subspace: &Subspace, equality_prefix: &[Value], range: &Range) -> (Vec<u8>, Vec<u8>) {
    let prefix_key = subspace.pack(equality_prefix);

    let begin = match &range.lower {
        Bound::Unbounded => prefix_key.clone(),
        Bound::Included(v) => with_value(subspace, equality_prefix, v),
        Bound::Excluded(v) => strinc(&with_value(subspace, equality_prefix, v)),
    };
    let end = match &range.upper {
        Bound::Unbounded => strinc(&prefix_key),
        Bound::Included(v) => strinc(&with_value(subspace, equality_prefix, v)),
        Bound::Excluded(v) => with_value(subspace, equality_prefix, v),
    };
    (begin, end)
}

fn with_value(subspace: &Subspace, equality_prefix: &[Value], value: &Value) -> Vec<u8> {
    let mut tuple = equality_prefix.to_vec();
    tuple.push(value.clone());
    subspace.pack(&tuple)
}
