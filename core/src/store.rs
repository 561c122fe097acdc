//! `DataStore` facade (spec §4.12): the single entry point applications use
//! to persist and query typed records. Every write opens one KV
//! transaction, reads the pre-image for index diffing, writes the new
//! bytes, then drives every applicable `IndexMaintainer` before commit;
//! every read goes through the planner/executor (spec §4.11).

use std::marker::PhantomData;

use async_trait::async_trait;
use keyspace_keyexpr::{evaluate, extract_id, Record, RecordCodec};
use keyspace_kv::{KeyRange, KvStore, KvTransaction};
use keyspace_query::Predicate;
use keyspace_tuple::{Subspace, Value};

use crate::builder::{Builder, BuilderConfig};
use crate::error::{MutationError, RetrievalError, SchemaError};
use crate::executor::{Executor, Query};
use crate::index_state::{read_state_in_tx, IndexState, IndexStateManager};
use crate::keys::Keys;
use crate::maintainer::make_maintainer;
use crate::metrics::{MetricsDelegate, NoopMetrics};
use crate::schema::{IndexDescriptor, Schema};
use crate::scrubber::{Scrubber, ScrubberConfig};

/// A concrete entity type the `DataStore` can persist: a `Record` (field
/// extraction) plus a `RecordCodec` (opaque byte codec), bound to the
/// `Entity` declaration of the same name in the governing `Schema` (§3:
/// "Every entity has exactly one identity value"). A future
/// `derive`/reflection layer (out of scope, §1) would generate this impl;
/// here it is written by hand.
pub trait Persistable: Record + RecordCodec + Send + Sync + 'static {
    fn entity_name() -> &'static str;
}

/// Orchestrates the KV store, schema, and index maintainers behind the
/// operations of spec §4.12.
pub struct DataStore<K: KvStore> {
    kv: K,
    keys: Keys,
    schema: Schema,
    metrics: Box<dyn MetricsDelegate>,
}

impl<K: KvStore> DataStore<K> {
    pub fn new(kv: K, root: Subspace, schema: Schema) -> Self {
        Self::with_metrics(kv, root, schema, Box::new(NoopMetrics))
    }

    pub fn with_metrics(kv: K, root: Subspace, schema: Schema, metrics: Box<dyn MetricsDelegate>) -> Self {
        Self { kv, keys: Keys::new(root), schema, metrics }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// The underlying KV engine, for callers that need to step outside the
    /// facade (an out-of-band migration, a scrubber harness in a test).
    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn index_state_manager(&self) -> IndexStateManager<'_, K> {
        IndexStateManager::new(&self.kv, &self.keys)
    }

    /// A builder bound to this store's KV engine and key layout (spec
    /// §4.9); callers drive `build` themselves, typically from a migration
    /// step rather than from request-serving code.
    pub fn builder(&self, config: BuilderConfig) -> Builder<'_, K> {
        Builder::new(&self.kv, &self.keys, config)
    }

    /// A scrubber bound to this store (spec §4.10).
    pub fn scrubber(&self, config: ScrubberConfig) -> Scrubber<'_, K> {
        Scrubber::new(&self.kv, &self.keys, config)
    }

    /// `save(records)` (spec §4.12): upsert every record of `records` in one
    /// transaction, maintaining every applicable non-`disabled` index.
    pub async fn save<R: Persistable>(&self, records: Vec<R>) -> Result<(), MutationError> {
        let start = std::time::Instant::now();
        let count = records.len();
        let result = self.save_inner(records).await;
        match &result {
            Ok(()) => self.metrics.did_save(R::entity_name(), count, start.elapsed()),
            Err(_) => self.metrics.did_fail_save(R::entity_name()),
        }
        result
    }

    async fn save_inner<R: Persistable>(&self, records: Vec<R>) -> Result<(), MutationError> {
        let mut tx = self.kv.begin().await?;
        apply_save_in_tx(&self.schema, &self.keys, &records, tx.as_mut()).await?;
        tx.commit().await?;
        Ok(())
    }

    /// `delete(records)` (spec §4.12): derives each record's id from the
    /// schema's declared id expression, then removes the record and every
    /// index entry it owns.
    pub async fn delete<R: Persistable>(&self, records: Vec<R>) -> Result<(), MutationError> {
        let entity_name = R::entity_name();
        let entity = self.schema.entity_by_name(entity_name).ok_or_else(|| SchemaError::EntityNotFound(entity_name.to_string()))?;
        let id_expr = entity.id_expr.clone();
        let ids: Result<Vec<Value>, _> = records.iter().map(|r| extract_id(r, &id_expr)).collect();
        self.delete_by_ids::<R>(ids?).await
    }

    /// `deleteById(T, id)` (spec §4.12).
    pub async fn delete_by_id<R: Persistable>(&self, id: Value) -> Result<(), MutationError> {
        self.delete_by_ids::<R>(vec![id]).await
    }

    async fn delete_by_ids<R: Persistable>(&self, ids: Vec<Value>) -> Result<(), MutationError> {
        let start = std::time::Instant::now();
        let result = async {
            let mut tx = self.kv.begin().await?;
            apply_delete_in_tx::<R>(&self.schema, &self.keys, &ids, tx.as_mut()).await?;
            tx.commit().await?;
            Ok::<(), MutationError>(())
        }
        .await;
        match &result {
            Ok(()) => self.metrics.did_delete(R::entity_name(), ids.len(), start.elapsed()),
            Err(_) => self.metrics.did_fail_delete(R::entity_name()),
        }
        result
    }

    /// `executeBatch(inserts, deletes)` (spec §4.12): heterogeneous record
    /// types, one KV transaction. Build operations with [`InsertOp::new`]
    /// and [`DeleteOp::new`].
    pub async fn execute_batch(&self, inserts: Vec<Box<dyn BatchOp>>, deletes: Vec<Box<dyn BatchOp>>) -> Result<(), MutationError> {
        let start = std::time::Instant::now();
        let insert_count = inserts.len();
        let delete_count = deletes.len();
        let ctx = BatchCtx { keys: &self.keys, schema: &self.schema };

        let result = async {
            let mut tx = self.kv.begin().await?;
            for op in inserts.into_iter().chain(deletes.into_iter()) {
                op.apply(&ctx, tx.as_mut()).await?;
            }
            tx.commit().await?;
            Ok::<(), MutationError>(())
        }
        .await;

        match &result {
            Ok(()) => self.metrics.did_execute_batch(insert_count, delete_count, start.elapsed()),
            Err(_) => self.metrics.did_fail_execute_batch(),
        }
        result
    }

    /// `clearAll(T)` (spec §4.12): range-clear the entity's record
    /// subspace and every index subspace that applies to it. Index state
    /// (spec §4.7) is left untouched — a cleared `readable` index simply
    /// reports zero entries until rebuilt or re-scrubbed (design decision,
    /// see DESIGN.md).
    pub async fn clear_all<R: Persistable>(&self) -> Result<(), MutationError> {
        let entity_name = R::entity_name();
        self.schema.entity_by_name(entity_name).ok_or_else(|| SchemaError::EntityNotFound(entity_name.to_string()))?;
        let descriptors = self.schema.index_descriptors_for(entity_name);

        let mut tx = self.kv.begin().await?;
        let (begin, end) = self.keys.records(entity_name).range();
        tx.clear_range(&KeyRange::new(begin, end)).await?;
        for descriptor in descriptors {
            let (begin, end) = self.keys.index(&descriptor.name).range();
            tx.clear_range(&KeyRange::new(begin, end)).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// `fetchAll(T)` (spec §4.12): every record of the entity type, in key
    /// order, no predicate applied.
    pub async fn fetch_all<R: Persistable>(&self) -> Result<Vec<R>, RetrievalError> {
        let start = std::time::Instant::now();
        let executor = Executor::new(&self.kv, &self.keys, &self.schema);
        let result = executor.full_scan::<R>(R::entity_name()).await;
        self.report_fetch::<R>(&result, start);
        result
    }

    /// `fetchById(T, id)` (spec §4.12).
    pub async fn fetch_by_id<R: Persistable>(&self, id: &Value) -> Result<Option<R>, RetrievalError> {
        let executor = Executor::new(&self.kv, &self.keys, &self.schema);
        executor.fetch_by_id::<R>(R::entity_name(), id).await
    }

    /// `fetch(query<T>)` (spec §4.12): plan, execute, sort, and page.
    pub async fn fetch<R: Persistable>(&self, query: &Query) -> Result<Vec<R>, RetrievalError> {
        let start = std::time::Instant::now();
        let executor = Executor::new(&self.kv, &self.keys, &self.schema);
        let result = executor.fetch::<R>(R::entity_name(), query, self.metrics.as_ref()).await;
        let records_result = result.map(|(records, _)| records);
        self.report_fetch::<R>(&records_result, start);
        records_result
    }

    /// `fetchCount(query<T>)` (spec §4.12): the count short-circuit of
    /// spec §4.11, applied to `predicate` alone (sort/offset/limit do not
    /// affect a count).
    pub async fn fetch_count<R: Persistable>(&self, predicate: &Predicate) -> Result<usize, RetrievalError> {
        let executor = Executor::new(&self.kv, &self.keys, &self.schema);
        executor.fetch_count::<R>(R::entity_name(), predicate).await
    }

    fn report_fetch<R: Persistable>(&self, result: &Result<Vec<R>, RetrievalError>, start: std::time::Instant) {
        match result {
            Ok(records) => self.metrics.did_fetch(R::entity_name(), records.len(), start.elapsed()),
            Err(_) => self.metrics.did_fail_fetch(R::entity_name()),
        }
    }
}

/// Shared write-path logic (spec §4.12 "Write path"): read the pre-image,
/// diff each applicable index, then write the new bytes. Used by both the
/// direct `save` entry point and [`InsertOp`] inside `executeBatch`.
async fn apply_save_in_tx<R: Persistable>(
    schema: &Schema,
    keys: &Keys,
    records: &[R],
    tx: &mut dyn KvTransaction,
) -> Result<(), MutationError> {
    let entity_name = R::entity_name();
    let entity = schema.entity_by_name(entity_name).ok_or_else(|| SchemaError::EntityNotFound(entity_name.to_string()))?;
    let id_expr = entity.id_expr.clone();
    let descriptors: Vec<&IndexDescriptor> = schema.index_descriptors_for(entity_name);

    for record in records {
        let id = extract_id(record, &id_expr)?;
        let key = keys.record_key(entity_name, &id);
        let old_bytes = tx.get(&key).await?;
        let old_record: Option<R> = match &old_bytes {
            Some(bytes) => Some(R::deserialize(bytes).map_err(|e| MutationError::DeserializationFailed(e.to_string()))?),
            None => None,
        };

        for descriptor in &descriptors {
            if read_state_in_tx(tx, keys, &descriptor.name).await? == IndexState::Disabled {
                continue;
            }
            let maintainer = make_maintainer(descriptor, keys.index(&descriptor.name))?;
            let key_expr = descriptor.key_expr();
            let old_values = match &old_record {
                Some(r) => Some(evaluate(r, &key_expr)?),
                None => None,
            };
            let new_values = evaluate(record, &key_expr)?;
            maintainer.update(old_values.as_deref(), Some(&new_values), &id, tx).await?;
        }

        let bytes = record.serialize().map_err(|e| MutationError::SerializationFailed(e.to_string()))?;
        tx.set(&key, &bytes).await?;
    }
    Ok(())
}

/// Shared delete-path logic, mirroring [`apply_save_in_tx`] with `new =
/// None`. Records absent from the store are silently skipped, matching
/// `save`'s upsert semantics (no "not found" error on delete).
async fn apply_delete_in_tx<R: Persistable>(
    schema: &Schema,
    keys: &Keys,
    ids: &[Value],
    tx: &mut dyn KvTransaction,
) -> Result<(), MutationError> {
    let entity_name = R::entity_name();
    schema.entity_by_name(entity_name).ok_or_else(|| SchemaError::EntityNotFound(entity_name.to_string()))?;
    let descriptors: Vec<&IndexDescriptor> = schema.index_descriptors_for(entity_name);

    for id in ids {
        let key = keys.record_key(entity_name, id);
        let Some(bytes) = tx.get(&key).await? else { continue };
        let old_record = R::deserialize(&bytes).map_err(|e| MutationError::DeserializationFailed(e.to_string()))?;

        for descriptor in &descriptors {
            if read_state_in_tx(tx, keys, &descriptor.name).await? == IndexState::Disabled {
                continue;
            }
            let maintainer = make_maintainer(descriptor, keys.index(&descriptor.name))?;
            let key_expr = descriptor.key_expr();
            let old_values = evaluate(&old_record, &key_expr)?;
            maintainer.update(Some(&old_values), None, id, tx).await?;
        }

        tx.clear(&key).await?;
    }
    Ok(())
}

/// Context a [`BatchOp`] needs to apply itself: the same `Schema`/`Keys`
/// every other write path reads against, borrowed for the duration of one
/// `executeBatch` call.
pub struct BatchCtx<'a> {
    pub keys: &'a Keys,
    pub schema: &'a Schema,
}

/// One heterogeneous unit of work inside `executeBatch` (spec §4.12).
#[async_trait]
pub trait BatchOp: Send {
    async fn apply(self: Box<Self>, ctx: &BatchCtx<'_>, tx: &mut dyn KvTransaction) -> Result<(), MutationError>;
}

/// An insert/upsert of a single typed record, for use in `executeBatch`.
pub struct InsertOp<R: Persistable>(R);

impl<R: Persistable> InsertOp<R> {
    pub fn new(record: R) -> Self {
        Self(record)
    }
}

#[async_trait]
impl<R: Persistable> BatchOp for InsertOp<R> {
    async fn apply(self: Box<Self>, ctx: &BatchCtx<'_>, tx: &mut dyn KvTransaction) -> Result<(), MutationError> {
        apply_save_in_tx(ctx.schema, ctx.keys, std::slice::from_ref(&self.0), tx).await
    }
}

/// A deletion by id of a single typed record, for use in `executeBatch`.
pub struct DeleteOp<R: Persistable> {
    id: Value,
    _marker: PhantomData<R>,
}

impl<R: Persistable> DeleteOp<R> {
    pub fn new(id: Value) -> Self {
        Self { id, _marker: PhantomData }
    }
}

#[async_trait]
impl<R: Persistable> BatchOp for DeleteOp<R> {
    async fn apply(self: Box<Self>, ctx: &BatchCtx<'_>, tx: &mut dyn KvTransaction) -> Result<(), MutationError> {
        apply_delete_in_tx::<R>(ctx.schema, ctx.keys, std::slice::from_ref(&self.id), tx).await
    }
}
