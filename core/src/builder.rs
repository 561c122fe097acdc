//! Online index builder (spec §4.9): backfills a newly declared index in
//! bounded batches without taking the store offline, transitioning the
//! index `disabled -> writeOnly -> readable` as it completes.

use keyspace_keyexpr::{extract_id, Record, RecordCodec};
use keyspace_kv::{KeyRange, KvStore, KvTransaction, ReadMode};
use keyspace_tuple::Subspace;

use crate::error::MaintainError;
use crate::index_state::{IndexState, IndexStateManager};
use crate::keys::Keys;
use crate::maintainer::make_maintainer;
use crate::range_set::{ByteRange, RangeSet};
use crate::schema::IndexDescriptor;

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Records scanned per transaction.
    pub batch_size: usize,
    /// Cooperative pause between batches, to bound write amplification on
    /// a store under concurrent live traffic.
    pub throttle_delay: std::time::Duration,
    /// Clear any existing entries under the index subspace before
    /// backfilling, for a from-scratch rebuild rather than a resume.
    pub clear_first: bool,
    /// Outer bound on retries of a single batch transaction after it fails
    /// with a transient `KvError::Conflict` (spec §4.10/§7.5: "scrubber/
    /// builder add an outer bounded retry with backoff").
    pub max_retries: usize,
    /// Pause between retries of a conflicted batch.
    pub retry_delay: std::time::Duration,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            throttle_delay: std::time::Duration::from_millis(0),
            clear_first: false,
            max_retries: 3,
            retry_delay: std::time::Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub records_scanned: u64,
    pub completed_successfully: bool,
    pub termination_reason: TerminationReason,
}

/// Drives a single index's backfill for one entity type.
pub struct Builder<'a, K: KvStore> {
    kv: &'a K,
    keys: &'a Keys,
    config: BuilderConfig,
}

impl<'a, K: KvStore> Builder<'a, K> {
    pub fn new(kv: &'a K, keys: &'a Keys, config: BuilderConfig) -> Self {
        Self { kv, keys, config }
    }

    /// Build `descriptor` over every record of `entity_type`. `should_cancel`
    /// is polled between batches for cooperative cancellation (spec §4.9:
    /// "must be cancellable between batches without corrupting progress").
    pub async fn build<R: Record + RecordCodec>(
        &self,
        descriptor: &IndexDescriptor,
        entity_type: &str,
        id_expr: &keyspace_keyexpr::KeyExpr,
        should_cancel: impl Fn() -> bool,
    ) -> Result<BuildSummary, MaintainError> {
        let state_manager = IndexStateManager::new(self.kv, self.keys);
        if state_manager.state(&descriptor.name).await? == IndexState::Readable {
            // Already backfilled; nothing to do (documented in DESIGN.md).
            return Ok(BuildSummary { records_scanned: 0, completed_successfully: true, termination_reason: TerminationReason::Completed });
        }
        state_manager.make_write_only(&descriptor.name).await?;
        tracing::debug!(index = %descriptor.name, "index build starting, index now write-only");

        let index_subspace = self.keys.index(&descriptor.name);
        if self.config.clear_first {
            let (begin, end) = index_subspace.range();
            let mut tx = self.kv.begin().await?;
            tx.clear_range(&KeyRange::new(begin, end)).await?;
            tx.commit().await?;
        }

        let maintainer = make_maintainer(descriptor, index_subspace)?;
        let key_expr = descriptor.key_expr();
        let records_subspace = self.keys.records(entity_type);

        let progress_key = self.keys.build_progress_key(&descriptor.name);
        let mut progress = self.load_progress(&progress_key, &records_subspace).await?;

        let mut records_scanned: u64 = 0;
        while !progress.is_empty() {
            if should_cancel() {
                self.save_progress(&progress_key, &progress).await?;
                tracing::debug!(index = %descriptor.name, records_scanned, "index build cancelled, progress saved");
                return Ok(BuildSummary { records_scanned, completed_successfully: false, termination_reason: TerminationReason::Cancelled });
            }

            let batch = progress.next_batch().expect("loop guarded by is_empty");
            let (batch_scanned, reached_end, last_key) = crate::retry::with_retry(self.config.max_retries, self.config.retry_delay, || async {
                let mut tx = self.kv.begin().await?;
                let entries = tx.range(&KeyRange::new(batch.begin.clone(), batch.end.clone()), ReadMode::Snapshot).await?;
                let limited: Vec<_> = entries.into_iter().take(self.config.batch_size).collect();
                let reached_end = limited.len() < self.config.batch_size;

                let mut batch_scanned: u64 = 0;
                let mut last_key: Option<Vec<u8>> = None;
                for (key, bytes) in &limited {
                    let record = R::deserialize(bytes).map_err(|e| MaintainError::Kv(keyspace_kv::KvError::Backend(e.to_string())))?;
                    let id = extract_id(&record, id_expr)?;
                    let values = keyspace_keyexpr::evaluate(&record, &key_expr)?;
                    maintainer.scan(&values, &id, tx.as_mut()).await?;
                    batch_scanned += 1;
                    last_key = Some(key.clone());
                }
                tx.commit().await?;
                Ok((batch_scanned, reached_end, last_key))
            })
            .await?;
            records_scanned += batch_scanned;

            let scanned_range = match (reached_end, last_key) {
                (true, _) => ByteRange::new(batch.begin.clone(), batch.end.clone()),
                (false, Some(last)) => {
                    let mut scanned_end = last.clone();
                    scanned_end.push(0);
                    ByteRange::new(batch.begin.clone(), scanned_end)
                }
                (false, None) => ByteRange::new(batch.begin.clone(), batch.end.clone()),
            };
            progress.mark_completed(&scanned_range);
            self.save_progress(&progress_key, &progress).await?;

            if !self.config.throttle_delay.is_zero() {
                tokio::time::sleep(self.config.throttle_delay).await;
            }
        }

        state_manager.make_readable(&descriptor.name).await?;
        let mut tx = self.kv.begin().await?;
        tx.clear(&progress_key).await?;
        tx.commit().await?;

        tracing::info!(index = %descriptor.name, records_scanned, "index build complete, index now readable");
        Ok(BuildSummary { records_scanned, completed_successfully: true, termination_reason: TerminationReason::Completed })
    }

    async fn load_progress(&self, progress_key: &[u8], records_subspace: &Subspace) -> Result<RangeSet, MaintainError> {
        let mut tx = self.kv.begin().await?;
        if let Some(bytes) = tx.get(progress_key).await? {
            return RangeSet::deserialize(&bytes)
                .map_err(|e| MaintainError::Kv(keyspace_kv::KvError::Backend(format!("corrupt build progress: {e}"))));
        }
        let (begin, end) = records_subspace.range();
        Ok(RangeSet::from(begin, end))
    }

    async fn save_progress(&self, progress_key: &[u8], progress: &RangeSet) -> Result<(), MaintainError> {
        let bytes = progress.serialize().map_err(|e| MaintainError::Kv(keyspace_kv::KvError::Backend(e.to_string())))?;
        let mut tx = self.kv.begin().await?;
        tx.set(progress_key, &bytes).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_kind::IndexKind;
    use crate::schema::IndexDescriptor;
    use keyspace_keyexpr::{DataAccessError, KeyExpr};
    use keyspace_kv::MemoryKv;
    use keyspace_tuple::Value;

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        id: String,
        status: String,
    }

    impl Record for User {
        fn field(&self, path: &[&str]) -> Result<Value, DataAccessError> {
            match path {
                ["id"] => Ok(Value::String(self.id.clone())),
                ["status"] => Ok(Value::String(self.status.clone())),
                _ => Err(DataAccessError::FieldNotFound(path.join("."))),
            }
        }
    }

    impl RecordCodec for User {
        type Error = std::convert::Infallible;
        fn serialize(&self) -> Result<Vec<u8>, Self::Error> {
            Ok(format!("{}|{}", self.id, self.status).into_bytes())
        }
        fn deserialize(bytes: &[u8]) -> Result<Self, Self::Error> {
            let s = String::from_utf8_lossy(bytes);
            let mut parts = s.splitn(2, '|');
            Ok(User { id: parts.next().unwrap().to_string(), status: parts.next().unwrap().to_string() })
        }
    }

    #[tokio::test]
    async fn build_backfills_every_existing_record_and_becomes_readable() {
        let kv = MemoryKv::new();
        let keys = Keys::new(Subspace::from_raw_prefix(b"S".to_vec()));
        let records = keys.records("User");

        let mut tx = kv.begin().await.unwrap();
        for (id, status) in [("u1", "active"), ("u2", "archived"), ("u3", "active")] {
            let user = User { id: id.to_string(), status: status.to_string() };
            tx.set(&keys.record_key("User", &Value::String(id.into())), &user.serialize().unwrap()).await.unwrap();
        }
        tx.commit().await.unwrap();

        let descriptor = IndexDescriptor::new("User_by_status", vec!["status".into()], IndexKind::Scalar);
        let builder = Builder::new(&kv, &keys, BuilderConfig::default());
        let summary = builder.build::<User>(&descriptor, "User", &KeyExpr::from_dotted("id"), || false).await.unwrap();

        assert_eq!(summary.records_scanned, 3);
        assert!(summary.completed_successfully);

        let state_manager = IndexStateManager::new(&kv, &keys);
        assert_eq!(state_manager.state("User_by_status").await.unwrap(), IndexState::Readable);

        let index_subspace = keys.index("User_by_status");
        let (begin, end) = index_subspace.range();
        let mut tx = kv.begin().await.unwrap();
        let entries = tx.range(&KeyRange::new(begin, end), ReadMode::Snapshot).await.unwrap();
        assert_eq!(entries.len(), 3);
        let _ = records;
    }

    #[tokio::test]
    async fn cancellation_preserves_progress_for_a_later_resume() {
        let kv = MemoryKv::new();
        let keys = Keys::new(Subspace::from_raw_prefix(b"S".to_vec()));

        let mut tx = kv.begin().await.unwrap();
        for id in ["u1", "u2", "u3"] {
            let user = User { id: id.to_string(), status: "active".to_string() };
            tx.set(&keys.record_key("User", &Value::String(id.into())), &user.serialize().unwrap()).await.unwrap();
        }
        tx.commit().await.unwrap();

        let descriptor = IndexDescriptor::new("User_by_status", vec!["status".into()], IndexKind::Scalar);
        let config = BuilderConfig { batch_size: 1, ..BuilderConfig::default() };
        let builder = Builder::new(&kv, &keys, config);
        let summary = builder.build::<User>(&descriptor, "User", &KeyExpr::from_dotted("id"), || true).await.unwrap();
        assert!(!summary.completed_successfully);
        assert_eq!(summary.termination_reason, TerminationReason::Cancelled);

        let state_manager = IndexStateManager::new(&kv, &keys);
        assert_eq!(state_manager.state("User_by_status").await.unwrap(), IndexState::WriteOnly);
    }
}
