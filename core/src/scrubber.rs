//! Online index scrubber (spec §4.10): a two-phase, resumable consistency
//! check against a live store. Phase 1 looks for index entries that no
//! longer correspond to a live, matching record ("dangling"); phase 2
//! looks for records that have no corresponding index entry ("missing").

use keyspace_keyexpr::{extract_id, Record, RecordCodec};
use keyspace_kv::{KeyRange, KvStore, KvTransaction, ReadMode};
use keyspace_tuple::Value;

use crate::error::MaintainError;
use crate::index_kind::SubspaceStructure;
use crate::keys::{Keys, ScrubPhase};
use crate::maintainer::make_maintainer;
use crate::range_set::{ByteRange, RangeSet};
use crate::schema::IndexDescriptor;

#[derive(Debug, Clone)]
pub struct ScrubberConfig {
    pub batch_size: usize,
    pub throttle_delay: std::time::Duration,
    /// When false, the scrubber only reports findings; it never mutates
    /// the index.
    pub allow_repair: bool,
    /// Outer bound on retries of a single batch transaction after it fails
    /// with a transient `KvError::Conflict` (spec §4.10/§7.5: "scrubber/
    /// builder add an outer bounded retry with backoff").
    pub max_retries: usize,
    /// Pause between retries of a conflicted batch.
    pub retry_delay: std::time::Duration,
    /// Upper bound on index/record entries read per batch transaction,
    /// independent of (and no larger than) `batch_size` (spec §5:
    /// "`entriesScanLimit`... tune the batch size to stay under [the KV
    /// store's 5s transaction budget]").
    pub entries_scan_limit: usize,
    /// Advisory cap on the total value bytes a single batch transaction
    /// should touch, for callers tuning `batch_size`/`entries_scan_limit`
    /// to the same budget (spec §5: `maxTransactionBytes`).
    pub max_transaction_bytes: usize,
    /// Advisory wall-clock budget for a single batch transaction, for
    /// callers tuning batch sizing against the KV store's own transaction
    /// timeout (spec §5: `transactionTimeoutMillis`).
    pub transaction_timeout: std::time::Duration,
}

impl Default for ScrubberConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            throttle_delay: std::time::Duration::from_millis(0),
            allow_repair: true,
            max_retries: 3,
            retry_delay: std::time::Duration::from_millis(50),
            entries_scan_limit: 500,
            max_transaction_bytes: 9_000_000,
            transaction_timeout: std::time::Duration::from_secs(5),
        }
    }
}

impl ScrubberConfig {
    /// The effective per-batch entry cap: the tighter of `batch_size` and
    /// `entries_scan_limit`.
    fn effective_batch_limit(&self) -> usize {
        self.batch_size.min(self.entries_scan_limit)
    }
}

#[derive(Debug, Clone)]
pub struct ScrubSummary {
    pub index_name: String,
    pub entries_scanned: u64,
    pub dangling_detected: u64,
    pub dangling_repaired: u64,
    pub missing_detected: u64,
    pub missing_repaired: u64,
    pub completed_successfully: bool,
}

pub struct Scrubber<'a, K: KvStore> {
    kv: &'a K,
    keys: &'a Keys,
    config: ScrubberConfig,
}

impl<'a, K: KvStore> Scrubber<'a, K> {
    pub fn new(kv: &'a K, keys: &'a Keys, config: ScrubberConfig) -> Self {
        Self { kv, keys, config }
    }

    /// Runs both phases to completion over `entity_type`'s records.
    ///
    /// Aggregation-shaped kinds (count/sum) carry no per-record id in
    /// their index key, so phase 1 (dangling detection) is skipped for
    /// them entirely, and phase 2 only checks group-bucket *presence*
    /// rather than correctness — repair for these kinds is inherently
    /// incremental, never an absolute recount (spec §4.10).
    pub async fn scrub<R: Record + RecordCodec>(
        &self,
        descriptor: &IndexDescriptor,
        entity_type: &str,
        id_expr: &keyspace_keyexpr::KeyExpr,
        should_cancel: impl Fn() -> bool,
    ) -> Result<ScrubSummary, MaintainError> {
        let mut summary = ScrubSummary {
            index_name: descriptor.name.clone(),
            entries_scanned: 0,
            dangling_detected: 0,
            dangling_repaired: 0,
            missing_detected: 0,
            missing_repaired: 0,
            completed_successfully: false,
        };

        if descriptor.kind.subspace_structure() != SubspaceStructure::Aggregation {
            if !self.run_phase1(descriptor, entity_type, &should_cancel, &mut summary).await? {
                return Ok(summary);
            }
        }

        if !self.run_phase2::<R>(descriptor, entity_type, id_expr, &should_cancel, &mut summary).await? {
            return Ok(summary);
        }

        let mut tx = self.kv.begin().await?;
        tx.clear(&self.keys.scrub_progress_key(&descriptor.name, ScrubPhase::Phase1)).await?;
        tx.clear(&self.keys.scrub_progress_key(&descriptor.name, ScrubPhase::Phase2)).await?;
        tx.commit().await?;

        summary.completed_successfully = true;
        tracing::info!(
            index = %descriptor.name,
            dangling_detected = summary.dangling_detected,
            missing_detected = summary.missing_detected,
            "scrub complete"
        );
        Ok(summary)
    }

    /// Walks the index subspace itself; an entry is dangling if its
    /// embedded id no longer has a live record, or the record's current
    /// values no longer match what the entry claims.
    async fn run_phase1<R: Record + RecordCodec>(
        &self,
        descriptor: &IndexDescriptor,
        entity_type: &str,
        should_cancel: &impl Fn() -> bool,
        summary: &mut ScrubSummary,
    ) -> Result<bool, MaintainError> {
        let index_subspace = self.keys.index(&descriptor.name);
        let key_expr = descriptor.key_expr();
        let progress_key = self.keys.scrub_progress_key(&descriptor.name, ScrubPhase::Phase1);

        let mut progress = self.load_progress(&progress_key, &index_subspace.range()).await?;
        while !progress.is_empty() {
            if should_cancel() {
                self.save_progress(&progress_key, &progress).await?;
                return Ok(false);
            }
            let batch = progress.next_batch().expect("loop guarded by is_empty");
            let limit = self.config.effective_batch_limit();
            let outcome = crate::retry::with_retry(self.config.max_retries, self.config.retry_delay, || async {
                let mut tx = self.kv.begin().await?;
                let entries = tx.range(&KeyRange::new(batch.begin.clone(), batch.end.clone()), ReadMode::Snapshot).await?;
                let limited: Vec<_> = entries.into_iter().take(limit).collect();
                let reached_end = limited.len() < limit;

                let mut entries_scanned = 0u64;
                let mut dangling_detected = 0u64;
                let mut dangling_repaired = 0u64;
                let mut last_key: Option<Vec<u8>> = None;
                for (index_key, _) in &limited {
                    entries_scanned += 1;
                    let mut tuple = index_subspace.unpack(index_key)?;
                    let id = tuple.pop();
                    if let Some(id) = id {
                        let record_key = self.keys.record_key(entity_type, &id);
                        let record_bytes = tx.get(&record_key).await?;
                        let dangling = match &record_bytes {
                            None => true,
                            Some(bytes) => {
                                let record = R::deserialize(bytes)
                                    .map_err(|e| MaintainError::Kv(keyspace_kv::KvError::Backend(e.to_string())))?;
                                let current_values = keyspace_keyexpr::evaluate(&record, &key_expr)?;
                                current_values != tuple
                            }
                        };
                        if dangling {
                            dangling_detected += 1;
                            if self.config.allow_repair {
                                tx.clear(index_key).await?;
                                dangling_repaired += 1;
                            }
                        }
                    }
                    last_key = Some(index_key.clone());
                }
                tx.commit().await?;
                Ok((entries_scanned, dangling_detected, dangling_repaired, reached_end, last_key))
            })
            .await?;
            let (entries_scanned, dangling_detected, dangling_repaired, reached_end, last_key) = outcome;
            summary.entries_scanned += entries_scanned;
            summary.dangling_detected += dangling_detected;
            summary.dangling_repaired += dangling_repaired;
            if dangling_repaired > 0 {
                tracing::debug!(index = %descriptor.name, dangling_repaired, "repaired dangling entries in batch");
            }

            progress.mark_completed(&scanned_extent(&batch, reached_end, last_key));
            self.save_progress(&progress_key, &progress).await?;

            if !self.config.throttle_delay.is_zero() {
                tokio::time::sleep(self.config.throttle_delay).await;
            }
        }
        Ok(true)
    }

    /// Walks the record subspace; a record is missing its index entry if
    /// the key(s) `IndexMaintainer::compute_index_keys` derives for it are
    /// absent from the store.
    async fn run_phase2<R: Record + RecordCodec>(
        &self,
        descriptor: &IndexDescriptor,
        entity_type: &str,
        id_expr: &keyspace_keyexpr::KeyExpr,
        should_cancel: &impl Fn() -> bool,
        summary: &mut ScrubSummary,
    ) -> Result<bool, MaintainError> {
        let index_subspace = self.keys.index(&descriptor.name);
        let maintainer = make_maintainer(descriptor, index_subspace)?;
        let key_expr = descriptor.key_expr();
        let records_subspace = self.keys.records(entity_type);
        let progress_key = self.keys.scrub_progress_key(&descriptor.name, ScrubPhase::Phase2);

        let mut progress = self.load_progress(&progress_key, &records_subspace.range()).await?;
        while !progress.is_empty() {
            if should_cancel() {
                self.save_progress(&progress_key, &progress).await?;
                return Ok(false);
            }
            let batch = progress.next_batch().expect("loop guarded by is_empty");
            let limit = self.config.effective_batch_limit();
            let outcome = crate::retry::with_retry(self.config.max_retries, self.config.retry_delay, || async {
                let mut tx = self.kv.begin().await?;
                let entries = tx.range(&KeyRange::new(batch.begin.clone(), batch.end.clone()), ReadMode::Snapshot).await?;
                let limited: Vec<_> = entries.into_iter().take(limit).collect();
                let reached_end = limited.len() < limit;

                let mut missing_detected = 0u64;
                let mut missing_repaired = 0u64;
                let mut last_key: Option<Vec<u8>> = None;
                for (key, bytes) in &limited {
                    let record = R::deserialize(bytes).map_err(|e| MaintainError::Kv(keyspace_kv::KvError::Backend(e.to_string())))?;
                    let id = extract_id(&record, id_expr)?;
                    let values = keyspace_keyexpr::evaluate(&record, &key_expr)?;

                    let expected_keys = maintainer.compute_index_keys(&values, &id);
                    if expected_keys.is_empty() {
                        // Aggregation kind: detect only whether the group bucket
                        // exists at all; never attempt a full recount here.
                        // `Sum`'s trailing key path is the summed field, not part
                        // of the group; `Count` has no trailing value column.
                        let group: &[Value] = match &descriptor.kind {
                            crate::index_kind::IndexKind::Sum => &values[..values.len() - 1],
                            _ => &values[..],
                        };
                        let bucket_key = self.keys.index(&descriptor.name).pack(group);
                        if tx.get(&bucket_key).await?.is_none() {
                            missing_detected += 1;
                            // Aggregation kinds cannot be repaired incrementally
                            // here: `scan` would add 1/value to an absent bucket
                            // rather than recompute its true total, corrupting
                            // the count/sum. Repair for these kinds requires a
                            // full rebuild (§4.9 with `clear_first`); `allow_repair`
                            // is detection-only for them.
                        }
                    } else {
                        for expected_key in expected_keys {
                            if tx.get(&expected_key).await?.is_none() {
                                missing_detected += 1;
                                if self.config.allow_repair {
                                    maintainer.scan(&values, &id, tx.as_mut()).await?;
                                    missing_repaired += 1;
                                }
                                break;
                            }
                        }
                    }
                    last_key = Some(key.clone());
                }
                tx.commit().await?;
                Ok((missing_detected, missing_repaired, reached_end, last_key))
            })
            .await?;
            let (missing_detected, missing_repaired, reached_end, last_key) = outcome;
            summary.missing_detected += missing_detected;
            summary.missing_repaired += missing_repaired;

            progress.mark_completed(&scanned_extent(&batch, reached_end, last_key));
            self.save_progress(&progress_key, &progress).await?;

            if !self.config.throttle_delay.is_zero() {
                tokio::time::sleep(self.config.throttle_delay).await;
            }
        }
        Ok(true)
    }

    async fn load_progress(&self, progress_key: &[u8], fresh_range: &(Vec<u8>, Vec<u8>)) -> Result<RangeSet, MaintainError> {
        let mut tx = self.kv.begin().await?;
        if let Some(bytes) = tx.get(progress_key).await? {
            return RangeSet::deserialize(&bytes)
                .map_err(|e| MaintainError::Kv(keyspace_kv::KvError::Backend(format!("corrupt scrub progress: {e}"))));
        }
        Ok(RangeSet::from(fresh_range.0.clone(), fresh_range.1.clone()))
    }

    async fn save_progress(&self, progress_key: &[u8], progress: &RangeSet) -> Result<(), MaintainError> {
        let bytes = progress.serialize().map_err(|e| MaintainError::Kv(keyspace_kv::KvError::Backend(e.to_string())))?;
        let mut tx = self.kv.begin().await?;
        tx.set(progress_key, &bytes).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn scanned_extent(batch: &ByteRange, reached_end: bool, last_key: Option<Vec<u8>>) -> ByteRange {
    if reached_end {
        return batch.clone();
    }
    match last_key {
        Some(last) => {
            let mut end = last;
            end.push(0);
            ByteRange::new(batch.begin.clone(), end)
        }
        None => batch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_kind::IndexKind;
    use keyspace_keyexpr::{DataAccessError, KeyExpr};
    use keyspace_kv::MemoryKv;
    use keyspace_tuple::Subspace;

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
    async fn phase2_repairs_a_record_missing_its_index_entry() {
        let kv = MemoryKv::new();
        let keys = Keys::new(Subspace::from_raw_prefix(b"S".to_vec()));
        let user = User { id: "u1".into(), status: "active".into() };

        let mut tx = kv.begin().await.unwrap();
        tx.set(&keys.record_key("User", &Value::String("u1".into())), &user.serialize().unwrap()).await.unwrap();
        tx.commit().await.unwrap();

        let descriptor = IndexDescriptor::new("User_by_status", vec!["status".into()], IndexKind::Scalar);
        let scrubber = Scrubber::new(&kv, &keys, ScrubberConfig::default());
        let summary = scrubber.scrub::<User>(&descriptor, "User", &KeyExpr::from_dotted("id"), || false).await.unwrap();

        assert_eq!(summary.missing_detected, 1);
        assert_eq!(summary.missing_repaired, 1);
        assert!(summary.completed_successfully);

        let index_subspace = keys.index("User_by_status");
        let key = index_subspace.pack(&[Value::String("active".into()), Value::String("u1".into())]);
        let mut tx = kv.begin().await.unwrap();
        assert!(tx.get(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn phase1_clears_a_dangling_entry_for_a_deleted_record() {
        let kv = MemoryKv::new();
        let keys = Keys::new(Subspace::from_raw_prefix(b"S".to_vec()));
        let index_subspace = keys.index("User_by_status");
        let dangling_key = index_subspace.pack(&[Value::String("active".into()), Value::String("ghost".into())]);

        let mut tx = kv.begin().await.unwrap();
        tx.set(&dangling_key, &[]).await.unwrap();
        tx.commit().await.unwrap();

        let descriptor = IndexDescriptor::new("User_by_status", vec!["status".into()], IndexKind::Scalar);
        let scrubber = Scrubber::new(&kv, &keys, ScrubberConfig::default());
        let summary = scrubber.scrub::<User>(&descriptor, "User", &KeyExpr::from_dotted("id"), || false).await.unwrap();

        assert_eq!(summary.dangling_detected, 1);
        assert_eq!(summary.dangling_repaired, 1);

        let mut tx = kv.begin().await.unwrap();
        assert!(tx.get(&dangling_key).await.unwrap().is_none());
    }
}
