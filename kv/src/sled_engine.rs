use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use sled::Db;
use tokio::task;
use tracing::warn;

use crate::limits::{validate_key, validate_value};
use crate::{KeyRange, KvError, KvResult, KvStore, KvTransaction, ReadMode};

/// A `sled`-backed instance of the KV-store contract (spec §6).
///
/// Every key in spec §6's layout is already subspace-prefixed, so a single
/// `sled::Tree` is sufficient; there is no need for per-entity column
/// families.
pub struct SledKv {
    tree: sled::Tree,
}

impl SledKv {
    pub fn with_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let db: Db = sled::open(path)?;
        Ok(Self { tree: db.open_tree("keyspace")? })
    }

    pub fn new_test() -> anyhow::Result<Self> {
        let db: Db = sled::Config::new().temporary(true).flush_every_ms(None).open()?;
        Ok(Self { tree: db.open_tree("keyspace")? })
    }
}

#[async_trait]
impl KvStore for SledKv {
    async fn begin(&self) -> KvResult<Box<dyn KvTransaction>> {
        Ok(Box::new(SledTransaction { tree: self.tree.clone(), writes: BTreeMap::new() }))
    }
}

/// Buffers writes locally (read-your-own-writes) and applies them as one
/// atomic batch via `sled::Tree::transaction` at commit time. This gives
/// atomic multi-key application but, unlike a true FoundationDB-style
/// store, does not validate that concurrently-read keys are unchanged at
/// commit time; see DESIGN.md for the documented gap.
struct SledTransaction {
    tree: sled::Tree,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl SledTransaction {
    fn overlay_get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        if let Some(buffered) = self.writes.get(key) {
            return Ok(buffered.clone());
        }
        self.tree.get(key).map(|opt| opt.map(|v| v.to_vec())).map_err(|e| KvError::Backend(e.to_string()))
    }
}

#[async_trait]
impl KvTransaction for SledTransaction {
    async fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        validate_key(key)?;
        self.overlay_get(key)
    }

    async fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        validate_key(key)?;
        validate_value(value)?;
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    async fn clear(&mut self, key: &[u8]) -> KvResult<()> {
        validate_key(key)?;
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    async fn range(&mut self, range: &KeyRange, _mode: ReadMode) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let lower = Bound::Included(range.begin.clone());
        let upper = Bound::Excluded(range.end.clone());
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for entry in self.tree.range(range.begin.clone()..range.end.clone()) {
            let (k, v) = entry.map_err(|e| KvError::Backend(e.to_string()))?;
            merged.insert(k.to_vec(), v.to_vec());
        }
        for (k, v) in self.writes.range::<Vec<u8>, _>((lower, upper)) {
            match v {
                Some(value) => { merged.insert(k.clone(), value.clone()); }
                None => { merged.remove(k); }
            }
        }
        Ok(merged.into_iter().collect())
    }

    async fn clear_range(&mut self, range: &KeyRange) -> KvResult<()> {
        let keys: Vec<Vec<u8>> = self
            .tree
            .range(range.begin.clone()..range.end.clone())
            .keys()
            .filter_map(|r| r.ok().map(|k| k.to_vec()))
            .collect();
        for key in keys {
            self.writes.insert(key, None);
        }
        let lower = Bound::Included(range.begin.clone());
        let upper = Bound::Excluded(range.end.clone());
        let buffered_inserts: Vec<Vec<u8>> = self
            .writes
            .range::<Vec<u8>, _>((lower, upper))
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| k.clone())
            .collect();
        for key in buffered_inserts {
            self.writes.insert(key, None);
        }
        Ok(())
    }

    async fn atomic_add(&mut self, key: &[u8], delta: i64) -> KvResult<()> {
        validate_key(key)?;
        let current = self.overlay_get(key)?.map(|bytes| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[..8]);
            i64::from_le_bytes(buf)
        }).unwrap_or(0);
        let next = current.wrapping_add(delta);
        self.writes.insert(key.to_vec(), Some(next.to_le_bytes().to_vec()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> KvResult<()> {
        let tree = self.tree;
        let writes = self.writes;
        if writes.is_empty() {
            return Ok(());
        }
        task::spawn_blocking(move || {
            tree.transaction(|tx_tree| {
                for (key, value) in &writes {
                    match value {
                        Some(bytes) => {
                            tx_tree.insert(key.as_slice(), bytes.as_slice())?;
                        }
                        None => {
                            tx_tree.remove(key.as_slice())?;
                        }
                    }
                }
                Ok::<_, sled::transaction::ConflictableTransactionError<()>>(())
            })
        })
        .await
        .map_err(|e| KvError::Backend(e.to_string()))?
        .map_err(|e| {
            warn!("sled transaction aborted: {e}");
            KvError::Conflict
        })?;
        Ok(())
    }
}
