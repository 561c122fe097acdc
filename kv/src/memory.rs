use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::limits::{validate_key, validate_value};
use crate::{KeyRange, KvResult, KvStore, KvTransaction, ReadMode};

/// A reference KV engine for the crate's own test suite: an in-process,
/// strictly-serialisable store backed by a single `BTreeMap`. Unlike
/// `SledKv`, this engine is not meant to demonstrate persistence, only the
/// `KvStore`/`KvTransaction` contract itself — serialisability is achieved
/// by holding the map's mutex for the lifetime of the transaction rather
/// than by genuine optimistic conflict detection.
#[derive(Clone)]
pub struct MemoryKv {
    map: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl Default for MemoryKv {
    fn default() -> Self { Self::new() }
}

impl MemoryKv {
    pub fn new() -> Self { Self { map: Arc::new(Mutex::new(BTreeMap::new())) } }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn begin(&self) -> KvResult<Box<dyn KvTransaction>> {
        let guard = self.map.clone().lock_owned().await;
        Ok(Box::new(MemoryTransaction { guard }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<BTreeMap<Vec<u8>, Vec<u8>>>,
}

#[async_trait]
impl KvTransaction for MemoryTransaction {
    async fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.guard.get(key).cloned())
    }

    async fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        validate_key(key)?;
        validate_value(value)?;
        self.guard.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn clear(&mut self, key: &[u8]) -> KvResult<()> {
        validate_key(key)?;
        self.guard.remove(key);
        Ok(())
    }

    async fn range(&mut self, range: &KeyRange, _mode: ReadMode) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let lower = Bound::Included(range.begin.clone());
        let upper = Bound::Excluded(range.end.clone());
        Ok(self.guard.range((lower, upper)).map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    async fn clear_range(&mut self, range: &KeyRange) -> KvResult<()> {
        let lower = Bound::Included(range.begin.clone());
        let upper = Bound::Excluded(range.end.clone());
        let keys: Vec<Vec<u8>> = self.guard.range((lower, upper)).map(|(k, _)| k.clone()).collect();
        for key in keys {
            self.guard.remove(&key);
        }
        Ok(())
    }

    async fn atomic_add(&mut self, key: &[u8], delta: i64) -> KvResult<()> {
        validate_key(key)?;
        let current = self.guard.get(key).map(|bytes| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[..8]);
            i64::from_le_bytes(buf)
        }).unwrap_or(0);
        let next = current.wrapping_add(delta);
        self.guard.insert(key.to_vec(), next.to_le_bytes().to_vec());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> KvResult<()> { Ok(()) }
}
