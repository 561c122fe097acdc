//! Index lifecycle state (spec §4.7): `disabled -> writeOnly -> readable`,
//! persisted per index so the query planner never reads an index the
//! builder hasn't finished backfilling.

use keyspace_kv::{KvStore, KvTransaction};

use crate::error::SchemaError;
use crate::keys::Keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Not yet maintained: writes skip it entirely.
    Disabled,
    /// Writes keep it in sync, but the planner must not read from it yet
    /// (it may still be missing entries for records written before the
    /// index was created).
    WriteOnly,
    /// Maintained and safe for the planner to use.
    Readable,
}

impl IndexState {
    fn to_byte(self) -> u8 {
        match self {
            IndexState::Disabled => 0,
            IndexState::WriteOnly => 1,
            IndexState::Readable => 2,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(IndexState::Disabled),
            1 => Some(IndexState::WriteOnly),
            2 => Some(IndexState::Readable),
            _ => None,
        }
    }
}

/// Read an index's state through an already-open transaction, rather than
/// opening a fresh one the way [`IndexStateManager::state`] does. The write
/// path (spec §4.12) must consult index state from inside the same
/// transaction that then writes the maintainers' mutations — opening a
/// second transaction there would deadlock `MemoryKv`, whose transaction
/// holds the store's single mutex for its whole lifetime.
pub async fn read_state_in_tx(tx: &mut dyn KvTransaction, keys: &Keys, index_name: &str) -> Result<IndexState, SchemaError> {
    let raw = tx.get(&keys.index_state_key(index_name)).await?;
    Ok(match raw {
        Some(bytes) => bytes.first().copied().and_then(IndexState::from_byte).unwrap_or(IndexState::Disabled),
        None => IndexState::Disabled,
    })
}

/// Reads/writes `IndexState` through a single committed transaction per
/// call, so a caller never observes a half-applied transition.
pub struct IndexStateManager<'a, K: KvStore> {
    kv: &'a K,
    keys: &'a Keys,
}

impl<'a, K: KvStore> IndexStateManager<'a, K> {
    pub fn new(kv: &'a K, keys: &'a Keys) -> Self {
        Self { kv, keys }
    }

    /// Indexes with no persisted state default to `Disabled` (spec §4.7:
    /// newly declared indexes start disabled until a build runs).
    pub async fn state(&self, index_name: &str) -> Result<IndexState, SchemaError> {
        let mut tx = self.kv.begin().await?;
        read_state_in_tx(tx.as_mut(), self.keys, index_name).await
    }

    pub async fn set_state(&self, index_name: &str, state: IndexState) -> Result<(), SchemaError> {
        let mut tx = self.kv.begin().await?;
        tx.set(&self.keys.index_state_key(index_name), &[state.to_byte()]).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn make_write_only(&self, index_name: &str) -> Result<(), SchemaError> {
        self.set_state(index_name, IndexState::WriteOnly).await
    }

    pub async fn make_readable(&self, index_name: &str) -> Result<(), SchemaError> {
        self.set_state(index_name, IndexState::Readable).await
    }

    pub async fn disable(&self, index_name: &str) -> Result<(), SchemaError> {
        self.set_state(index_name, IndexState::Disabled).await
    }
}
