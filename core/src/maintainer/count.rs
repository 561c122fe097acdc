use async_trait::async_trait;
use keyspace_kv::KvTransaction;
use keyspace_tuple::{Subspace, Value};

use super::IndexMaintainer;
use crate::error::MaintainError;

/// `IndexKind::Count` (spec §4.6.2): key is `[subspace][...groupValues]`,
/// value is a little-endian `i64` maintained via `atomicAdd`. Aggregation
/// shape — no per-record id is embedded in the key.
pub struct CountMaintainer {
    subspace: Subspace,
}

impl CountMaintainer {
    pub fn new(subspace: Subspace) -> Self {
        Self { subspace }
    }

    fn key(&self, group: &[Value]) -> Vec<u8> {
        self.subspace.pack(group)
    }
}

#[async_trait]
impl IndexMaintainer for CountMaintainer {
    async fn update(
        &self,
        old: Option<&[Value]>,
        new: Option<&[Value]>,
        _id: &Value,
        tx: &mut dyn KvTransaction,
    ) -> Result<(), MaintainError> {
        match (old, new) {
            (None, None) => {}
            (None, Some(group)) => tx.atomic_add(&self.key(group), 1).await?,
            (Some(group), None) => tx.atomic_add(&self.key(group), -1).await?,
            (Some(old_group), Some(new_group)) if old_group == new_group => {}
            (Some(old_group), Some(new_group)) => {
                tx.atomic_add(&self.key(old_group), -1).await?;
                tx.atomic_add(&self.key(new_group), 1).await?;
            }
        }
        Ok(())
    }

    async fn scan(&self, values: &[Value], _id: &Value, tx: &mut dyn KvTransaction) -> Result<(), MaintainError> {
        tx.atomic_add(&self.key(values), 1).await?;
        Ok(())
    }
}
