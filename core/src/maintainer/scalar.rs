use async_trait::async_trait;
use keyspace_kv::{KeyRange, KvTransaction, ReadMode};
use keyspace_tuple::{strinc, Subspace, Value};

use super::IndexMaintainer;
use crate::error::MaintainError;

/// Backs both `IndexKind::Scalar` and `IndexKind::Version` (spec §4.6.1):
/// key is `[subspace][...values][id]`, value is empty. Optionally enforces
/// a uniqueness constraint on the value prefix.
pub struct ScalarMaintainer {
    index_name: String,
    subspace: Subspace,
    unique: bool,
}

impl ScalarMaintainer {
    pub fn new(index_name: String, subspace: Subspace, unique: bool) -> Self {
        Self { index_name, subspace, unique }
    }

    fn key(&self, values: &[Value], id: &Value) -> Vec<u8> {
        let mut tuple = values.to_vec();
        tuple.push(id.clone());
        self.subspace.pack(&tuple)
    }

    /// Fails if some *other* id already owns an entry under this value
    /// prefix (spec §4.6.5).
    async fn check_unique(&self, values: &[Value], id: &Value, tx: &mut dyn KvTransaction) -> Result<(), MaintainError> {
        if !self.unique {
            return Ok(());
        }
        let begin = self.subspace.pack(values);
        let end = strinc(&begin);
        let entries = tx.range(&KeyRange::new(begin, end), ReadMode::Serializable).await?;
        for (key, _) in entries {
            let tuple = self.subspace.unpack(&key)?;
            if let Some(existing_id) = tuple.last() {
                if existing_id != id {
                    return Err(MaintainError::UniqueViolation { index_name: self.index_name.clone(), values: values.to_vec() });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl IndexMaintainer for ScalarMaintainer {
    async fn update(
        &self,
        old: Option<&[Value]>,
        new: Option<&[Value]>,
        id: &Value,
        tx: &mut dyn KvTransaction,
    ) -> Result<(), MaintainError> {
        if let Some(new_values) = new {
            self.check_unique(new_values, id, tx).await?;
        }
        if let Some(old_values) = old {
            if new != Some(old_values) {
                tx.clear(&self.key(old_values, id)).await?;
            }
        }
        if let Some(new_values) = new {
            if old != Some(new_values) {
                tx.set(&self.key(new_values, id), &[]).await?;
            }
        }
        Ok(())
    }

    async fn scan(&self, values: &[Value], id: &Value, tx: &mut dyn KvTransaction) -> Result<(), MaintainError> {
        self.check_unique(values, id, tx).await?;
        tx.set(&self.key(values, id), &[]).await?;
        Ok(())
    }

    fn compute_index_keys(&self, values: &[Value], id: &Value) -> Vec<Vec<u8>> {
        vec![self.key(values, id)]
    }
}
