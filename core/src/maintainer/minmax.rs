use async_trait::async_trait;
use keyspace_kv::{KeyRange, KvTransaction, ReadMode};
use keyspace_tuple::{strinc, Subspace, Value};

use super::IndexMaintainer;
use crate::error::MaintainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Min,
    Max,
}

/// `IndexKind::Min`/`Max` (spec §4.6.4): key is `[subspace][...group][value][id]`,
/// value empty — every record's value is tracked, and the extreme is read
/// lazily by taking the first (min) or last (max) entry of the group's
/// range, since `KvTransaction::range` already returns ascending byte
/// order and a packed value sorts consistently with its logical order.
struct MinMaxMaintainer {
    subspace: Subspace,
    edge: Edge,
}

impl MinMaxMaintainer {
    fn key(&self, values: &[Value], id: &Value) -> Vec<u8> {
        let mut tuple = values.to_vec();
        tuple.push(id.clone());
        self.subspace.pack(&tuple)
    }

    /// The current extreme value for `group`, if any record exists in it.
    pub async fn read_edge(&self, group: &[Value], tx: &mut dyn KvTransaction) -> Result<Option<Value>, MaintainError> {
        let begin = self.subspace.pack(group);
        let end = strinc(&begin);
        let mut entries = tx.range(&KeyRange::new(begin, end), ReadMode::Snapshot).await?;
        let chosen = match self.edge {
            Edge::Min => entries.drain(..).next(),
            Edge::Max => entries.pop(),
        };
        let Some((key, _)) = chosen else { return Ok(None) };
        let mut tuple = self.subspace.unpack(&key)?;
        tuple.pop(); // drop the id
        Ok(tuple.pop())
    }
}

#[async_trait]
impl IndexMaintainer for MinMaxMaintainer {
    async fn update(
        &self,
        old: Option<&[Value]>,
        new: Option<&[Value]>,
        id: &Value,
        tx: &mut dyn KvTransaction,
    ) -> Result<(), MaintainError> {
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
        tx.set(&self.key(values, id), &[]).await?;
        Ok(())
    }

    fn compute_index_keys(&self, values: &[Value], id: &Value) -> Vec<Vec<u8>> {
        vec![self.key(values, id)]
    }
}

pub struct MinMaintainer(MinMaxMaintainer);

impl MinMaintainer {
    pub fn new(subspace: Subspace) -> Self {
        Self(MinMaxMaintainer { subspace, edge: Edge::Min })
    }

    pub async fn read_min(&self, group: &[Value], tx: &mut dyn KvTransaction) -> Result<Option<Value>, MaintainError> {
        self.0.read_edge(group, tx).await
    }
}

#[async_trait]
impl IndexMaintainer for MinMaintainer {
    async fn update(
        &self,
        old: Option<&[Value]>,
        new: Option<&[Value]>,
        id: &Value,
        tx: &mut dyn KvTransaction,
    ) -> Result<(), MaintainError> {
        self.0.update(old, new, id, tx).await
    }

    async fn scan(&self, values: &[Value], id: &Value, tx: &mut dyn KvTransaction) -> Result<(), MaintainError> {
        self.0.scan(values, id, tx).await
    }

    fn compute_index_keys(&self, values: &[Value], id: &Value) -> Vec<Vec<u8>> {
        self.0.compute_index_keys(values, id)
    }
}

pub struct MaxMaintainer(MinMaxMaintainer);

impl MaxMaintainer {
    pub fn new(subspace: Subspace) -> Self {
        Self(MinMaxMaintainer { subspace, edge: Edge::Max })
    }

    pub async fn read_max(&self, group: &[Value], tx: &mut dyn KvTransaction) -> Result<Option<Value>, MaintainError> {
        self.0.read_edge(group, tx).await
    }
}

#[async_trait]
impl IndexMaintainer for MaxMaintainer {
    async fn update(
        &self,
        old: Option<&[Value]>,
        new: Option<&[Value]>,
        id: &Value,
        tx: &mut dyn KvTransaction,
    ) -> Result<(), MaintainError> {
        self.0.update(old, new, id, tx).await
    }

    async fn scan(&self, values: &[Value], id: &Value, tx: &mut dyn KvTransaction) -> Result<(), MaintainError> {
        self.0.scan(values, id, tx).await
    }

    fn compute_index_keys(&self, values: &[Value], id: &Value) -> Vec<Vec<u8>> {
        self.0.compute_index_keys(values, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyspace_kv::{KvStore, MemoryKv};

    #[tokio::test]
    async fn min_tracks_the_smallest_value_in_a_group() {
        let kv = MemoryKv::new();
        let m = MinMaintainer::new(Subspace::from_raw_prefix(b"I/min_price_by_sku".to_vec()));
        let group = vec![Value::String("sku-1".into())];

        let mut tx = kv.begin().await.unwrap();
        for (id, price) in [("o1", 30), ("o2", 10), ("o3", 20)] {
            let values = vec![group[0].clone(), Value::Int(price)];
            m.update(None, Some(&values), &Value::String(id.into()), tx.as_mut()).await.unwrap();
        }
        assert_eq!(m.read_min(&group, tx.as_mut()).await.unwrap(), Some(Value::Int(10)));

        let old = vec![group[0].clone(), Value::Int(10)];
        m.update(Some(&old), None, &Value::String("o2".into()), tx.as_mut()).await.unwrap();
        assert_eq!(m.read_min(&group, tx.as_mut()).await.unwrap(), Some(Value::Int(20)));
    }

    #[tokio::test]
    async fn max_tracks_the_largest_value_in_a_group() {
        let kv = MemoryKv::new();
        let m = MaxMaintainer::new(Subspace::from_raw_prefix(b"I/max_price_by_sku".to_vec()));
        let group = vec![Value::String("sku-1".into())];

        let mut tx = kv.begin().await.unwrap();
        for (id, price) in [("o1", 30), ("o2", 10), ("o3", 20)] {
            let values = vec![group[0].clone(), Value::Int(price)];
            m.update(None, Some(&values), &Value::String(id.into()), tx.as_mut()).await.unwrap();
        }
        assert_eq!(m.read_max(&group, tx.as_mut()).await.unwrap(), Some(Value::Int(30)));
    }
}
