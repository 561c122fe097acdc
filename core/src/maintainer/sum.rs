use async_trait::async_trait;
use keyspace_kv::KvTransaction;
use keyspace_tuple::{Subspace, Value};

use super::IndexMaintainer;
use crate::error::MaintainError;

/// `IndexKind::Sum` (spec §4.6.3): key paths are `[...group, summedField]`.
/// Key is `[subspace][...group]`, value a little-endian `f64` running
/// total. `atomicAdd` is 64-bit-integer-only, so the running total is
/// maintained with a plain read-modify-write rather than the store's
/// native atomic add.
pub struct SumMaintainer {
    subspace: Subspace,
}

impl SumMaintainer {
    pub fn new(subspace: Subspace) -> Self {
        Self { subspace }
    }

    fn key(&self, group: &[Value]) -> Vec<u8> {
        self.subspace.pack(group)
    }

    fn numeric(value: &Value) -> f64 {
        match value {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            _ => 0.0,
        }
    }

    /// Splits `values` into its leading group columns and trailing summed
    /// field, per spec §4.5 ("sum requires at least two key paths: one or
    /// more group columns and the field being summed").
    fn split(values: &[Value]) -> (&[Value], &Value) {
        let (last, group) = values.split_last().expect("sum index requires at least two key paths");
        (group, last)
    }

    async fn add_delta(&self, group: &[Value], delta: f64, tx: &mut dyn KvTransaction) -> Result<(), MaintainError> {
        if delta == 0.0 {
            return Ok(());
        }
        let key = self.key(group);
        let current = tx
            .get(&key)
            .await?
            .map(|bytes| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(buf)
            })
            .unwrap_or(0.0);
        tx.set(&key, &(current + delta).to_le_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl IndexMaintainer for SumMaintainer {
    async fn update(
        &self,
        old: Option<&[Value]>,
        new: Option<&[Value]>,
        _id: &Value,
        tx: &mut dyn KvTransaction,
    ) -> Result<(), MaintainError> {
        if let Some(old_values) = old {
            let (group, value) = Self::split(old_values);
            self.add_delta(group, -Self::numeric(value), tx).await?;
        }
        if let Some(new_values) = new {
            let (group, value) = Self::split(new_values);
            self.add_delta(group, Self::numeric(value), tx).await?;
        }
        Ok(())
    }

    async fn scan(&self, values: &[Value], _id: &Value, tx: &mut dyn KvTransaction) -> Result<(), MaintainError> {
        let (group, value) = Self::split(values);
        self.add_delta(group, Self::numeric(value), tx).await?;
        Ok(())
    }
}
