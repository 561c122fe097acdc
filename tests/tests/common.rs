#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use keyspace_core::{DataStore, Entity, IndexDescriptor, IndexKind, MetricsDelegate, Persistable, Schema, SchemaVersion};
use keyspace_keyexpr::{DataAccessError, Record, RecordCodec};
use keyspace_kv::MemoryKv;
use keyspace_tuple::{Subspace, Value};

pub const EMAIL_INDEX: &str = "Account_email";
pub const BALANCE_INDEX: &str = "Account_balance";
pub const OWNER_COUNT_INDEX: &str = "Account_owner_count";

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub owner: String,
    pub balance: i64,
}

impl Record for Account {
    fn field(&self, path: &[&str]) -> Result<Value, DataAccessError> {
        match path {
            ["id"] => Ok(Value::String(self.id.clone())),
            ["email"] => Ok(Value::String(self.email.clone())),
            ["owner"] => Ok(Value::String(self.owner.clone())),
            ["balance"] => Ok(Value::Int(self.balance)),
            _ => Err(DataAccessError::FieldNotFound(path.join("."))),
        }
    }
}

impl RecordCodec for Account {
    type Error = std::convert::Infallible;

    fn serialize(&self) -> Result<Vec<u8>, Self::Error> {
        Ok(format!("{}|{}|{}|{}", self.id, self.email, self.owner, self.balance).into_bytes())
    }

    fn deserialize(bytes: &[u8]) -> Result<Self, Self::Error> {
        let s = String::from_utf8_lossy(bytes);
        let mut parts = s.splitn(4, '|');
        let id = parts.next().unwrap().to_string();
        let email = parts.next().unwrap().to_string();
        let owner = parts.next().unwrap().to_string();
        let balance = parts.next().unwrap().parse().unwrap();
        Ok(Account { id, email, owner, balance })
    }
}

impl Persistable for Account {
    fn entity_name() -> &'static str {
        "Account"
    }
}

pub fn account_schema() -> Schema {
    let entity = Entity::new("Account", vec!["id".into(), "email".into(), "owner".into(), "balance".into()])
        .with_index(IndexDescriptor::new(EMAIL_INDEX, vec!["email".into()], IndexKind::Scalar).unique())
        .with_index(IndexDescriptor::new(BALANCE_INDEX, vec!["balance".into()], IndexKind::Scalar))
        .with_index(IndexDescriptor::new(OWNER_COUNT_INDEX, vec!["owner".into()], IndexKind::Count));
    Schema::build(SchemaVersion::new(1, 0, 0), vec![entity], vec![]).unwrap()
}

pub fn account_store() -> DataStore<MemoryKv> {
    DataStore::new(MemoryKv::new(), Subspace::from_raw_prefix(b"T".to_vec()), account_schema())
}

pub fn account_store_with_metrics(metrics: RecordingMetrics) -> DataStore<MemoryKv> {
    DataStore::with_metrics(MemoryKv::new(), Subspace::from_raw_prefix(b"T".to_vec()), account_schema(), Box::new(metrics))
}

/// Promote an index straight to `readable`, the way a migration tool would
/// after a build completes (spec §4.7/§4.9).
pub async fn make_readable(store: &DataStore<MemoryKv>, index_name: &str) {
    store.index_state_manager().make_write_only(index_name).await.unwrap();
    store.index_state_manager().make_readable(index_name).await.unwrap();
}

/// A recording `MetricsDelegate` for asserting which plan a query actually
/// took. Cloning shares the same underlying log, so a test can hand
/// one clone to `DataStore::with_metrics` (boxed) and keep another to assert
/// against afterwards.
#[derive(Default, Clone)]
pub struct RecordingMetrics {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn used_index_scan_count(&self) -> usize {
        self.events().iter().filter(|e| e.starts_with("index_scan:")).count()
    }

    pub fn used_table_scan_count(&self) -> usize {
        self.events().iter().filter(|e| e == &"table_scan").count()
    }
}

impl MetricsDelegate for RecordingMetrics {
    fn used_index_scan(&self, _entity: &str, index_name: &str) {
        self.events.lock().unwrap().push(format!("index_scan:{index_name}"));
    }

    fn used_table_scan(&self, _entity: &str) {
        self.events.lock().unwrap().push("table_scan".to_string());
    }
}
