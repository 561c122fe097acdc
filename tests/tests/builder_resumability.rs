//! Scenario: an online index build can be cancelled mid-backfill without
//! losing progress, and a later resume finishes the job and promotes the
//! index to readable (spec §4.9).

mod common;

use common::{account_schema, Account, BALANCE_INDEX};
use keyspace_core::{BuilderConfig, DataStore, IndexState, Op, Predicate, Query, Value};
use keyspace_kv::MemoryKv;
use keyspace_tuple::Subspace;

fn descriptor(store: &DataStore<MemoryKv>, name: &str) -> keyspace_core::IndexDescriptor {
    store.schema().entity_by_name("Account").unwrap().indexes.iter().find(|d| d.name == name).unwrap().clone()
}

#[tokio::test]
async fn cancelled_build_resumes_and_becomes_readable() {
    let store = DataStore::new(MemoryKv::new(), Subspace::from_raw_prefix(b"T".to_vec()), account_schema());

    store
        .save(vec![
            Account { id: "a1".into(), email: "a@x".into(), owner: "alice".into(), balance: 10 },
            Account { id: "a2".into(), email: "b@x".into(), owner: "bob".into(), balance: 50 },
            Account { id: "a3".into(), email: "c@x".into(), owner: "carol".into(), balance: 90 },
        ])
        .await
        .unwrap();

    let descriptor = descriptor(&store, BALANCE_INDEX);
    let id_expr = store.schema().entity_by_name("Account").unwrap().id_expr.clone();

    // Cancel before the first batch commits: progress must still survive.
    let config = BuilderConfig { batch_size: 1, ..BuilderConfig::default() };
    let builder = store.builder(config.clone());
    let summary = builder.build::<Account>(&descriptor, "Account", &id_expr, || true).await.unwrap();
    assert!(!summary.completed_successfully);
    assert_eq!(store.index_state_manager().state(BALANCE_INDEX).await.unwrap(), IndexState::WriteOnly);

    // Resume: should finish backfilling the remaining records and flip to readable.
    let builder = store.builder(config);
    let summary = builder.build::<Account>(&descriptor, "Account", &id_expr, || false).await.unwrap();
    assert!(summary.completed_successfully);
    assert_eq!(store.index_state_manager().state(BALANCE_INDEX).await.unwrap(), IndexState::Readable);

    let results = store.fetch::<Account>(&Query::new(Predicate::field("balance", Op::Ge, Value::Int(0)))).await.unwrap();
    let mut ids: Vec<&str> = results.iter().map(|a| a.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a1", "a2", "a3"]);
}
