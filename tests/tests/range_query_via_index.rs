//! Scenario: a range predicate on an indexed field drives an index scan
//! rather than a full table scan, and returns the correctly-bounded set
//! (spec §4.11).

mod common;

use common::{account_store_with_metrics, make_readable, Account, RecordingMetrics, BALANCE_INDEX};
use keyspace_core::{Op, Predicate, Query};
use keyspace_tuple::Value;

async fn seeded_store(metrics: RecordingMetrics) -> keyspace_core::DataStore<keyspace_kv::MemoryKv> {
    let store = account_store_with_metrics(metrics);
    make_readable(&store, BALANCE_INDEX).await;
    store
        .save(vec![
            Account { id: "a1".into(), email: "a@x".into(), owner: "alice".into(), balance: 10 },
            Account { id: "a2".into(), email: "b@x".into(), owner: "bob".into(), balance: 50 },
            Account { id: "a3".into(), email: "c@x".into(), owner: "carol".into(), balance: 90 },
        ])
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn greater_than_uses_the_balance_index_and_excludes_the_boundary() {
    let metrics = RecordingMetrics::new();
    let store = seeded_store(metrics.clone()).await;

    let predicate = Predicate::field("balance", Op::Gt, Value::Int(10));
    let results = store.fetch::<Account>(&Query::new(predicate)).await.unwrap();

    let mut ids: Vec<&str> = results.iter().map(|a| a.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a2", "a3"]);
    assert_eq!(metrics.used_index_scan_count(), 1);
    assert_eq!(metrics.used_table_scan_count(), 0);
}

#[tokio::test]
async fn range_between_two_bounds_via_and_chain() {
    let metrics = RecordingMetrics::new();
    let store = seeded_store(metrics.clone()).await;

    let predicate = Predicate::and([
        Predicate::field("balance", Op::Ge, Value::Int(20)),
        Predicate::field("balance", Op::Le, Value::Int(90)),
    ]);
    let results = store.fetch::<Account>(&Query::new(predicate)).await.unwrap();

    let mut ids: Vec<&str> = results.iter().map(|a| a.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a2", "a3"]);
    assert_eq!(metrics.used_index_scan_count(), 1);
}
