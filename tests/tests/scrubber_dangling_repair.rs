//! Scenario: the scrubber detects and repairs both directions of index
//! drift against a live store: a stale entry left behind by a direct,
//! maintainer-bypassing write, and a record whose index entry never got
//! written at all (spec §4.10).

mod common;

use common::{account_schema, Account, EMAIL_INDEX};
use keyspace_core::{DataStore, ScrubberConfig};
use keyspace_keyexpr::RecordCodec;
use keyspace_kv::{KvStore, KvTransaction};
use keyspace_tuple::{Subspace, Value};

fn email_descriptor(store: &DataStore<keyspace_kv::MemoryKv>) -> keyspace_core::IndexDescriptor {
    store.schema().entity_by_name("Account").unwrap().indexes.iter().find(|d| d.name == EMAIL_INDEX).unwrap().clone()
}

#[tokio::test]
async fn phase1_clears_a_stale_entry_left_by_a_bypassed_write() {
    let store = DataStore::new(keyspace_kv::MemoryKv::new(), Subspace::from_raw_prefix(b"T".to_vec()), account_schema());
    store.index_state_manager().make_write_only(EMAIL_INDEX).await.unwrap();
    store.index_state_manager().make_readable(EMAIL_INDEX).await.unwrap();

    store.save(vec![Account { id: "a1".into(), email: "old@x.com".into(), owner: "alice".into(), balance: 10 }]).await.unwrap();

    // Simulate an out-of-band record rewrite that bypasses the maintainer,
    // leaving the old index entry dangling.
    let kv = store.kv();
    let record_key = store.keys().record_key("Account", &Value::String("a1".into()));
    let rewritten = Account { id: "a1".into(), email: "new@x.com".into(), owner: "alice".into(), balance: 10 };
    let mut tx = kv.begin().await.unwrap();
    tx.set(&record_key, &rewritten.serialize().unwrap()).await.unwrap();
    tx.commit().await.unwrap();

    let descriptor = email_descriptor(&store);
    let id_expr = store.schema().entity_by_name("Account").unwrap().id_expr.clone();
    let scrubber = store.scrubber(ScrubberConfig::default());
    let summary = scrubber.scrub::<Account>(&descriptor, "Account", &id_expr, || false).await.unwrap();

    assert_eq!(summary.dangling_detected, 1);
    assert_eq!(summary.dangling_repaired, 1);
    assert_eq!(summary.missing_detected, 1);
    assert_eq!(summary.missing_repaired, 1);
    assert!(summary.completed_successfully);

    let index_subspace = store.keys().index(EMAIL_INDEX);
    let stale_key = index_subspace.pack(&[Value::String("old@x.com".into()), Value::String("a1".into())]);
    let fresh_key = index_subspace.pack(&[Value::String("new@x.com".into()), Value::String("a1".into())]);
    let mut tx = kv.begin().await.unwrap();
    assert!(tx.get(&stale_key).await.unwrap().is_none());
    assert!(tx.get(&fresh_key).await.unwrap().is_some());
}
