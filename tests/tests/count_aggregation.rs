//! Scenario: a count index tracks group membership as records are saved,
//! updated into a different group, and deleted (spec §4.6.2).

mod common;

use keyspace_core::{make_maintainer, IndexDescriptor, IndexKind, Keys};
use keyspace_kv::{KvStore, MemoryKv};
use keyspace_tuple::{Subspace, Value};

async fn read_count(kv: &MemoryKv, keys: &Keys, owner: &str) -> i64 {
    let subspace = keys.index("Account_owner_count");
    let key = subspace.pack(&[Value::String(owner.to_string())]);
    let mut tx = kv.begin().await.unwrap();
    match tx.get(&key).await.unwrap() {
        Some(bytes) => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[..8]);
            i64::from_le_bytes(buf)
        }
        None => 0,
    }
}

#[tokio::test]
async fn count_tracks_inserts_group_changes_and_deletes() {
    let kv = MemoryKv::new();
    let keys = Keys::new(Subspace::from_raw_prefix(b"T".to_vec()));
    let descriptor = IndexDescriptor::new("Account_owner_count", vec!["owner".into()], IndexKind::Count);
    let maintainer = make_maintainer(&descriptor, keys.index(&descriptor.name)).unwrap();

    let mut tx = kv.begin().await.unwrap();
    maintainer.update(None, Some(&[Value::String("alice".into())]), &Value::String("a1".into()), tx.as_mut()).await.unwrap();
    maintainer.update(None, Some(&[Value::String("alice".into())]), &Value::String("a2".into()), tx.as_mut()).await.unwrap();
    maintainer.update(None, Some(&[Value::String("bob".into())]), &Value::String("b1".into()), tx.as_mut()).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(read_count(&kv, &keys, "alice").await, 2);
    assert_eq!(read_count(&kv, &keys, "bob").await, 1);

    // a2 moves from alice's group to bob's.
    let mut tx = kv.begin().await.unwrap();
    maintainer
        .update(Some(&[Value::String("alice".into())]), Some(&[Value::String("bob".into())]), &Value::String("a2".into()), tx.as_mut())
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(read_count(&kv, &keys, "alice").await, 1);
    assert_eq!(read_count(&kv, &keys, "bob").await, 2);

    let mut tx = kv.begin().await.unwrap();
    maintainer.update(Some(&[Value::String("alice".into())]), None, &Value::String("a1".into()), tx.as_mut()).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(read_count(&kv, &keys, "alice").await, 0);
}
