//! Scenario: a unique index rejects a second record with a colliding value,
//! and the rejected write leaves the store untouched.

mod common;

use common::{account_store, make_readable, Account, EMAIL_INDEX};
use keyspace_core::MutationError;

#[tokio::test]
async fn colliding_email_is_rejected() {
    let store = account_store();
    make_readable(&store, EMAIL_INDEX).await;

    store.save(vec![Account { id: "a1".into(), email: "a@x.com".into(), owner: "alice".into(), balance: 10 }]).await.unwrap();

    let err = store
        .save(vec![Account { id: "a2".into(), email: "a@x.com".into(), owner: "bob".into(), balance: 20 }])
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::Maintain(_)));

    // The rejected save did not leave a second record behind.
    assert_eq!(store.fetch_count::<Account>(&Default::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn distinct_emails_both_succeed() {
    let store = account_store();
    make_readable(&store, EMAIL_INDEX).await;

    store.save(vec![Account { id: "a1".into(), email: "a@x.com".into(), owner: "alice".into(), balance: 10 }]).await.unwrap();
    store.save(vec![Account { id: "a2".into(), email: "b@x.com".into(), owner: "bob".into(), balance: 20 }]).await.unwrap();

    assert_eq!(store.fetch_count::<Account>(&Default::default()).await.unwrap(), 2);
}

#[tokio::test]
async fn deleting_the_holder_frees_its_email_for_reuse() {
    let store = account_store();
    make_readable(&store, EMAIL_INDEX).await;

    store.save(vec![Account { id: "a1".into(), email: "a@x.com".into(), owner: "alice".into(), balance: 10 }]).await.unwrap();
    store.delete_by_id::<Account>(keyspace_core::Value::String("a1".into())).await.unwrap();

    store.save(vec![Account { id: "a2".into(), email: "a@x.com".into(), owner: "bob".into(), balance: 20 }]).await.unwrap();
    assert_eq!(store.fetch_count::<Account>(&Default::default()).await.unwrap(), 1);
}
