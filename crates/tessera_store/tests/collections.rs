//! Integration tests for the document store interface.

use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tessera_store::{
    open, BackendKind, Collection, Document, DocumentId, DocumentStore, Filter, MemoryStore,
    StoreConfig, StoreError, Update, Value, ID_FIELD,
};

fn fallback() -> Arc<dyn DocumentStore> {
    let config = StoreConfig::default()
        .with_database_url("postgres://tessera@127.0.0.1:1")
        .with_connect_timeout(Duration::from_millis(200));
    let opened = open(&config).unwrap();
    assert_eq!(opened.backend, BackendKind::Memory);
    opened.store
}

fn uploads_with(values: &[i64]) -> Arc<dyn Collection> {
    let store = MemoryStore::new();
    let uploads = store.collection("uploaded_images").unwrap();
    for v in values {
        uploads
            .insert_one(Document::new().with("uploaded_at", *v).with("user_id", "u1"))
            .unwrap();
    }
    uploads
}

fn uploaded_at(docs: &[Document]) -> Vec<i64> {
    docs.iter()
        .map(|d| d.get("uploaded_at").and_then(Value::as_integer).unwrap())
        .collect()
}

#[test]
fn cursor_pipeline_sorts_then_skips_then_limits() {
    let uploads = uploads_with(&[1, 3, 2]);
    let page = uploads
        .find(Filter::new())
        .sort("uploaded_at", -1)
        .skip(1)
        .limit(1)
        .fetch()
        .unwrap();
    assert_eq!(uploaded_at(&page), vec![2]);
}

#[test]
fn cursor_is_restartable_and_sees_new_state() {
    let uploads = uploads_with(&[1, 2]);
    let cursor = uploads.find(Filter::new().eq("user_id", "u1"));
    assert_eq!(cursor.fetch().unwrap().len(), 2);
    assert_eq!(cursor.iter().unwrap().count(), 2);

    uploads
        .insert_one(Document::new().with("uploaded_at", 9).with("user_id", "u1"))
        .unwrap();
    assert_eq!(cursor.fetch().unwrap().len(), 3);
}

#[test]
fn cursor_without_sort_keeps_insertion_order() {
    let uploads = uploads_with(&[5, 1, 4]);
    let all = uploads.find(Filter::new()).fetch().unwrap();
    assert_eq!(uploaded_at(&all), vec![5, 1, 4]);
}

#[test]
fn fallback_store_enforces_unique_usernames() {
    let store = fallback();
    let users = store.collection("users").unwrap();
    users.create_index("username", true).unwrap();

    let first = users
        .insert_one(Document::new().with("username", "alice"))
        .unwrap();
    let err = users
        .insert_one(Document::new().with("username", "alice"))
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));

    let kept = users
        .find_one(&Filter::by_id(first.inserted_id))
        .unwrap()
        .unwrap();
    assert_eq!(kept.get_text("username"), Some("alice"));
}

#[test]
fn fallback_store_text_encodes_passwords() {
    let store = fallback();
    let users = store.collection("users").unwrap();
    users
        .insert_one(Document::new().with("password", b"$argon2id$x".to_vec()))
        .unwrap();
    let doc = users.find_one(&Filter::new()).unwrap().unwrap();
    assert_eq!(doc.get_text("password"), Some("$argon2id$x"));
}

#[test]
fn native_id_and_text_are_interchangeable() {
    let store = MemoryStore::new();
    let users = store.collection("users").unwrap();
    let id = DocumentId::new();
    users
        .insert_one(Document::new().with(ID_FIELD, id).with("username", "a"))
        .unwrap();

    assert!(users
        .find_one(&Filter::by_id(id.to_string()))
        .unwrap()
        .is_some());

    let result = users
        .update_one(&Filter::by_id(id.to_string()), &Update::new().set("name", "A"))
        .unwrap();
    assert_eq!(result.modified_count, 1);

    let deleted = users.delete_one(&Filter::by_id(id)).unwrap();
    assert_eq!(deleted.deleted_count, 1);
}

#[test]
fn concurrent_inserts_keep_usernames_unique() {
    let store = MemoryStore::new();
    let users = store.collection("users").unwrap();
    users.create_index("username", true).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let users = Arc::clone(&users);
            thread::spawn(move || {
                users
                    .insert_one(Document::new().with("username", "race"))
                    .is_ok()
            })
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(users.count_documents(&Filter::new()).unwrap(), 1);
}

proptest! {
    #[test]
    fn pipeline_matches_reference_slice(
        values in proptest::collection::vec(-50i64..50, 0..30),
        skip in 0usize..35,
        limit in 0usize..35,
        descending in any::<bool>(),
    ) {
        let uploads = uploads_with(&values);
        let direction = if descending { -1 } else { 1 };
        let page = uploads
            .find(Filter::new())
            .sort("uploaded_at", direction)
            .skip(skip)
            .limit(limit)
            .fetch()
            .unwrap();

        let mut expected = values.clone();
        expected.sort_unstable();
        if descending {
            expected.reverse();
        }
        let expected: Vec<i64> = expected
            .into_iter()
            .skip(skip)
            .take(if limit == 0 { usize::MAX } else { limit })
            .collect();
        prop_assert_eq!(uploaded_at(&page), expected);
    }
}
