//! Integration tests against a live PostgreSQL server.
//!
//! Skipped unless `TESSERA_TEST_DATABASE_URL` names a server the tests may
//! create schemas on. Each test works in its own schema.

use chrono::{TimeZone, Utc};
use std::time::Duration;
use tessera_store::{
    Collection, Document, DocumentId, DocumentStore, Filter, MemoryStore, PostgresStore,
    StoreError, Update, Value,
};

const URL_VAR: &str = "TESSERA_TEST_DATABASE_URL";
const TIMEOUT: Duration = Duration::from_secs(5);

fn server_url() -> Option<String> {
    let url = std::env::var(URL_VAR).ok().filter(|u| !u.is_empty());
    if url.is_none() {
        eprintln!("{URL_VAR} not set, skipping");
    }
    url
}

fn fresh_store(url: &str) -> PostgresStore {
    let schema = format!("it_{}", uuid::Uuid::new_v4().simple());
    PostgresStore::connect(url, &schema, TIMEOUT).unwrap()
}

fn mixed_values() -> Vec<(&'static str, Option<Value>)> {
    vec![
        ("lower_a", Some(Value::from("a"))),
        ("upper_b", Some(Value::from("B"))),
        ("accented_e", Some(Value::from("é"))),
        ("ten", Some(Value::from(10))),
        ("minus_two", Some(Value::from(-2))),
        ("true", Some(Value::from(true))),
        ("false", Some(Value::from(false))),
        ("null", Some(Value::Null)),
        ("absent", None),
        (
            "later",
            Some(Value::from(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())),
        ),
        (
            "earlier",
            Some(Value::from(Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap())),
        ),
        ("zero_byte", Some(Value::from(vec![0x00]))),
        ("high_byte", Some(Value::from(vec![0xf8]))),
        ("id", Some(Value::from(DocumentId::new()))),
    ]
}

fn fill(collection: &dyn Collection) {
    for (label, value) in mixed_values() {
        let mut doc = Document::new().with("label", label);
        if let Some(value) = value {
            doc.set("k", value);
        }
        collection.insert_one(doc).unwrap();
    }
}

fn labels(docs: &[Document]) -> Vec<String> {
    docs.iter()
        .map(|d| d.get_text("label").unwrap().to_string())
        .collect()
}

#[test]
fn sorted_pages_match_the_memory_store() {
    let Some(url) = server_url() else { return };
    let pg = fresh_store(&url);
    let memory = MemoryStore::new();
    let remote = pg.collection("mixed").unwrap();
    let local = memory.collection("mixed").unwrap();
    fill(remote.as_ref());
    fill(local.as_ref());

    for direction in [1, -1] {
        let expected = labels(&local.find(Filter::new()).sort("k", direction).fetch().unwrap());
        let actual = labels(&remote.find(Filter::new()).sort("k", direction).fetch().unwrap());
        assert_eq!(actual, expected, "direction {direction}");

        let page = |c: &dyn Collection| {
            labels(
                &c.find(Filter::new())
                    .sort("k", direction)
                    .skip(3)
                    .limit(4)
                    .fetch()
                    .unwrap(),
            )
        };
        assert_eq!(page(remote.as_ref()), page(local.as_ref()));
    }

    let ascending = labels(&remote.find(Filter::new()).sort("k", 1).fetch().unwrap());
    let position = |label: &str| ascending.iter().position(|l| l == label).unwrap();
    assert!(position("upper_b") < position("lower_a"));
    assert!(position("lower_a") < position("accented_e"));
    assert!(position("zero_byte") < position("high_byte"));
    assert!(position("earlier") < position("later"));
}

#[test]
fn unique_index_over_existing_duplicates_still_guards_writes() {
    let Some(url) = server_url() else { return };
    let store = fresh_store(&url);
    let users = store.collection("users").unwrap();
    for _ in 0..2 {
        users
            .insert_one(Document::new().with("username", "twin"))
            .unwrap();
    }

    users.create_index("username", true).unwrap();

    let err = users
        .insert_one(Document::new().with("username", "twin"))
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { ref field, .. } if field == "username"));

    users
        .insert_one(Document::new().with("username", "solo"))
        .unwrap();
    let err = users
        .update_one(
            &Filter::new().eq("username", "solo"),
            &Update::new().set("username", "twin"),
        )
        .unwrap_err();
    assert!(err.is_duplicate_key());

    let unchanged = users
        .update_one(
            &Filter::new().eq("username", "solo"),
            &Update::new().set("username", "solo").set("active", true),
        )
        .unwrap();
    assert_eq!(unchanged.matched_count, 1);
    assert_eq!(users.count_documents(&Filter::new()).unwrap(), 3);

    // Repeating the call keeps the write check in place.
    users.create_index("username", true).unwrap();
}

#[test]
fn missing_database_reports_server_code() {
    let Some(url) = server_url() else { return };
    let mut missing = url::Url::parse(&url).unwrap();
    missing.set_path(&format!("/tessera_missing_{}", uuid::Uuid::new_v4().simple()));

    let err = PostgresStore::connect(missing.as_str(), "tessera", TIMEOUT).unwrap_err();
    assert!(
        matches!(err, StoreError::ConnectionUnavailable { ref reason } if reason.contains("3D000")),
        "{err}"
    );
}
