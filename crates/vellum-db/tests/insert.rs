mod common;
use common::*;

use bson::doc;
use vellum_db::{DbError, FindOptions};

// ── Insert tests ────────────────────────────────────────────────

#[test]
fn numeric_id_is_stored_as_digit_string() {
    let (_db, collection) = empty_collection();
    let stored = collection.insert(doc! { "_id": 7, "name": "a" }).unwrap();
    assert_eq!(stored.get_str("_id").unwrap(), "7");
    assert_eq!(stored.get_str("name").unwrap(), "a");
    assert!(stored.get_i64("timestamp").is_ok());

    let found = collection
        .find_one("7", (), FindOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(found.get_str("name").unwrap(), "a");
}

#[test]
fn generated_ids_are_distinct_hex() {
    let (_db, collection) = empty_collection();
    let first = collection.insert(doc! { "name": "x" }).unwrap();
    let second = collection.insert(doc! { "name": "x" }).unwrap();

    let first_id = first.get_str("_id").unwrap();
    let second_id = second.get_str("_id").unwrap();
    assert_ne!(first_id, second_id);
    for idv in [first_id, second_id] {
        assert_eq!(idv.len(), 24);
        assert!(idv.chars().all(|c| c.is_ascii_hexdigit()));
    }
    assert_eq!(collection.len(), 2);
}

#[test]
fn string_ids_pass_through() {
    let (_db, collection) = empty_collection();
    let stored = collection.insert(doc! { "_id": "acct-9", "n": 1 }).unwrap();
    assert_eq!(stored.get_str("_id").unwrap(), "acct-9");
}

#[test]
fn timestamp_reflects_generation_instant() {
    let (_db, collection) = empty_collection();
    let stored = collection.insert(doc! { "n": 1 }).unwrap();
    let ts = stored.get_i64("timestamp").unwrap();
    // A generated identifier's embedded instant is "now" within slack.
    let now = bson::oid::ObjectId::new().timestamp().timestamp_millis() / 1000;
    assert!((now - ts).abs() < 5, "timestamp {ts} too far from {now}");
}

#[test]
fn duplicate_ids_conflict() {
    let (_db, collection) = empty_collection();
    collection.insert(doc! { "_id": "dup" }).unwrap();
    let err = collection.insert(doc! { "_id": "dup" }).unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
    assert_eq!(collection.len(), 1);
}

#[test]
fn field_names_are_validated() {
    let (_db, collection) = empty_collection();
    assert!(collection.insert(doc! { "$set": 1 }).is_err());
    assert!(collection.insert(doc! { "a.b": 1 }).is_err());
    assert!(collection.insert(doc! { "a": { "$nested": 1 } }).is_err());
    assert!(collection.is_empty());
}

#[test]
fn insert_returns_the_stored_copy() {
    let (_db, collection) = empty_collection();
    let stored = collection.insert(doc! { "a": 1 }).unwrap();
    let found = collection
        .find_one(stored.get_str("_id").unwrap(), (), FindOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(found, stored);
}

#[test]
fn insert_many_is_atomic() {
    let (_db, collection) = empty_collection();
    let err = collection
        .insert_many(vec![doc! { "ok": 1 }, doc! { "$bad": 1 }])
        .unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));
    assert!(collection.is_empty());

    let docs = collection
        .insert_many(vec![doc! { "n": 1 }, doc! { "n": 2 }])
        .unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(collection.len(), 2);
}

#[test]
fn insert_many_rejects_duplicates_within_batch() {
    let (_db, collection) = empty_collection();
    let err = collection
        .insert_many(vec![doc! { "_id": "x" }, doc! { "_id": "x" }])
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
    assert!(collection.is_empty());
}
