mod common;
use common::*;

use bson::doc;
use vellum_db::{DbError, FindOptions, Registry};

// ── Database tests ──────────────────────────────────────────────

#[test]
fn opening_the_same_name_twice_conflicts() {
    let registry = Registry::new();
    let _db = registry.open("app").unwrap();
    let err = registry.open("app").unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
}

#[test]
fn separate_registries_are_independent() {
    let first = Registry::new();
    let second = Registry::new();
    let _a = first.open("app").unwrap();
    let _b = second.open("app").unwrap();
}

#[test]
fn drop_database_releases_the_name() {
    let registry = Registry::new();
    let db = registry.open("app").unwrap();
    db.collection("c").unwrap().insert(doc! { "n": 1 }).unwrap();
    assert!(db.drop_database().unwrap());
    assert!(db.collection_names(None).is_empty());

    let again = registry.open("app").unwrap();
    assert!(again.collection_names(None).is_empty());
}

#[test]
fn database_name_rules() {
    let registry = Registry::new();
    for bad in ["", "a b", "a.b", "a$b", "a/b", "a\\b"] {
        assert!(registry.open(bad).is_err(), "expected {bad:?} to be rejected");
    }
}

#[test]
fn collection_name_rules() {
    let db = temp_db();
    assert!(db.collection("accounts").is_ok());
    assert!(db.collection("$cmd").is_ok());
    assert!(db.collection("oplog.$main").is_ok());
    for bad in ["", "a..b", "a$b", ".a", "a."] {
        assert!(db.collection(bad).is_err(), "expected {bad:?} to be rejected");
    }
}

#[test]
fn collection_handles_share_state() {
    let db = temp_db();
    let first = db.collection("c").unwrap();
    first.insert(doc! { "n": 1 }).unwrap();
    let second = db.collection("c").unwrap();
    assert_eq!(second.len(), 1);
}

#[test]
fn full_name_includes_database() {
    let db = temp_db();
    let collection = db.collection("accounts").unwrap();
    assert_eq!(collection.full_name(), "app.accounts");
}

#[test]
fn collections_listing() {
    let db = temp_db();
    db.collection("b").unwrap();
    db.collection("a").unwrap();
    assert_eq!(db.collection_names(None), vec!["a", "b"]);
    assert_eq!(db.collection_names(Some("b")), vec!["b"]);
    assert_eq!(db.collections(None).len(), 2);
    assert_eq!(db.collections(Some("missing")).len(), 0);
}

#[test]
fn drop_collection_reports_existence() {
    let db = temp_db();
    db.collection("c").unwrap();
    assert!(db.drop_collection("c").unwrap());
    assert!(!db.drop_collection("c").unwrap());
}

#[test]
fn rename_collection_moves_the_registry_entry() {
    let (db, collection) = seeded();
    let renamed = db.rename_collection(COLLECTION, "archive").unwrap().unwrap();
    assert_eq!(renamed.name(), "archive");
    assert_eq!(renamed.full_name(), "app.archive");
    assert_eq!(db.collection_names(None), vec!["archive"]);

    // The original handle follows the rename.
    assert_eq!(collection.name(), "archive");
    assert_eq!(collection.len(), 5);
}

#[test]
fn rename_collection_missing_source() {
    let db = temp_db();
    assert!(db.rename_collection("ghost", "other").unwrap().is_none());
}

#[test]
fn rename_into_existing_name_conflicts() {
    let db = temp_db();
    db.collection("a").unwrap();
    db.collection("b").unwrap();
    let err = db.rename_collection("a", "b").unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
}

#[test]
fn index_surface_is_unsupported() {
    let (_db, collection) = seeded();
    assert!(matches!(
        collection.ensure_index(&doc! { "name": 1 }),
        Err(DbError::Unsupported(_))
    ));
    assert!(matches!(
        collection.drop_index("name"),
        Err(DbError::Unsupported(_))
    ));
    assert!(matches!(collection.reindex(), Err(DbError::Unsupported(_))));
}

#[test]
fn dropped_collection_handle_keeps_working_standalone() {
    let db = temp_db();
    let collection = db.collection("c").unwrap();
    collection.insert(doc! { "n": 1 }).unwrap();
    db.drop_collection("c").unwrap();
    // The handle still reads its own state; the database no longer lists it.
    let docs = collection.find((), (), FindOptions::default()).unwrap().fetch();
    assert_eq!(docs.len(), 1);
    assert!(db.collection_names(None).is_empty());
}
