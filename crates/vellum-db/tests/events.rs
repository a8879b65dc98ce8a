mod common;
use common::*;

use std::cell::RefCell;
use std::rc::Rc;

use bson::doc;
use vellum_db::{Event, FindOptions, RemoveOptions, Store, UpdateOptions};

/// Records every event name it sees, via the catch-all handler.
struct RecordingStore {
    log: Rc<RefCell<Vec<String>>>,
}

impl Store for RecordingStore {
    fn all(&mut self, event: &Event<'_>) {
        self.log.borrow_mut().push(event.name().to_string());
    }
}

/// Only implements the insert handler; everything else stays silent.
struct InsertOnlyStore {
    inserted_ids: Rc<RefCell<Vec<String>>>,
}

impl Store for InsertOnlyStore {
    fn insert(&mut self, event: &Event<'_>) {
        if let Event::Insert { doc, .. } = event {
            self.inserted_ids
                .borrow_mut()
                .push(doc.get_str("_id").unwrap_or_default().to_string());
        }
    }
}

#[test]
fn events_arrive_in_operation_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let db = temp_db();
    db.add_store(Box::new(RecordingStore { log: Rc::clone(&log) }));

    let collection = db.collection("c").unwrap();
    collection.insert(doc! { "_id": "1", "a": 1 }).unwrap();
    collection
        .update("1", &doc! { "$set": { "a": 2 } }, UpdateOptions::default())
        .unwrap();
    collection.find((), (), FindOptions::default()).unwrap();
    collection.remove("1", RemoveOptions::default()).unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["createCollection", "insert", "update", "find", "remove"]
    );
}

#[test]
fn per_event_handlers_see_payloads() {
    let inserted = Rc::new(RefCell::new(Vec::new()));
    let db = temp_db();
    db.add_store(Box::new(InsertOnlyStore {
        inserted_ids: Rc::clone(&inserted),
    }));

    let collection = db.collection("c").unwrap();
    collection.insert(doc! { "_id": "a" }).unwrap();
    collection.insert(doc! { "_id": "b" }).unwrap();
    collection.remove("a", RemoveOptions::default()).unwrap();

    assert_eq!(*inserted.borrow(), vec!["a", "b"]);
}

#[test]
fn every_registered_store_is_notified() {
    let first = Rc::new(RefCell::new(Vec::new()));
    let second = Rc::new(RefCell::new(Vec::new()));
    let db = temp_db();
    db.add_store(Box::new(RecordingStore { log: Rc::clone(&first) }))
        .add_store(Box::new(RecordingStore { log: Rc::clone(&second) }));

    db.collection("c").unwrap().insert(doc! { "n": 1 }).unwrap();

    assert_eq!(*first.borrow(), *second.borrow());
    assert_eq!(first.borrow().len(), 2);
}

#[test]
fn failed_operations_emit_nothing() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let db = temp_db();
    db.add_store(Box::new(RecordingStore { log: Rc::clone(&log) }));

    let collection = db.collection("c").unwrap();
    collection.insert(doc! { "_id": "1" }).unwrap();
    log.borrow_mut().clear();

    assert!(collection.insert(doc! { "$bad": 1 }).is_err());
    assert!(
        collection
            .update("1", &doc! { "$set": { "a": 1 }, "b": 2 }, UpdateOptions::default())
            .is_err()
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn lifecycle_events() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let db = temp_db();
    db.add_store(Box::new(RecordingStore { log: Rc::clone(&log) }));

    let collection = db.collection("c").unwrap();
    collection.backup(Some("snap")).unwrap();
    collection.restore(Some("snap")).unwrap();
    db.rename_collection("c", "d").unwrap();
    db.drop_collection("d").unwrap();
    db.drop_database().unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            "createCollection",
            "snapshot",
            "restore",
            "renameCollection",
            "dropCollection",
            "dropDatabase"
        ]
    );
}

#[test]
fn update_event_carries_new_documents() {
    struct UpdateStore {
        seen: Rc<RefCell<usize>>,
    }
    impl Store for UpdateStore {
        fn update(&mut self, event: &Event<'_>) {
            if let Event::Update { docs, .. } = event {
                *self.seen.borrow_mut() += docs.len();
            }
        }
    }

    let seen = Rc::new(RefCell::new(0));
    let db = temp_db();
    db.add_store(Box::new(UpdateStore { seen: Rc::clone(&seen) }));
    let collection = db.collection("c").unwrap();
    collection
        .insert_many(vec![doc! { "g": 1 }, doc! { "g": 1 }])
        .unwrap();
    collection
        .update(doc! { "g": 1 }, &doc! { "$set": { "g": 2 } }, UpdateOptions::multi())
        .unwrap();
    assert_eq!(*seen.borrow(), 2);
}
