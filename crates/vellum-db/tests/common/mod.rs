use bson::doc;
use vellum_db::{Collection, Database, Registry};

pub const COLLECTION: &str = "accounts";

pub fn temp_db() -> Database {
    Registry::new().open("app").unwrap()
}

pub fn empty_collection() -> (Database, Collection) {
    let db = temp_db();
    let collection = db.collection(COLLECTION).unwrap();
    (db, collection)
}

/// Insert 5 seed records.
pub fn seeded() -> (Database, Collection) {
    let (db, collection) = empty_collection();
    collection
        .insert_many(vec![
            doc! { "_id": "acct-1", "name": "Acme Corp", "revenue": 50000.0, "status": "active", "tags": ["tech"] },
            doc! { "_id": "acct-2", "name": "Globex", "revenue": 80000.0, "status": "snoozed", "tags": ["tech", "eu"] },
            doc! { "_id": "acct-3", "name": "Initech", "revenue": 12000.0, "status": "rejected", "tags": [] },
            doc! { "_id": "acct-4", "name": "Umbrella", "revenue": 95000.0, "status": "active", "tags": ["pharma"] },
            doc! { "_id": "acct-5", "name": "Stark Industries", "revenue": 200000.0, "status": "active", "tags": ["defense", "tech"] },
        ])
        .unwrap();
    (db, collection)
}

pub fn ids(docs: &[bson::Document]) -> Vec<&str> {
    docs.iter().map(|d| d.get_str("_id").unwrap()).collect()
}
