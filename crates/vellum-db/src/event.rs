use std::cell::RefCell;
use std::rc::Rc;

use bson::Document;

/// A mutation or query event, multicast to every observer store after the
/// operation commits.
#[derive(Debug)]
pub enum Event<'a> {
    Insert {
        collection: &'a str,
        doc: &'a Document,
    },
    Find {
        collection: &'a str,
        selector: &'a Document,
        fields: &'a Document,
    },
    FindOne {
        collection: &'a str,
        selector: &'a Document,
        fields: &'a Document,
    },
    Update {
        collection: &'a str,
        selector: &'a Document,
        modifier: &'a Document,
        docs: &'a [Document],
    },
    Remove {
        collection: &'a str,
        selector: &'a Document,
        docs: &'a [Document],
    },
    CreateCollection {
        collection: &'a str,
    },
    DropCollection {
        collection: &'a str,
    },
    RenameCollection {
        from: &'a str,
        to: &'a str,
    },
    DropDatabase {
        database: &'a str,
    },
    Snapshot {
        collection: &'a str,
        id: &'a str,
    },
    Restore {
        collection: &'a str,
        id: &'a str,
    },
}

impl Event<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Insert { .. } => "insert",
            Event::Find { .. } => "find",
            Event::FindOne { .. } => "findOne",
            Event::Update { .. } => "update",
            Event::Remove { .. } => "remove",
            Event::CreateCollection { .. } => "createCollection",
            Event::DropCollection { .. } => "dropCollection",
            Event::RenameCollection { .. } => "renameCollection",
            Event::DropDatabase { .. } => "dropDatabase",
            Event::Snapshot { .. } => "snapshot",
            Event::Restore { .. } => "restore",
        }
    }
}

/// An observer store registered with a database.
///
/// Implement the handlers for the events of interest, or `all` as a
/// catch-all; every per-event handler defaults to `all`. Payload
/// references are only valid for the duration of the call; observers that
/// retain data must copy it.
pub trait Store {
    fn all(&mut self, _event: &Event<'_>) {}

    fn insert(&mut self, event: &Event<'_>) {
        self.all(event);
    }

    fn find(&mut self, event: &Event<'_>) {
        self.all(event);
    }

    fn find_one(&mut self, event: &Event<'_>) {
        self.all(event);
    }

    fn update(&mut self, event: &Event<'_>) {
        self.all(event);
    }

    fn remove(&mut self, event: &Event<'_>) {
        self.all(event);
    }

    fn create_collection(&mut self, event: &Event<'_>) {
        self.all(event);
    }

    fn drop_collection(&mut self, event: &Event<'_>) {
        self.all(event);
    }

    fn rename_collection(&mut self, event: &Event<'_>) {
        self.all(event);
    }

    fn drop_database(&mut self, event: &Event<'_>) {
        self.all(event);
    }

    fn snapshot(&mut self, event: &Event<'_>) {
        self.all(event);
    }

    fn restore(&mut self, event: &Event<'_>) {
        self.all(event);
    }
}

/// Observer stores, shared between a database and its collections.
pub(crate) type StoreBus = Rc<RefCell<Vec<Box<dyn Store>>>>;

pub(crate) fn dispatch(store: &mut dyn Store, event: &Event<'_>) {
    match event {
        Event::Insert { .. } => store.insert(event),
        Event::Find { .. } => store.find(event),
        Event::FindOne { .. } => store.find_one(event),
        Event::Update { .. } => store.update(event),
        Event::Remove { .. } => store.remove(event),
        Event::CreateCollection { .. } => store.create_collection(event),
        Event::DropCollection { .. } => store.drop_collection(event),
        Event::RenameCollection { .. } => store.rename_collection(event),
        Event::DropDatabase { .. } => store.drop_database(event),
        Event::Snapshot { .. } => store.snapshot(event),
        Event::Restore { .. } => store.restore(event),
    }
}

pub(crate) fn emit(stores: &StoreBus, event: &Event<'_>) {
    let mut stores = stores.borrow_mut();
    for store in stores.iter_mut() {
        dispatch(store.as_mut(), event);
    }
}
