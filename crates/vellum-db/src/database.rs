use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::collection::Collection;
use crate::error::DbError;
use crate::event::{self, Event, Store, StoreBus};
use crate::validate;

/// The set of open database names.
///
/// Databases opened through one registry share it: opening a name twice
/// fails until the first database is dropped.
#[derive(Clone, Default)]
pub struct Registry {
    names: Rc<RefCell<HashSet<String>>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Open a database, claiming its name within this registry.
    pub fn open(&self, name: &str) -> Result<Database, DbError> {
        validate::database_name(name)?;
        if !self.names.borrow_mut().insert(name.to_string()) {
            return Err(DbError::Conflict(format!(
                "database '{name}' is already open"
            )));
        }
        tracing::debug!(database = %name, "open");
        Ok(Database {
            name: name.to_string(),
            collections: Rc::new(RefCell::new(HashMap::new())),
            stores: Rc::new(RefCell::new(Vec::new())),
            registry: Rc::clone(&self.names),
        })
    }
}

/// A name registry of collections plus the observer-store fan-out point.
#[derive(Clone)]
pub struct Database {
    name: String,
    collections: Rc<RefCell<HashMap<String, Collection>>>,
    stores: StoreBus,
    registry: Rc<RefCell<HashSet<String>>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish()
    }
}

impl Database {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an observer store; it sees every subsequent event from
    /// this database and its collections.
    pub fn add_store(&self, store: Box<dyn Store>) -> &Database {
        self.stores.borrow_mut().push(store);
        self
    }

    /// Fetch a collection handle, creating the collection on first use.
    pub fn collection(&self, name: &str) -> Result<Collection, DbError> {
        if let Some(existing) = self.collections.borrow().get(name) {
            return Ok(existing.clone());
        }
        let collection = Collection::new(
            &self.name,
            name,
            Rc::clone(&self.stores),
            Rc::downgrade(&self.collections),
        )?;
        self.collections
            .borrow_mut()
            .insert(name.to_string(), collection.clone());
        event::emit(&self.stores, &Event::CreateCollection { collection: name });
        Ok(collection)
    }

    /// Drop a collection and its documents. Returns whether it existed.
    pub fn drop_collection(&self, name: &str) -> Result<bool, DbError> {
        let removed = self.collections.borrow_mut().remove(name);
        match removed {
            Some(_) => {
                event::emit(&self.stores, &Event::DropCollection { collection: name });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rename a collection. Returns `None` when the source is missing.
    pub fn rename_collection(&self, from: &str, to: &str) -> Result<Option<Collection>, DbError> {
        let handle = { self.collections.borrow().get(from).cloned() };
        match handle {
            Some(collection) => {
                collection.rename(to)?;
                Ok(Some(collection))
            }
            None => Ok(None),
        }
    }

    /// Collection handles, sorted by name, optionally restricted to one
    /// name.
    pub fn collections(&self, filter: Option<&str>) -> Vec<Collection> {
        let map = self.collections.borrow();
        let mut entries: Vec<(&String, &Collection)> = map
            .iter()
            .filter(|(name, _)| filter.is_none_or(|wanted| wanted == name.as_str()))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
            .into_iter()
            .map(|(_, collection)| collection.clone())
            .collect()
    }

    /// Collection names, sorted, optionally restricted to one name.
    pub fn collection_names(&self, filter: Option<&str>) -> Vec<String> {
        let map = self.collections.borrow();
        let mut names: Vec<String> = map
            .keys()
            .filter(|name| filter.is_none_or(|wanted| wanted == name.as_str()))
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Drop every collection and release this database's name for reuse.
    pub fn drop_database(&self) -> Result<bool, DbError> {
        self.collections.borrow_mut().clear();
        self.registry.borrow_mut().remove(&self.name);
        event::emit(&self.stores, &Event::DropDatabase {
            database: &self.name,
        });
        tracing::debug!(database = %self.name, "drop");
        Ok(true)
    }
}
