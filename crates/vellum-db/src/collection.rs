use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use bson::oid::ObjectId;
use bson::{Bson, Document};
use vellum_query::{Fields, Selector, compile_fields, id};

use crate::cursor::Cursor;
use crate::error::DbError;
use crate::event::{self, Event, StoreBus};
use crate::options::{FindOptions, RemoveOptions, UpdateOptions};
use crate::result::UpdateResult;
use crate::update::{self, ParsedUpdate};
use crate::validate;

#[derive(Debug)]
pub(crate) struct CollectionState {
    pub(crate) db_name: String,
    pub(crate) name: String,
    pub(crate) full_name: String,
    /// The authoritative store; iteration order is insertion order.
    pub(crate) docs: Vec<Document>,
    /// Identifier to position in `docs`.
    pub(crate) index_by_id: HashMap<String, usize>,
    /// Deep copies of `docs`, addressable by snapshot id.
    pub(crate) snapshots: HashMap<String, Vec<Document>>,
}

/// A named, schemaless set of documents.
///
/// Handles are cheap clones sharing one underlying state; all operations
/// run to completion before returning, and every committed mutation is
/// multicast to the owning database's observer stores.
#[derive(Clone)]
pub struct Collection {
    pub(crate) state: Rc<RefCell<CollectionState>>,
    stores: StoreBus,
    siblings: Weak<RefCell<HashMap<String, Collection>>>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("full_name", &self.state.borrow().full_name)
            .finish()
    }
}

impl Collection {
    pub(crate) fn new(
        db_name: &str,
        name: &str,
        stores: StoreBus,
        siblings: Weak<RefCell<HashMap<String, Collection>>>,
    ) -> Result<Collection, DbError> {
        validate::collection_name(name)?;
        Ok(Collection {
            state: Rc::new(RefCell::new(CollectionState {
                db_name: db_name.to_string(),
                name: name.to_string(),
                full_name: format!("{db_name}.{name}"),
                docs: Vec::new(),
                index_by_id: HashMap::new(),
                snapshots: HashMap::new(),
            })),
            stores,
            siblings,
        })
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn full_name(&self) -> String {
        self.state.borrow().full_name.clone()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.state.borrow().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().docs.is_empty()
    }

    // ── Insert ──────────────────────────────────────────────────

    /// Insert a document.
    ///
    /// The stored copy gets a normalized string `_id` (a fresh identifier
    /// when none usable is supplied) and a `timestamp` field holding the
    /// identifier's generation instant in epoch seconds. Returns the
    /// stored copy.
    pub fn insert(&self, doc: Document) -> Result<Document, DbError> {
        let stored = self.prepare_insert(&doc)?;
        let name = {
            let mut state = self.state.borrow_mut();
            let pos = state.docs.len();
            let idv = stored.get_str("_id").unwrap_or_default().to_string();
            state.index_by_id.insert(idv, pos);
            state.docs.push(stored.clone());
            state.name.clone()
        };
        tracing::debug!(collection = %name, "insert");
        event::emit(&self.stores, &Event::Insert {
            collection: &name,
            doc: &stored,
        });
        Ok(stored)
    }

    /// Insert several documents. The batch is validated as a whole before
    /// anything is stored; a bad document leaves the collection unchanged.
    pub fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<Document>, DbError> {
        let mut prepared = Vec::with_capacity(docs.len());
        {
            let state = self.state.borrow();
            let mut batch_ids: Vec<String> = Vec::with_capacity(docs.len());
            for doc in &docs {
                let stored = self.prepare_insert_in(&state, doc)?;
                let idv = stored.get_str("_id").unwrap_or_default().to_string();
                if batch_ids.contains(&idv) {
                    return Err(DbError::Conflict(format!(
                        "duplicate _id '{idv}' in collection '{}'",
                        state.name
                    )));
                }
                batch_ids.push(idv);
                prepared.push(stored);
            }
        }
        let name = {
            let mut state = self.state.borrow_mut();
            for stored in &prepared {
                let pos = state.docs.len();
                let idv = stored.get_str("_id").unwrap_or_default().to_string();
                state.index_by_id.insert(idv, pos);
                state.docs.push(stored.clone());
            }
            state.name.clone()
        };
        for stored in &prepared {
            event::emit(&self.stores, &Event::Insert {
                collection: &name,
                doc: stored,
            });
        }
        Ok(prepared)
    }

    fn prepare_insert(&self, doc: &Document) -> Result<Document, DbError> {
        let state = self.state.borrow();
        self.prepare_insert_in(&state, doc)
    }

    fn prepare_insert_in(
        &self,
        state: &CollectionState,
        doc: &Document,
    ) -> Result<Document, DbError> {
        validate::document_fields(doc)?;
        let oid = ObjectId::new();
        let idv = id::normalize_id(doc.get("_id"), &oid);
        if state.index_by_id.contains_key(&idv) {
            return Err(DbError::Conflict(format!(
                "duplicate _id '{idv}' in collection '{}'",
                state.name
            )));
        }
        let mut stored = Document::new();
        stored.insert("_id", idv);
        for (key, val) in doc.iter() {
            if key != "_id" {
                stored.insert(key.clone(), val.clone());
            }
        }
        stored.insert("timestamp", Bson::Int64(id::generation_time(&oid)));
        Ok(stored)
    }

    // ── Find ────────────────────────────────────────────────────

    /// Compile the selector and projection and return a cursor over the
    /// matching documents.
    pub fn find<S, F>(&self, selector: S, fields: F, options: FindOptions) -> Result<Cursor, DbError>
    where
        S: Into<Selector>,
        F: Into<Fields>,
    {
        let selector = selector.into();
        let fields = match &options.fields {
            Some(overriding) => overriding.clone(),
            None => fields.into(),
        };
        let matcher = selector.compile()?;
        let projection = compile_fields(&fields)?;
        let mut cursor = Cursor::new(Rc::clone(&self.state), matcher, projection, &options);
        if options.force_fetch {
            cursor.prefetch();
        }
        let name = self.name();
        event::emit(&self.stores, &Event::Find {
            collection: &name,
            selector: &selector.to_document(),
            fields: &fields.to_document(),
        });
        Ok(cursor)
    }

    /// First matching document, or `None`.
    pub fn find_one<S, F>(
        &self,
        selector: S,
        fields: F,
        options: FindOptions,
    ) -> Result<Option<Document>, DbError>
    where
        S: Into<Selector>,
        F: Into<Fields>,
    {
        let selector = selector.into();
        let fields = match &options.fields {
            Some(overriding) => overriding.clone(),
            None => fields.into(),
        };
        let matcher = selector.compile()?;
        let projection = compile_fields(&fields)?;
        let mut cursor = Cursor::new(Rc::clone(&self.state), matcher, projection, &options);
        let found = cursor.next();
        let name = self.name();
        event::emit(&self.stores, &Event::FindOne {
            collection: &name,
            selector: &selector.to_document(),
            fields: &fields.to_document(),
        });
        Ok(found)
    }

    /// Number of documents matching the selector.
    pub fn count<S: Into<Selector>>(&self, selector: S) -> Result<usize, DbError> {
        let matcher = selector.into().compile()?;
        let state = self.state.borrow();
        Ok(state.docs.iter().filter(|d| matcher.matches(d)).count())
    }

    // ── Update ──────────────────────────────────────────────────

    /// Update the first match (every match with `multi`), either by a
    /// sequence of `$`-modifiers or by whole-document replacement.
    ///
    /// Replacement documents keep the stored `_id` and may target only a
    /// single document. With `upsert`, an empty target set inserts the
    /// update document instead. Every new document is built before any is
    /// committed, so a failed clause leaves the collection unchanged.
    pub fn update<S: Into<Selector>>(
        &self,
        selector: S,
        update_doc: &Document,
        options: UpdateOptions,
    ) -> Result<UpdateResult, DbError> {
        let selector = selector.into();
        let matcher = selector.compile()?;
        let mut result = UpdateResult::default();

        let targets: Vec<String> = {
            let state = self.state.borrow();
            let mut ids = Vec::new();
            let mut skipped = 0;
            for doc in &state.docs {
                if !matcher.matches(doc) {
                    continue;
                }
                if skipped < options.skip {
                    skipped += 1;
                    continue;
                }
                if let Ok(idv) = doc.get_str("_id") {
                    ids.push(idv.to_string());
                }
                if !options.multi {
                    break;
                }
                if options.limit > 0 && ids.len() as i64 >= options.limit {
                    break;
                }
            }
            ids
        };

        if targets.is_empty() {
            if options.upsert {
                let doc = update::upsert_document(update_doc, options.update_as_mongo)?;
                let inserted = self.insert(doc)?;
                result.inserted.push(inserted);
            }
        } else {
            let replacements: Vec<(String, Document)> = {
                let state = self.state.borrow();
                let parsed = if options.update_as_mongo {
                    Some(update::parse_update(update_doc)?)
                } else {
                    None
                };
                if let Some(ParsedUpdate::Replacement(_)) = &parsed {
                    if targets.len() > 1 {
                        return Err(DbError::Validation(
                            "cannot update several documents when no update operators are included"
                                .into(),
                        ));
                    }
                }
                let mut out = Vec::with_capacity(targets.len());
                for target in &targets {
                    let Some(&idx) = state.index_by_id.get(target) else {
                        continue;
                    };
                    let stored = &state.docs[idx];
                    let new_doc = match &parsed {
                        Some(ParsedUpdate::Replacement(replacement)) => {
                            update::build_replacement(stored, replacement)?
                        }
                        Some(ParsedUpdate::Modifiers(clauses)) => {
                            let applied = update::apply_modifiers(stored, clauses)?;
                            validate::document_fields(&applied)?;
                            applied
                        }
                        None => update::apply_lenient(
                            stored,
                            update_doc,
                            options.override_document,
                        )?,
                    };
                    out.push((target.clone(), new_doc));
                }
                out
            };

            {
                let mut state = self.state.borrow_mut();
                for (target, new_doc) in &replacements {
                    if let Some(&idx) = state.index_by_id.get(target) {
                        state.docs[idx] = new_doc.clone();
                    }
                }
            }
            result.updated = replacements.into_iter().map(|(_, doc)| doc).collect();
        }

        let name = self.name();
        tracing::debug!(
            collection = %name,
            updated = result.updated.len(),
            inserted = result.inserted.len(),
            "update"
        );
        event::emit(&self.stores, &Event::Update {
            collection: &name,
            selector: &selector.to_document(),
            modifier: update_doc,
            docs: &result.updated,
        });
        Ok(result)
    }

    /// Insert the document, or replace the stored document carrying the
    /// same `_id` if one exists.
    pub fn save(&self, doc: Document) -> Result<Document, DbError> {
        let existing = doc.get("_id").and_then(|idv| match idv {
            Bson::String(s) if !s.is_empty() => Some(s.clone()),
            Bson::ObjectId(oid) => Some(oid.to_hex()),
            _ => None,
        });
        if let Some(idv) = existing {
            if self.state.borrow().index_by_id.contains_key(&idv) {
                let mut result = self.update(idv, &doc, UpdateOptions::default())?;
                return Ok(result.updated.pop().unwrap_or(doc));
            }
        }
        self.insert(doc)
    }

    // ── Remove ──────────────────────────────────────────────────

    /// Remove every matching document (or the first with `just_one`) and
    /// return the removed documents in insertion order.
    pub fn remove<S: Into<Selector>>(
        &self,
        selector: S,
        options: RemoveOptions,
    ) -> Result<Vec<Document>, DbError> {
        let selector = selector.into();
        let matcher = selector.compile()?;
        let removed: Vec<Document> = {
            let mut state = self.state.borrow_mut();
            let mut ids: Vec<String> = state
                .docs
                .iter()
                .filter(|doc| matcher.matches(doc))
                .filter_map(|doc| doc.get_str("_id").ok().map(String::from))
                .collect();
            if options.just_one {
                ids.truncate(1);
            }
            let mut removed = Vec::with_capacity(ids.len());
            for idv in ids {
                let Some(idx) = state.index_by_id.remove(&idv) else {
                    continue;
                };
                removed.push(state.docs.remove(idx));
                // Splice shifted every later position down by one.
                for pos in state.index_by_id.values_mut() {
                    if *pos > idx {
                        *pos -= 1;
                    }
                }
            }
            removed
        };
        let name = self.name();
        tracing::debug!(collection = %name, removed = removed.len(), "remove");
        event::emit(&self.stores, &Event::Remove {
            collection: &name,
            selector: &selector.to_document(),
            docs: &removed,
        });
        Ok(removed)
    }

    // ── Rename ──────────────────────────────────────────────────

    /// Rename the collection, keeping its contents and handle identity.
    pub fn rename(&self, new_name: &str) -> Result<&Collection, DbError> {
        validate::collection_name(new_name)?;
        let (old_name, db_name) = {
            let state = self.state.borrow();
            (state.name.clone(), state.db_name.clone())
        };
        if old_name == new_name {
            return Ok(self);
        }
        if let Some(siblings) = self.siblings.upgrade() {
            let mut siblings = siblings.borrow_mut();
            if siblings.contains_key(new_name) {
                return Err(DbError::Conflict(format!(
                    "collection '{new_name}' already exists"
                )));
            }
            if let Some(handle) = siblings.remove(&old_name) {
                siblings.insert(new_name.to_string(), handle);
            }
        }
        {
            let mut state = self.state.borrow_mut();
            state.name = new_name.to_string();
            state.full_name = format!("{db_name}.{new_name}");
        }
        event::emit(&self.stores, &Event::RenameCollection {
            from: &old_name,
            to: new_name,
        });
        Ok(self)
    }

    // ── Snapshots ───────────────────────────────────────────────

    /// Capture a deep copy of the current documents under `id` (or a
    /// generated id) and return the snapshot id.
    pub fn backup(&self, id: Option<&str>) -> Result<String, DbError> {
        let snapshot_id = match id {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => ObjectId::new().to_hex(),
        };
        let name = {
            let mut state = self.state.borrow_mut();
            let copy = state.docs.clone();
            state.snapshots.insert(snapshot_id.clone(), copy);
            state.name.clone()
        };
        event::emit(&self.stores, &Event::Snapshot {
            collection: &name,
            id: &snapshot_id,
        });
        Ok(snapshot_id)
    }

    /// Replace the documents with a stored snapshot. Without an id, the
    /// single stored snapshot is used; several stored snapshots require an
    /// explicit id.
    pub fn restore(&self, id: Option<&str>) -> Result<(), DbError> {
        let (chosen, name) = {
            let state = self.state.borrow();
            if state.snapshots.is_empty() {
                return Err(DbError::NotFound(format!(
                    "no snapshots for collection '{}'",
                    state.name
                )));
            }
            let chosen = match id {
                Some(s) => {
                    if !state.snapshots.contains_key(s) {
                        return Err(DbError::NotFound(format!("unknown snapshot id '{s}'")));
                    }
                    s.to_string()
                }
                None => {
                    if state.snapshots.len() > 1 {
                        return Err(DbError::Validation(
                            "snapshot id required when more than one snapshot exists".into(),
                        ));
                    }
                    match state.snapshots.keys().next() {
                        Some(key) => key.clone(),
                        None => {
                            return Err(DbError::NotFound(format!(
                                "no snapshots for collection '{}'",
                                state.name
                            )));
                        }
                    }
                }
            };
            (chosen, state.name.clone())
        };
        {
            let mut state = self.state.borrow_mut();
            if let Some(snapshot) = state.snapshots.get(&chosen).cloned() {
                state.index_by_id = snapshot
                    .iter()
                    .enumerate()
                    .filter_map(|(pos, doc)| {
                        doc.get_str("_id").ok().map(|s| (s.to_string(), pos))
                    })
                    .collect();
                state.docs = snapshot;
            }
        }
        event::emit(&self.stores, &Event::Restore {
            collection: &name,
            id: &chosen,
        });
        Ok(())
    }

    /// Ids of the stored snapshots, sorted.
    pub fn snapshot_ids(&self) -> Vec<String> {
        let state = self.state.borrow();
        let mut ids: Vec<String> = state.snapshots.keys().cloned().collect();
        ids.sort();
        ids
    }

    // ── Indexes (declared, unimplemented) ───────────────────────

    pub fn ensure_index(&self, _keys: &Document) -> Result<(), DbError> {
        Err(DbError::Unsupported("index operations are not implemented".into()))
    }

    pub fn drop_index(&self, _name: &str) -> Result<(), DbError> {
        Err(DbError::Unsupported("index operations are not implemented".into()))
    }

    pub fn reindex(&self) -> Result<(), DbError> {
        Err(DbError::Unsupported("index operations are not implemented".into()))
    }
}
