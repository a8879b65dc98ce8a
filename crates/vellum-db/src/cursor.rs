use std::cell::RefCell;
use std::rc::Rc;

use bson::Document;
use vellum_query::{Matcher, Projection, SortSpec};

use crate::collection::CollectionState;
use crate::error::DbError;
use crate::options::FindOptions;

/// A lazy, restartable iterator over the documents matching a compiled
/// selector.
///
/// On first consumption the cursor captures the position list of matching
/// identifiers (stably sorted when a sort is configured, then windowed by
/// skip and limit). Identifiers re-resolve to documents at yield time, so
/// documents inserted after iteration began are never observed and
/// documents removed in the meantime are silently skipped.
#[derive(Debug)]
pub struct Cursor {
    state: Rc<RefCell<CollectionState>>,
    matcher: Matcher,
    projection: Projection,
    skip: usize,
    limit: i64,
    sort: SortSpec,
    selection: Option<Vec<String>>,
    pos: usize,
    consumed: bool,
}

impl Cursor {
    pub(crate) fn new(
        state: Rc<RefCell<CollectionState>>,
        matcher: Matcher,
        projection: Projection,
        options: &FindOptions,
    ) -> Cursor {
        Cursor {
            state,
            matcher,
            projection,
            skip: options.skip,
            limit: options.limit,
            sort: SortSpec::default(),
            selection: None,
            pos: 0,
            consumed: false,
        }
    }

    /// Eagerly capture the position list, locking further configuration.
    pub(crate) fn prefetch(&mut self) {
        self.consumed = true;
        self.materialize();
    }

    fn materialize(&mut self) {
        if self.selection.is_some() {
            return;
        }
        let state = self.state.borrow();
        let mut hits: Vec<usize> = Vec::new();
        for (idx, doc) in state.docs.iter().enumerate() {
            if self.matcher.matches(doc) {
                hits.push(idx);
            }
        }
        if !self.sort.is_empty() {
            // Stable sort over insertion-ordered hits keeps insertion order
            // as the tie-break.
            hits.sort_by(|&a, &b| self.sort.compare(&state.docs[a], &state.docs[b]));
        }
        let window = hits
            .into_iter()
            .skip(self.skip)
            .take(if self.limit > 0 {
                self.limit as usize
            } else {
                usize::MAX
            });
        let ids: Vec<String> = window
            .filter_map(|idx| state.docs[idx].get_str("_id").ok().map(String::from))
            .collect();
        drop(state);
        self.selection = Some(ids);
    }

    /// Advance past removed documents to the next yieldable position,
    /// without consuming it.
    pub fn has_next(&mut self) -> bool {
        self.materialize();
        let next_live = {
            let Some(selection) = self.selection.as_ref() else {
                return false;
            };
            let state = self.state.borrow();
            let mut pos = self.pos;
            loop {
                match selection.get(pos) {
                    None => break None,
                    Some(id) if state.index_by_id.contains_key(id) => break Some(pos),
                    Some(_) => pos += 1,
                }
            }
        };
        match next_live {
            Some(pos) => {
                self.pos = pos;
                true
            }
            None => {
                self.pos = self.selection.as_ref().map_or(0, Vec::len);
                false
            }
        }
    }

    /// Consume and return the next matching document, projected.
    pub fn next(&mut self) -> Option<Document> {
        self.consumed = true;
        self.materialize();
        loop {
            let id = {
                let selection = self.selection.as_ref()?;
                selection.get(self.pos)?.clone()
            };
            self.pos += 1;
            let state = self.state.borrow();
            if let Some(&idx) = state.index_by_id.get(&id) {
                return Some(self.projection.apply(&state.docs[idx]));
            }
        }
    }

    /// Materialize every remaining document.
    pub fn fetch(&mut self) -> Vec<Document> {
        let mut out = Vec::new();
        while let Some(doc) = self.next() {
            out.push(doc);
        }
        out
    }

    /// Apply `f` to every remaining document in iteration order.
    pub fn for_each<F: FnMut(&Document)>(&mut self, mut f: F) {
        while let Some(doc) = self.next() {
            f(&doc);
        }
    }

    /// Number of matches, ignoring skip and limit.
    pub fn count(&self) -> usize {
        let state = self.state.borrow();
        state
            .docs
            .iter()
            .filter(|doc| self.matcher.matches(doc))
            .count()
    }

    /// Number of matches, respecting skip and limit.
    pub fn size(&self) -> usize {
        let after_skip = self.count().saturating_sub(self.skip);
        if self.limit > 0 {
            after_skip.min(self.limit as usize)
        } else {
            after_skip
        }
    }

    /// Configure the sort order. Valid only before iteration begins.
    pub fn sort(&mut self, spec: impl Into<SortSpec>) -> Result<&mut Cursor, DbError> {
        self.ensure_configurable("sort")?;
        self.sort = spec.into();
        self.invalidate();
        Ok(self)
    }

    /// Configure the skip count. Valid only before iteration begins.
    pub fn skip(&mut self, n: usize) -> Result<&mut Cursor, DbError> {
        self.ensure_configurable("skip")?;
        self.skip = n;
        self.invalidate();
        Ok(self)
    }

    /// Configure the yield cap; zero or negative disables it. Valid only
    /// before iteration begins.
    pub fn limit(&mut self, n: i64) -> Result<&mut Cursor, DbError> {
        self.ensure_configurable("limit")?;
        self.limit = n;
        self.invalidate();
        Ok(self)
    }

    /// Restart iteration over the captured positions.
    pub fn rewind(&mut self) -> &mut Cursor {
        self.pos = 0;
        self
    }

    fn invalidate(&mut self) {
        self.selection = None;
        self.pos = 0;
    }

    fn ensure_configurable(&self, what: &str) -> Result<(), DbError> {
        if self.consumed {
            Err(DbError::Validation(format!(
                "cannot {what} a cursor after iteration has begun"
            )))
        } else {
            Ok(())
        }
    }
}

impl Iterator for Cursor {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        Cursor::next(self)
    }
}
