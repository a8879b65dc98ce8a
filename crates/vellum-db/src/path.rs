use bson::{Bson, Document};

use crate::error::DbError;

/// How a path walk treats missing structure and array interior nodes.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PathPolicy {
    /// Do not materialize missing intermediate documents; yield
    /// [`Resolved::Undefined`] instead.
    pub no_create: bool,
    /// Arrays anywhere on the path yield [`Resolved::NullTarget`].
    pub forbid_array: bool,
}

/// The container one level above the addressed value, plus the final
/// segment: a document key or an array index.
#[derive(Debug)]
pub(crate) enum Parent<'a> {
    Doc(&'a mut Document, String),
    Arr(&'a mut Vec<Bson>, usize),
}

impl Parent<'_> {
    pub(crate) fn get(&self) -> Option<&Bson> {
        match self {
            Parent::Doc(doc, key) => doc.get(key.as_str()),
            Parent::Arr(arr, idx) => arr.get(*idx),
        }
    }

    pub(crate) fn get_mut(&mut self) -> Option<&mut Bson> {
        match self {
            Parent::Doc(doc, key) => doc.get_mut(key.as_str()),
            Parent::Arr(arr, idx) => arr.get_mut(*idx),
        }
    }

    pub(crate) fn set(&mut self, value: Bson) {
        match self {
            Parent::Doc(doc, key) => {
                doc.insert(key.clone(), value);
            }
            Parent::Arr(arr, idx) => {
                arr[*idx] = value;
            }
        }
    }

    /// Remove the addressed value: delete the key in a document, null out
    /// the slot in an array. Returns whether anything was there.
    pub(crate) fn clear(&mut self) -> bool {
        match self {
            Parent::Doc(doc, key) => doc.remove(key.as_str()).is_some(),
            Parent::Arr(arr, idx) => match arr.get_mut(*idx) {
                Some(slot) => {
                    *slot = Bson::Null;
                    true
                }
                None => false,
            },
        }
    }

    /// Take the addressed value out, leaving a document key deleted or an
    /// array slot nulled.
    pub(crate) fn take(&mut self) -> Option<Bson> {
        match self {
            Parent::Doc(doc, key) => doc.remove(key.as_str()),
            Parent::Arr(arr, idx) => arr
                .get_mut(*idx)
                .map(|slot| std::mem::replace(slot, Bson::Null)),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Resolved<'a> {
    Found(Parent<'a>),
    /// A missing intermediate under `no_create`; the operation is skipped.
    Undefined,
    /// An array on the path under `forbid_array`; a hard failure.
    NullTarget,
}

/// Resolve a dotted key-path to its parent container, walking every prefix
/// segment and creating intermediate documents on demand.
pub(crate) fn resolve_path<'a>(
    root: &'a mut Document,
    path: &str,
    policy: PathPolicy,
) -> Result<Resolved<'a>, DbError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(DbError::Validation(format!("invalid field path '{path}'")));
    }
    walk_doc(root, &segments, path, policy)
}

fn walk_doc<'a>(
    doc: &'a mut Document,
    segments: &[&str],
    path: &str,
    policy: PathPolicy,
) -> Result<Resolved<'a>, DbError> {
    let Some((&head, rest)) = segments.split_first() else {
        return Err(DbError::Validation(format!("invalid field path '{path}'")));
    };
    if rest.is_empty() {
        return Ok(Resolved::Found(Parent::Doc(doc, head.to_string())));
    }
    if !doc.contains_key(head) {
        if policy.no_create {
            return Ok(Resolved::Undefined);
        }
        doc.insert(head.to_string(), Document::new());
    }
    match doc.get_mut(head) {
        Some(Bson::Document(sub)) => walk_doc(sub, rest, path, policy),
        Some(Bson::Array(items)) => {
            if policy.forbid_array {
                return Ok(Resolved::NullTarget);
            }
            walk_array(items, rest, path, policy)
        }
        Some(_) => Err(DbError::Validation(format!(
            "field path '{path}': '{head}' is not a container"
        ))),
        None => Ok(Resolved::Undefined),
    }
}

fn walk_array<'a>(
    arr: &'a mut Vec<Bson>,
    segments: &[&str],
    path: &str,
    policy: PathPolicy,
) -> Result<Resolved<'a>, DbError> {
    let Some((&head, rest)) = segments.split_first() else {
        return Err(DbError::Validation(format!("invalid field path '{path}'")));
    };
    if !vellum_query::value::is_index_segment(head) {
        return Err(DbError::Validation(
            "cannot append to array using string field name".into(),
        ));
    }
    let idx: usize = head.parse().map_err(|_| {
        DbError::Validation(format!("field path '{path}': index '{head}' is out of range"))
    })?;

    // Pad with nulls so indexing is always legal.
    while arr.len() <= idx {
        arr.push(Bson::Null);
    }

    if rest.is_empty() {
        return Ok(Resolved::Found(Parent::Arr(arr, idx)));
    }
    if matches!(arr[idx], Bson::Null) {
        if policy.no_create {
            return Ok(Resolved::Undefined);
        }
        arr[idx] = Bson::Document(Document::new());
    }
    match &mut arr[idx] {
        Bson::Document(sub) => walk_doc(sub, rest, path, policy),
        Bson::Array(inner) => {
            if policy.forbid_array {
                return Ok(Resolved::NullTarget);
            }
            walk_array(inner, rest, path, policy)
        }
        _ => Err(DbError::Validation(format!(
            "field path '{path}': '{head}' is not a container"
        ))),
    }
}
