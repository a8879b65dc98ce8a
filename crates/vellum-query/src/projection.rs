use std::fmt;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::value;

/// Error raised while compiling a field specification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionError(pub String);

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid field specification: {}", self.0)
    }
}

impl std::error::Error for ProjectionError {}

/// A field specification: which parts of a document a query returns.
///
/// A path list is implicit inclusion; a document maps paths to 0/1 or
/// booleans (inclusion or exclusion, never both, except for `_id`); the
/// empty specification is the identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Fields {
    #[default]
    None,
    Include(Vec<String>),
    Spec(Document),
}

impl Fields {
    /// Document form of the specification, for event payloads.
    pub fn to_document(&self) -> Document {
        match self {
            Fields::None => Document::new(),
            Fields::Include(paths) => {
                let mut doc = Document::new();
                for path in paths {
                    doc.insert(path.clone(), 1);
                }
                doc
            }
            Fields::Spec(doc) => doc.clone(),
        }
    }
}

impl From<()> for Fields {
    fn from(_: ()) -> Self {
        Fields::None
    }
}

impl From<Vec<String>> for Fields {
    fn from(paths: Vec<String>) -> Self {
        Fields::Include(paths)
    }
}

impl From<Vec<&str>> for Fields {
    fn from(paths: Vec<&str>) -> Self {
        Fields::Include(paths.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Fields {
    fn from(paths: &[&str]) -> Self {
        Fields::Include(paths.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Document> for Fields {
    fn from(doc: Document) -> Self {
        Fields::Spec(doc)
    }
}

impl From<&Document> for Fields {
    fn from(doc: &Document) -> Self {
        Fields::Spec(doc.clone())
    }
}

/// A compiled field specification: a pure document shaper.
#[derive(Debug, Clone)]
pub struct Projection {
    mode: Mode,
}

#[derive(Debug, Clone)]
enum Mode {
    Identity,
    Include { paths: Vec<Vec<String>>, id: bool },
    Exclude { paths: Vec<Vec<String>>, id: bool },
}

/// Compile a [`Fields`] specification into a [`Projection`].
pub fn compile_fields(fields: &Fields) -> Result<Projection, ProjectionError> {
    let mode = match fields {
        Fields::None => Mode::Identity,
        Fields::Include(paths) => Mode::Include {
            paths: split_paths(paths.iter().map(String::as_str))?,
            id: true,
        },
        Fields::Spec(spec) if spec.is_empty() => Mode::Identity,
        Fields::Spec(spec) => {
            let mut includes: Vec<&str> = Vec::new();
            let mut excludes: Vec<&str> = Vec::new();
            let mut id = None;
            for (path, flag) in spec.iter() {
                let included = value::to_bool(flag);
                if path == "_id" {
                    id = Some(included);
                } else if included {
                    includes.push(path);
                } else {
                    excludes.push(path);
                }
            }
            if !includes.is_empty() && !excludes.is_empty() {
                return Err(ProjectionError(
                    "cannot mix inclusion and exclusion".into(),
                ));
            }
            if includes.is_empty() && excludes.is_empty() {
                // Only `_id` was specified.
                match id {
                    Some(true) => Mode::Include {
                        paths: Vec::new(),
                        id: true,
                    },
                    _ => Mode::Exclude {
                        paths: Vec::new(),
                        id: false,
                    },
                }
            } else if excludes.is_empty() {
                Mode::Include {
                    paths: split_paths(includes.into_iter())?,
                    id: id.unwrap_or(true),
                }
            } else {
                Mode::Exclude {
                    paths: split_paths(excludes.into_iter())?,
                    // In exclusion mode `_id` survives unless excluded itself.
                    id: id.unwrap_or(true),
                }
            }
        }
    };
    Ok(Projection { mode })
}

fn split_paths<'a>(paths: impl Iterator<Item = &'a str>) -> Result<Vec<Vec<String>>, ProjectionError> {
    let mut out = Vec::new();
    for path in paths {
        let segments: Vec<String> = path.split('.').map(String::from).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ProjectionError(format!("invalid field path '{path}'")));
        }
        out.push(segments);
    }
    Ok(out)
}

impl Projection {
    /// Shape a document according to the compiled specification.
    pub fn apply(&self, doc: &Document) -> Document {
        match &self.mode {
            Mode::Identity => doc.clone(),
            Mode::Include { paths, id } => {
                let mut out = Document::new();
                if *id {
                    if let Some(idv) = doc.get("_id") {
                        out.insert("_id", idv.clone());
                    }
                }
                include_into(doc, paths, &mut out);
                out
            }
            Mode::Exclude { paths, id } => {
                let mut out = doc.clone();
                for path in paths {
                    exclude_from(&mut out, path);
                }
                if !*id {
                    out.remove("_id");
                }
                out
            }
        }
    }
}

/// Copy the selected paths from `src` into `out`, grouped by leading
/// segment so sibling paths share one nested document.
fn include_into(src: &Document, paths: &[Vec<String>], out: &mut Document) {
    let mut groups: Vec<(&str, Vec<&[String]>)> = Vec::new();
    for path in paths {
        let (head, rest) = match path.split_first() {
            Some((head, rest)) => (head.as_str(), rest),
            None => continue,
        };
        if head == "_id" {
            continue;
        }
        match groups.iter_mut().find(|(h, _)| *h == head) {
            Some((_, subs)) => subs.push(rest),
            None => groups.push((head, vec![rest])),
        }
    }

    for (head, subs) in groups {
        let Some(val) = src.get(head) else { continue };
        if subs.iter().any(|s| s.is_empty()) {
            // A whole-subtree path wins over nested siblings.
            out.insert(head.to_string(), val.clone());
            continue;
        }
        let nested: Vec<Vec<String>> = subs.iter().map(|s| s.to_vec()).collect();
        match val {
            Bson::Document(sub) => {
                let mut child = Document::new();
                include_into(sub, &nested, &mut child);
                out.insert(head.to_string(), child);
            }
            Bson::Array(items) => {
                let projected: Vec<Bson> = items
                    .iter()
                    .filter_map(|item| match item {
                        Bson::Document(sub) => {
                            let mut child = Document::new();
                            include_into(sub, &nested, &mut child);
                            Some(Bson::Document(child))
                        }
                        _ => None,
                    })
                    .collect();
                out.insert(head.to_string(), projected);
            }
            _ => {}
        }
    }
}

fn exclude_from(doc: &mut Document, path: &[String]) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        doc.remove(head.as_str());
        return;
    }
    match doc.get_mut(head.as_str()) {
        Some(Bson::Document(sub)) => exclude_from(sub, rest),
        Some(Bson::Array(items)) => {
            for item in items {
                if let Bson::Document(sub) = item {
                    exclude_from(sub, rest);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn project(fields: Fields, doc: Document) -> Document {
        compile_fields(&fields).unwrap().apply(&doc)
    }

    #[test]
    fn empty_spec_is_identity() {
        let doc = doc! { "_id": "1", "a": 1, "b": 2 };
        assert_eq!(project(Fields::None, doc.clone()), doc.clone());
        assert_eq!(project(Fields::Spec(doc! {}), doc.clone()), doc);
    }

    #[test]
    fn path_list_includes() {
        let doc = doc! { "_id": "1", "a": 1, "b": 2 };
        let out = project(Fields::from(vec!["a"]), doc);
        assert_eq!(out, doc! { "_id": "1", "a": 1 });
    }

    #[test]
    fn inclusion_spec_keeps_id_by_default() {
        let doc = doc! { "_id": "1", "a": 1, "b": 2 };
        let out = project(Fields::Spec(doc! { "b": 1 }), doc);
        assert_eq!(out, doc! { "_id": "1", "b": 2 });
    }

    #[test]
    fn inclusion_spec_can_drop_id() {
        let doc = doc! { "_id": "1", "a": 1, "b": 2 };
        let out = project(Fields::Spec(doc! { "a": 1, "_id": 0 }), doc);
        assert_eq!(out, doc! { "a": 1 });
    }

    #[test]
    fn exclusion_spec() {
        let doc = doc! { "_id": "1", "a": 1, "b": 2 };
        let out = project(Fields::Spec(doc! { "a": 0 }), doc);
        assert_eq!(out, doc! { "_id": "1", "b": 2 });
    }

    #[test]
    fn exclusion_of_only_id() {
        let doc = doc! { "_id": "1", "a": 1 };
        let out = project(Fields::Spec(doc! { "_id": 0 }), doc);
        assert_eq!(out, doc! { "a": 1 });
    }

    #[test]
    fn inclusion_of_only_id() {
        let doc = doc! { "_id": "1", "a": 1 };
        let out = project(Fields::Spec(doc! { "_id": 1 }), doc);
        assert_eq!(out, doc! { "_id": "1" });
    }

    #[test]
    fn mixed_spec_errors() {
        let err = compile_fields(&Fields::Spec(doc! { "a": 1, "b": 0 })).unwrap_err();
        assert!(err.0.contains("mix"));
    }

    #[test]
    fn boolean_flags_work() {
        let doc = doc! { "_id": "1", "a": 1, "b": 2 };
        let out = project(Fields::Spec(doc! { "a": true }), doc);
        assert_eq!(out, doc! { "_id": "1", "a": 1 });
    }

    #[test]
    fn nested_inclusion_through_documents() {
        let doc = doc! { "_id": "1", "address": { "city": "Austin", "zip": "78701" } };
        let out = project(Fields::Spec(doc! { "address.city": 1 }), doc);
        assert_eq!(out, doc! { "_id": "1", "address": { "city": "Austin" } });
    }

    #[test]
    fn nested_inclusion_through_arrays() {
        let doc = doc! {
            "_id": "1",
            "items": [{ "sku": "a", "qty": 1 }, { "sku": "b", "qty": 2 }]
        };
        let out = project(Fields::Spec(doc! { "items.sku": 1 }), doc);
        assert_eq!(
            out,
            doc! { "_id": "1", "items": [{ "sku": "a" }, { "sku": "b" }] }
        );
    }

    #[test]
    fn nested_exclusion_through_arrays() {
        let doc = doc! {
            "_id": "1",
            "items": [{ "sku": "a", "qty": 1 }, { "sku": "b", "qty": 2 }]
        };
        let out = project(Fields::Spec(doc! { "items.qty": 0 }), doc);
        assert_eq!(
            out,
            doc! { "_id": "1", "items": [{ "sku": "a" }, { "sku": "b" }] }
        );
    }

    #[test]
    fn whole_subtree_wins_over_nested_sibling() {
        let doc = doc! { "_id": "1", "a": { "b": 1, "c": 2 } };
        let out = project(Fields::from(vec!["a", "a.b"]), doc);
        assert_eq!(out, doc! { "_id": "1", "a": { "b": 1, "c": 2 } });
    }
}
