use std::cmp::Ordering;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Sort {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Sort {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// An ordered list of sort keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortSpec(pub Vec<Sort>);

impl SortSpec {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare two documents under this specification.
    ///
    /// Missing and null fields sort first. Returns `Equal` when every key
    /// ties, leaving tie-break order to the (stable) caller.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for sort in &self.0 {
            let a_field = value::get_path(a, &sort.field);
            let b_field = value::get_path(b, &sort.field);
            let ord = compare_fields(a_field, b_field);
            let ord = match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn compare_fields(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(Bson::Null), None) | (None, Some(Bson::Null)) => Ordering::Equal,
        (Some(Bson::Null), Some(Bson::Null)) => Ordering::Equal,
        (None, Some(_)) | (Some(Bson::Null), Some(_)) => Ordering::Less,
        (Some(_), None) | (Some(_), Some(Bson::Null)) => Ordering::Greater,
        (Some(a), Some(b)) => value::compare(a, b),
    }
}

impl From<Sort> for SortSpec {
    fn from(sort: Sort) -> Self {
        SortSpec(vec![sort])
    }
}

impl From<Vec<Sort>> for SortSpec {
    fn from(sorts: Vec<Sort>) -> Self {
        SortSpec(sorts)
    }
}

impl From<&str> for SortSpec {
    fn from(field: &str) -> Self {
        match field.strip_prefix('-') {
            Some(rest) => SortSpec(vec![Sort::desc(rest)]),
            None => SortSpec(vec![Sort::asc(field)]),
        }
    }
}

impl From<(&str, i32)> for SortSpec {
    fn from((field, direction): (&str, i32)) -> Self {
        if direction < 0 {
            SortSpec(vec![Sort::desc(field)])
        } else {
            SortSpec(vec![Sort::asc(field)])
        }
    }
}

impl From<Document> for SortSpec {
    fn from(doc: Document) -> Self {
        SortSpec::from(&doc)
    }
}

impl From<&Document> for SortSpec {
    fn from(doc: &Document) -> Self {
        let sorts = doc
            .iter()
            .map(|(field, dir)| {
                let descending = match dir {
                    Bson::Boolean(b) => !b,
                    other => value::as_i64(other).map(|n| n < 0).unwrap_or(false),
                };
                if descending {
                    Sort::desc(field.as_str())
                } else {
                    Sort::asc(field.as_str())
                }
            })
            .collect();
        SortSpec(sorts)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn from_str_parses_direction() {
        assert_eq!(SortSpec::from("name").0, vec![Sort::asc("name")]);
        assert_eq!(SortSpec::from("-name").0, vec![Sort::desc("name")]);
    }

    #[test]
    fn from_document_parses_directions() {
        let spec = SortSpec::from(doc! { "a": 1, "b": -1 });
        assert_eq!(spec.0, vec![Sort::asc("a"), Sort::desc("b")]);
    }

    #[test]
    fn compare_single_key() {
        let spec = SortSpec::from("n");
        let a = doc! { "n": 1 };
        let b = doc! { "n": 2 };
        assert_eq!(spec.compare(&a, &b), Ordering::Less);
        assert_eq!(spec.compare(&b, &a), Ordering::Greater);
        assert_eq!(spec.compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn descending_reverses() {
        let spec = SortSpec::from("-n");
        let a = doc! { "n": 1 };
        let b = doc! { "n": 2 };
        assert_eq!(spec.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn missing_fields_sort_first() {
        let spec = SortSpec::from("n");
        let missing = doc! {};
        let present = doc! { "n": 0 };
        assert_eq!(spec.compare(&missing, &present), Ordering::Less);
    }

    #[test]
    fn second_key_breaks_ties() {
        let spec = SortSpec::from(doc! { "a": 1, "b": -1 });
        let x = doc! { "a": 1, "b": 1 };
        let y = doc! { "a": 1, "b": 2 };
        assert_eq!(spec.compare(&x, &y), Ordering::Greater);
    }
}
