use bson::{Bson, Document};

use crate::error::DbError;

/// Collection names with a `$` that are nevertheless legal.
const RESERVED_COLLECTION_NAMES: [&str; 2] = ["$cmd", "oplog.$main"];

/// Validate a collection name.
///
/// Non-empty, no `..`, no `$` (outside the reserved pseudo-namespaces),
/// neither starting nor ending with `.`.
pub(crate) fn collection_name(name: &str) -> Result<(), DbError> {
    if name.is_empty() {
        return Err(DbError::Validation("collection name must not be empty".into()));
    }
    if name.contains("..") {
        return Err(DbError::Validation(format!(
            "collection name '{name}' must not contain '..'"
        )));
    }
    if name.contains('$') && !RESERVED_COLLECTION_NAMES.contains(&name) {
        return Err(DbError::Validation(format!(
            "collection name '{name}' must not contain '$'"
        )));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(DbError::Validation(format!(
            "collection name '{name}' must not start or end with '.'"
        )));
    }
    Ok(())
}

/// Validate a database name: non-empty, no space, `.`, `$`, `/` or `\`.
pub(crate) fn database_name(name: &str) -> Result<(), DbError> {
    if name.is_empty() {
        return Err(DbError::Validation("database name must not be empty".into()));
    }
    if let Some(bad) = name.chars().find(|c| matches!(c, ' ' | '.' | '$' | '/' | '\\')) {
        return Err(DbError::Validation(format!(
            "database name '{name}' must not contain '{bad}'"
        )));
    }
    Ok(())
}

/// Validate every field name in a document, recursively.
///
/// Stored field names are non-empty, never start with `$` and never
/// contain `.`; those characters belong to the query and update language.
pub(crate) fn document_fields(doc: &Document) -> Result<(), DbError> {
    for (key, val) in doc.iter() {
        if key.is_empty() {
            return Err(DbError::Validation("field names must not be empty".into()));
        }
        if key.starts_with('$') {
            return Err(DbError::Validation(format!(
                "field name '{key}' must not start with '$'"
            )));
        }
        if key.contains('.') {
            return Err(DbError::Validation(format!(
                "field name '{key}' must not contain '.'"
            )));
        }
        value_fields(val)?;
    }
    Ok(())
}

fn value_fields(val: &Bson) -> Result<(), DbError> {
    match val {
        Bson::Document(sub) => document_fields(sub),
        Bson::Array(items) => {
            for item in items {
                value_fields(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
