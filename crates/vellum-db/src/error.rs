use std::fmt;

use vellum_query::{ProjectionError, SelectorError};

#[derive(Debug)]
pub enum DbError {
    /// Bad names, bad argument types, forbidden paths, mixed update keys.
    Validation(String),
    /// Missing snapshots or rename sources.
    NotFound(String),
    /// Declared surface with no implementation behind it.
    Unsupported(String),
    /// Duplicate database names and duplicate document identifiers.
    Conflict(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Validation(msg) => write!(f, "validation error: {msg}"),
            DbError::NotFound(msg) => write!(f, "not found: {msg}"),
            DbError::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            DbError::Conflict(msg) => write!(f, "conflict: {msg}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<SelectorError> for DbError {
    fn from(e: SelectorError) -> Self {
        match e {
            SelectorError::Invalid(msg) => DbError::Validation(format!("invalid selector: {msg}")),
            SelectorError::Unsupported(msg) => DbError::Unsupported(msg),
        }
    }
}

impl From<ProjectionError> for DbError {
    fn from(e: ProjectionError) -> Self {
        DbError::Validation(e.to_string())
    }
}
