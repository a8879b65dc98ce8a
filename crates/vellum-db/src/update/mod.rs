mod ops;

use bson::{Bson, Document};

use crate::error::DbError;
use crate::path::{self, PathPolicy, Resolved};
use crate::validate;

/// A single field-level update modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Modifier {
    /// Numeric addition; creates the field when absent.
    Inc,
    /// Deep-copy assignment.
    Set,
    /// Delete a document key or null out an array slot.
    Unset,
    /// Append to an array field; creates a singleton array when absent.
    Push,
    /// Append every element of an array argument.
    PushAll,
    /// Append unless a deep-equal element is already present.
    AddToSet,
    /// Remove the last (or, for a negative argument, first) element.
    Pop,
    /// Remove every element equal to the argument or matching it as a
    /// per-element selector.
    Pull,
    /// Remove every element equal to any listed value.
    PullAll,
    /// Move a value to a new key-path.
    Rename,
}

impl Modifier {
    fn from_key(key: &str) -> Result<Modifier, DbError> {
        match key {
            "$inc" => Ok(Modifier::Inc),
            "$set" => Ok(Modifier::Set),
            "$unset" => Ok(Modifier::Unset),
            "$push" => Ok(Modifier::Push),
            "$pushAll" => Ok(Modifier::PushAll),
            "$addToSet" => Ok(Modifier::AddToSet),
            "$pop" => Ok(Modifier::Pop),
            "$pull" => Ok(Modifier::Pull),
            "$pullAll" => Ok(Modifier::PullAll),
            "$rename" => Ok(Modifier::Rename),
            "$bit" => Err(DbError::Unsupported("$bit is not supported".into())),
            other => Err(DbError::Validation(format!(
                "unknown update modifier: {other}"
            ))),
        }
    }

    /// Modifiers that never materialize missing intermediate structure.
    fn no_create(self) -> bool {
        matches!(
            self,
            Modifier::Unset
                | Modifier::Pop
                | Modifier::Rename
                | Modifier::Pull
                | Modifier::PullAll
        )
    }
}

/// One field + modifier pair, in declared order.
#[derive(Debug, Clone)]
pub(crate) struct ModifierClause {
    pub modifier: Modifier,
    pub field: String,
    pub arg: Bson,
}

/// A classified strict-mode update document.
#[derive(Debug, Clone)]
pub(crate) enum ParsedUpdate {
    Modifiers(Vec<ModifierClause>),
    Replacement(Document),
}

/// Classify an update document: all-`$` keys are modifier clauses, no-`$`
/// keys a whole-document replacement, and a mixture an error.
pub(crate) fn parse_update(update: &Document) -> Result<ParsedUpdate, DbError> {
    let has_modifier = update.keys().any(|k| k.starts_with('$'));
    let has_literal = update.keys().any(|k| !k.starts_with('$'));
    if has_modifier && has_literal {
        return Err(DbError::Validation(
            "cannot mix update operators and literal fields in one update document".into(),
        ));
    }
    if !has_modifier {
        return Ok(ParsedUpdate::Replacement(update.clone()));
    }

    let mut clauses = Vec::new();
    for (key, val) in update.iter() {
        let modifier = Modifier::from_key(key)?;
        let fields = match val {
            Bson::Document(fields) => fields,
            _ => {
                return Err(DbError::Validation(format!(
                    "{key} requires a document of field paths"
                )));
            }
        };
        for (field, arg) in fields.iter() {
            if field == "_id" || field.starts_with("_id.") {
                return Err(DbError::Validation("_id cannot be modified".into()));
            }
            if modifier == Modifier::Inc && !matches!(arg, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
                return Err(DbError::Validation(format!(
                    "$inc value for '{field}' must be numeric"
                )));
            }
            clauses.push(ModifierClause {
                modifier,
                field: field.clone(),
                arg: arg.clone(),
            });
        }
    }
    Ok(ParsedUpdate::Modifiers(clauses))
}

/// Apply modifier clauses to a working copy of `stored`.
///
/// The stored document is never touched; a failed clause discards the
/// copy, so callers commit only complete results.
pub(crate) fn apply_modifiers(
    stored: &Document,
    clauses: &[ModifierClause],
) -> Result<Document, DbError> {
    let mut working = stored.clone();
    for clause in clauses {
        apply_clause(&mut working, clause)?;
    }
    Ok(working)
}

fn apply_clause(doc: &mut Document, clause: &ModifierClause) -> Result<(), DbError> {
    if clause.modifier == Modifier::Rename {
        return ops::op_rename(doc, &clause.field, &clause.arg);
    }
    let policy = PathPolicy {
        no_create: clause.modifier.no_create(),
        forbid_array: false,
    };
    let mut parent = match path::resolve_path(doc, &clause.field, policy)? {
        Resolved::Found(parent) => parent,
        Resolved::Undefined => return Ok(()),
        Resolved::NullTarget => {
            return Err(DbError::Validation(format!(
                "cannot resolve field path '{}'",
                clause.field
            )));
        }
    };
    match clause.modifier {
        Modifier::Inc => ops::op_inc(&mut parent, &clause.field, &clause.arg),
        Modifier::Set => ops::op_set(&mut parent, &clause.arg),
        Modifier::Unset => ops::op_unset(&mut parent),
        Modifier::Push => ops::op_push(&mut parent, &clause.field, &clause.arg),
        Modifier::PushAll => ops::op_push_all(&mut parent, &clause.field, &clause.arg),
        Modifier::AddToSet => ops::op_add_to_set(&mut parent, &clause.field, &clause.arg),
        Modifier::Pop => ops::op_pop(&mut parent, &clause.field, &clause.arg),
        Modifier::Pull => ops::op_pull(&mut parent, &clause.field, &clause.arg),
        Modifier::PullAll => ops::op_pull_all(&mut parent, &clause.field, &clause.arg),
        Modifier::Rename => Ok(()),
    }
}

/// Build a replacement document: the stored `_id`, then every non-`_id`
/// field of `replacement`.
pub(crate) fn build_replacement(
    stored: &Document,
    replacement: &Document,
) -> Result<Document, DbError> {
    let mut out = Document::new();
    if let Some(id) = stored.get("_id") {
        out.insert("_id", id.clone());
    }
    for (key, val) in replacement.iter() {
        if key != "_id" {
            out.insert(key.clone(), val.clone());
        }
    }
    validate::document_fields(&out)?;
    Ok(out)
}

/// Lenient-mode application: whole-document override, or shallow
/// assignment where only pre-existing fields are overwritten.
pub(crate) fn apply_lenient(
    stored: &Document,
    update: &Document,
    override_document: bool,
) -> Result<Document, DbError> {
    if override_document {
        return build_replacement(stored, update);
    }
    let mut out = stored.clone();
    for (key, val) in update.iter() {
        if key == "_id" {
            continue;
        }
        if out.contains_key(key) {
            out.insert(key.clone(), val.clone());
        } else {
            tracing::warn!(field = %key, "ignoring unknown field in update");
        }
    }
    validate::document_fields(&out)?;
    Ok(out)
}

/// Document inserted by an upsert when the selector matched nothing: the
/// replacement itself, or the modifiers applied to an empty document.
pub(crate) fn upsert_document(update: &Document, strict: bool) -> Result<Document, DbError> {
    if !strict {
        return Ok(update.clone());
    }
    match parse_update(update)? {
        ParsedUpdate::Replacement(replacement) => Ok(replacement),
        ParsedUpdate::Modifiers(clauses) => apply_modifiers(&Document::new(), &clauses),
    }
}
