use bson::{Bson, Document};
use vellum_query::value;

use crate::error::DbError;
use crate::path::{self, Parent, PathPolicy, Resolved};

/// `$set` — deep-copy assignment.
pub(crate) fn op_set(parent: &mut Parent<'_>, value: &Bson) -> Result<(), DbError> {
    parent.set(value.clone());
    Ok(())
}

/// `$unset` — delete a document key or null out an array slot. A missing
/// target is a silent no-op.
pub(crate) fn op_unset(parent: &mut Parent<'_>) -> Result<(), DbError> {
    parent.clear();
    Ok(())
}

/// `$inc` — numeric addition, creating the field when absent.
///
/// Type promotion: i32 sums stay i32 unless they overflow into i64; any
/// double operand makes the result a double.
pub(crate) fn op_inc(parent: &mut Parent<'_>, field: &str, amount: &Bson) -> Result<(), DbError> {
    let current = match parent.get() {
        None | Some(Bson::Null) => match amount {
            Bson::Int64(_) => Bson::Int64(0),
            Bson::Double(_) => Bson::Double(0.0),
            _ => Bson::Int32(0),
        },
        Some(existing) => existing.clone(),
    };

    let sum = match (&current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(*a as i64 + *b as i64),
        },
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(*a as i64 + b),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a + *b as i64),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a + b),
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Bson::Int64(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + *b as f64),
        (Bson::Double(a), Bson::Int64(b)) => Bson::Double(a + *b as f64),
        _ => {
            return Err(DbError::Validation(format!(
                "$inc: field '{field}' is not numeric"
            )));
        }
    };

    parent.set(sum);
    Ok(())
}

/// `$push` — append to an array field, creating a singleton array when the
/// field is absent.
pub(crate) fn op_push(parent: &mut Parent<'_>, field: &str, value: &Bson) -> Result<(), DbError> {
    match parent.get_mut() {
        Some(Bson::Array(items)) => {
            items.push(value.clone());
            Ok(())
        }
        None | Some(Bson::Null) => {
            parent.set(Bson::Array(vec![value.clone()]));
            Ok(())
        }
        Some(_) => Err(DbError::Validation(format!(
            "$push: field '{field}' is not an array"
        ))),
    }
}

/// `$pushAll` — append every element of an array argument.
pub(crate) fn op_push_all(
    parent: &mut Parent<'_>,
    field: &str,
    value: &Bson,
) -> Result<(), DbError> {
    let additions = match value {
        Bson::Array(items) => items,
        _ => {
            return Err(DbError::Validation(format!(
                "$pushAll value for '{field}' must be an array"
            )));
        }
    };
    match parent.get_mut() {
        Some(Bson::Array(items)) => {
            items.extend(additions.iter().cloned());
            Ok(())
        }
        None | Some(Bson::Null) => {
            parent.set(Bson::Array(additions.clone()));
            Ok(())
        }
        Some(_) => Err(DbError::Validation(format!(
            "$pushAll: field '{field}' is not an array"
        ))),
    }
}

/// `$addToSet` — append unless a deep-equal element is already present.
/// An `{ "$each": [...] }` argument adds every listed value.
pub(crate) fn op_add_to_set(
    parent: &mut Parent<'_>,
    field: &str,
    value: &Bson,
) -> Result<(), DbError> {
    let additions: Vec<Bson> = match value {
        Bson::Document(wrapper) if wrapper.len() == 1 && wrapper.contains_key("$each") => {
            match wrapper.get("$each") {
                Some(Bson::Array(items)) => items.clone(),
                _ => {
                    return Err(DbError::Validation(format!(
                        "$addToSet $each value for '{field}' must be an array"
                    )));
                }
            }
        }
        other => vec![other.clone()],
    };
    match parent.get_mut() {
        Some(Bson::Array(items)) => {
            for addition in additions {
                if !items.iter().any(|e| value::equals(e, &addition)) {
                    items.push(addition);
                }
            }
            Ok(())
        }
        None | Some(Bson::Null) => {
            let mut items: Vec<Bson> = Vec::new();
            for addition in additions {
                if !items.iter().any(|e| value::equals(e, &addition)) {
                    items.push(addition);
                }
            }
            parent.set(Bson::Array(items));
            Ok(())
        }
        Some(_) => Err(DbError::Validation(format!(
            "$addToSet: field '{field}' is not an array"
        ))),
    }
}

/// `$pop` — remove the last element, or the first for a negative argument.
/// A missing or empty array is a silent no-op.
pub(crate) fn op_pop(parent: &mut Parent<'_>, field: &str, arg: &Bson) -> Result<(), DbError> {
    let from_front = value::as_i64(arg).map(|n| n < 0).unwrap_or(false);
    match parent.get_mut() {
        Some(Bson::Array(items)) => {
            if !items.is_empty() {
                if from_front {
                    items.remove(0);
                } else {
                    items.pop();
                }
            }
            Ok(())
        }
        None | Some(Bson::Null) => Ok(()),
        Some(_) => Err(DbError::Validation(format!(
            "$pop: field '{field}' is not an array"
        ))),
    }
}

/// `$pull` — remove every element that deep-equals the argument, or that
/// matches it as a per-element selector when the argument is a document.
pub(crate) fn op_pull(parent: &mut Parent<'_>, field: &str, arg: &Bson) -> Result<(), DbError> {
    let matcher = match arg {
        Bson::Document(cond) => Some(vellum_query::compile_element_selector(cond)?),
        _ => None,
    };
    match parent.get_mut() {
        Some(Bson::Array(items)) => {
            items.retain(|e| {
                let hit = match &matcher {
                    Some(m) => m.matches(e) || value::equals(e, arg),
                    None => value::equals(e, arg),
                };
                !hit
            });
            Ok(())
        }
        None | Some(Bson::Null) => Ok(()),
        Some(_) => Err(DbError::Validation(format!(
            "$pull: field '{field}' is not an array"
        ))),
    }
}

/// `$pullAll` — remove every element deep-equal to any listed value.
pub(crate) fn op_pull_all(
    parent: &mut Parent<'_>,
    field: &str,
    arg: &Bson,
) -> Result<(), DbError> {
    let unwanted = match arg {
        Bson::Array(items) => items,
        _ => {
            return Err(DbError::Validation(format!(
                "$pullAll value for '{field}' must be an array"
            )));
        }
    };
    match parent.get_mut() {
        Some(Bson::Array(items)) => {
            items.retain(|e| !unwanted.iter().any(|w| value::equals(e, w)));
            Ok(())
        }
        None | Some(Bson::Null) => Ok(()),
        Some(_) => Err(DbError::Validation(format!(
            "$pullAll: field '{field}' is not an array"
        ))),
    }
}

/// `$rename` — move a value to a new key-path. Neither the source nor the
/// target walk may cross an array; a missing source is a silent no-op.
pub(crate) fn op_rename(doc: &mut Document, field: &str, arg: &Bson) -> Result<(), DbError> {
    let new_path = match arg {
        Bson::String(s) if !s.is_empty() => s.as_str(),
        _ => {
            return Err(DbError::Validation(format!(
                "$rename value for '{field}' must be a string"
            )));
        }
    };
    if new_path == field {
        return Err(DbError::Validation(format!(
            "$rename source and target must differ: '{field}'"
        )));
    }

    let value = {
        let mut parent = match path::resolve_path(
            doc,
            field,
            PathPolicy {
                no_create: true,
                forbid_array: true,
            },
        )? {
            Resolved::Found(parent) => parent,
            Resolved::Undefined => return Ok(()),
            Resolved::NullTarget => {
                return Err(DbError::Validation(format!(
                    "$rename cannot traverse arrays in '{field}'"
                )));
            }
        };
        match parent.take() {
            Some(value) => value,
            None => return Ok(()),
        }
    };

    match path::resolve_path(
        doc,
        new_path,
        PathPolicy {
            no_create: false,
            forbid_array: true,
        },
    )? {
        Resolved::Found(mut parent) => {
            parent.set(value);
            Ok(())
        }
        Resolved::Undefined => Ok(()),
        Resolved::NullTarget => Err(DbError::Validation(format!(
            "$rename cannot traverse arrays in '{new_path}'"
        ))),
    }
}
