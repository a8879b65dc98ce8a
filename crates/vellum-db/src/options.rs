use serde::{Deserialize, Serialize};

use vellum_query::Fields;

/// Options for [`Collection::find`](crate::Collection::find) and
/// [`Collection::find_one`](crate::Collection::find_one).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FindOptions {
    /// Skip the first N matches.
    pub skip: usize,
    /// Cap on yielded documents. The historical default is 15; zero or a
    /// negative value disables the cap.
    pub limit: i64,
    /// Projection, overriding the positional `fields` argument.
    pub fields: Option<Fields>,
    /// Materialize the cursor eagerly at call time.
    pub force_fetch: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        FindOptions {
            skip: 0,
            limit: 15,
            fields: None,
            force_fetch: false,
        }
    }
}

impl FindOptions {
    /// The default options with the result cap disabled.
    pub fn unlimited() -> Self {
        FindOptions {
            limit: -1,
            ..Default::default()
        }
    }
}

/// Options for [`Collection::update`](crate::Collection::update).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOptions {
    /// Update every match instead of the first.
    pub multi: bool,
    /// Insert the update document when the selector matches nothing.
    pub upsert: bool,
    /// Strict operator-aware semantics. Off, updates merge field-wise.
    pub update_as_mongo: bool,
    /// Lenient mode only: replace the whole document instead of merging.
    pub override_document: bool,
    /// Skip the first N matches.
    pub skip: usize,
    /// Cap on updated documents; zero or negative means unlimited.
    pub limit: i64,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        UpdateOptions {
            multi: false,
            upsert: false,
            update_as_mongo: true,
            override_document: false,
            skip: 0,
            limit: -1,
        }
    }
}

impl UpdateOptions {
    pub fn multi() -> Self {
        UpdateOptions {
            multi: true,
            ..Default::default()
        }
    }

    pub fn upsert() -> Self {
        UpdateOptions {
            upsert: true,
            ..Default::default()
        }
    }
}

/// Options for [`Collection::remove`](crate::Collection::remove).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveOptions {
    /// Stop after the first match.
    pub just_one: bool,
}
