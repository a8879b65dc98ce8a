use bson::Document;

/// Outcome of an update: the documents rewritten in place, and the
/// documents inserted by an upsert.
#[derive(Debug, Clone, Default)]
pub struct UpdateResult {
    pub updated: Vec<Document>,
    pub inserted: Vec<Document>,
}

impl UpdateResult {
    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }
}
