//! DeletionCoordinator: a thin admin-only wrapper around
//! `DocumentStore::delete_blog` — the cascade logic itself lives in the
//! store since it's the one that owns the collections being cascaded across.

use blogpipe_common::{BlogId, Result};
use blogpipe_document_store::{DeletionReport, DocumentStore};

pub struct DeletionCoordinator {
    document_store: DocumentStore,
}

impl DeletionCoordinator {
    pub fn new(document_store: DocumentStore) -> Self {
        Self { document_store }
    }

    /// Deletes a blog and its associated summary/questions. Idempotent: a
    /// repeat call against an already-deleted id reports all-false rather
    /// than erroring.
    pub async fn delete(&self, blog_id: BlogId) -> Result<DeletionReport> {
        Ok(self.document_store.delete_blog(blog_id).await?)
    }
}
