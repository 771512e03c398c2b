use mongodb::{Client, Database};
use thiserror::Error;

use blogpipe_common::BlogPipeError;

#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate active job for url: {0}")]
    DuplicateUrl(String),
    #[error("job cannot be cancelled in its current state")]
    CannotCancel,
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
    #[error(transparent)]
    Bson(#[from] bson::ser::Error),
    #[error(transparent)]
    BsonDe(#[from] bson::de::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl From<DocumentStoreError> for BlogPipeError {
    fn from(e: DocumentStoreError) -> Self {
        match e {
            DocumentStoreError::NotFound(what) => BlogPipeError::NotFound(what),
            DocumentStoreError::DuplicateUrl(url) => {
                BlogPipeError::Integrity(format!("duplicate active job for url {url}"))
            }
            DocumentStoreError::CannotCancel => BlogPipeError::CannotCancel,
            other => BlogPipeError::Mongo(other.to_string()),
        }
    }
}

/// Shared MongoDB-backed handle for JobStore and ArtifactStore.
///
/// Both stores live on the same client/database because in practice they're
/// deployed together and share connection pooling, but each owns disjoint
/// collections and neither reaches across into the other's documents.
#[derive(Clone)]
pub struct DocumentStore {
    db: Database,
}

pub(crate) const JOBS_COLLECTION: &str = "processing_jobs";
pub(crate) const BLOGS_COLLECTION: &str = "raw_blog_content";
pub(crate) const SUMMARIES_COLLECTION: &str = "blog_summaries";
pub(crate) const QUESTIONS_COLLECTION: &str = "processed_questions";
pub(crate) const QUESTION_GENERATIONS_COLLECTION: &str = "question_generations";

impl DocumentStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, DocumentStoreError> {
        tracing::info!("connecting to MongoDB");
        let client = Client::with_uri_str(uri).await?;
        let store = Self {
            db: client.database(db_name),
        };
        store.health_check().await?;
        tracing::info!("MongoDB connection established");
        Ok(store)
    }

    pub async fn health_check(&self) -> Result<(), DocumentStoreError> {
        self.db.run_command(bson::doc! { "ping": 1 }).await?;
        Ok(())
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    /// Idempotent index bootstrap, run once at process startup (mirrors the
    /// teacher's fail-loud `migrate()` step for the relational store — here
    /// there is no schema to migrate, only indexes to guarantee).
    pub async fn ensure_indexes(&self) -> Result<(), DocumentStoreError> {
        tracing::info!("ensuring MongoDB indexes");
        crate::jobs::ensure_job_indexes(&self.db).await?;
        crate::artifacts::ensure_artifact_indexes(&self.db).await?;
        tracing::info!("MongoDB indexes ready");
        Ok(())
    }
}
