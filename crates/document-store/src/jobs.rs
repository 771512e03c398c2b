use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use blogpipe_common::config::PublisherConfig;
use blogpipe_common::types::{Job, JobResult, JobStatus, MarkFailedOutcome};
use blogpipe_common::{JobId, PublisherId};

use crate::client::{DocumentStore, DocumentStoreError, JOBS_COLLECTION};

#[derive(Debug, Serialize, Deserialize)]
struct JobDoc {
    #[serde(rename = "_id")]
    id: String,
    blog_url: String,
    publisher_id: String,
    status: String,
    failure_count: u32,
    max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    created_at: bson::DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_at: Option<bson::DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<bson::DateTime>,
    updated_at: bson::DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    config_snapshot: serde_json::Value,
}

fn parse_uuid(s: &str) -> Result<uuid::Uuid, DocumentStoreError> {
    uuid::Uuid::parse_str(s).map_err(|e| DocumentStoreError::BsonDe(bson::de::Error::custom(e.to_string())))
}

impl JobDoc {
    fn into_job(self) -> Result<Job, DocumentStoreError> {
        Ok(Job {
            job_id: JobId::from_uuid(parse_uuid(&self.id)?),
            blog_url: self.blog_url,
            publisher_id: PublisherId::from_uuid(parse_uuid(&self.publisher_id)?),
            status: JobStatus::from_db_str(&self.status),
            failure_count: self.failure_count,
            max_retries: self.max_retries,
            error_message: self.error_message,
            created_at: self.created_at.to_chrono(),
            started_at: self.started_at.map(|d| d.to_chrono()),
            completed_at: self.completed_at.map(|d| d.to_chrono()),
            updated_at: self.updated_at.to_chrono(),
            result: self
                .result
                .map(serde_json::from_value)
                .transpose()
                .map_err(DocumentStoreError::Serde)?,
            config_snapshot: serde_json::from_value(self.config_snapshot)
                .map_err(DocumentStoreError::Serde)?,
        })
    }
}

pub(crate) async fn ensure_job_indexes(db: &Database) -> Result<(), DocumentStoreError> {
    let jobs: Collection<JobDoc> = db.collection(JOBS_COLLECTION);

    // Uniqueness invariant: at most one job per blog_url with
    // status in {queued, processing}. A partial unique index enforces this
    // without requiring an app-side lock.
    let active_url_index = IndexModel::builder()
        .keys(doc! { "blog_url": 1 })
        .options(
            IndexOptions::builder()
                .unique(true)
                .partial_filter_expression(doc! { "status": { "$in": ["queued", "processing"] } })
                .build(),
        )
        .build();

    let created_at_index = IndexModel::builder()
        .keys(doc! { "status": 1, "created_at": 1, "_id": 1 })
        .build();

    let publisher_completed_index = IndexModel::builder()
        .keys(doc! { "publisher_id": 1, "status": 1, "completed_at": 1 })
        .build();

    jobs.create_indexes(vec![
        active_url_index,
        created_at_index,
        publisher_completed_index,
    ])
    .await?;

    Ok(())
}

impl DocumentStore {
    fn jobs(&self) -> Collection<JobDoc> {
        self.db().collection(JOBS_COLLECTION)
    }

    /// Creates a job in QUEUED state, or returns the existing active job's id
    /// with `created_new = false` if one already exists for this URL. The partial unique index is the enforcement mechanism; a
    /// duplicate-key error here means we lost a race against another
    /// concurrent `create`, which we resolve by re-reading the winner.
    pub async fn create_job(
        &self,
        blog_url: &str,
        publisher_id: PublisherId,
        config_snapshot: &PublisherConfig,
    ) -> Result<(JobId, bool), DocumentStoreError> {
        let now = bson::DateTime::from_chrono(Utc::now());
        let job_id = JobId::new();

        let doc = JobDoc {
            id: job_id.to_string(),
            blog_url: blog_url.to_string(),
            publisher_id: publisher_id.to_string(),
            status: JobStatus::Queued.as_db_str().to_string(),
            failure_count: 0,
            max_retries: 3,
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
            result: None,
            config_snapshot: serde_json::to_value(config_snapshot)?,
        };

        match self.jobs().insert_one(&doc).await {
            Ok(_) => Ok((job_id, true)),
            Err(e) if is_duplicate_key(&e) => {
                let existing = self
                    .by_url(blog_url)
                    .await?
                    .ok_or_else(|| DocumentStoreError::DuplicateUrl(blog_url.to_string()))?;
                Ok((existing.job_id, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically claims the oldest QUEUED job.
    /// `find_one_and_update` is a single-document atomic operation in
    /// MongoDB, so exactly one concurrent caller observes the claimed
    /// document even under many workers polling the same collection.
    pub async fn claim_next(&self) -> Result<Option<Job>, DocumentStoreError> {
        let now = bson::DateTime::from_chrono(Utc::now());
        let options = FindOneAndUpdateOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .jobs()
            .find_one_and_update(
                doc! { "status": "queued" },
                doc! { "$set": { "status": "processing", "started_at": now, "updated_at": now } },
            )
            .with_options(options)
            .await?;

        updated.map(JobDoc::into_job).transpose()
    }

    pub async fn mark_completed(
        &self,
        job_id: JobId,
        result: &JobResult,
    ) -> Result<(), DocumentStoreError> {
        let now = bson::DateTime::from_chrono(Utc::now());
        let result_doc = bson::to_bson(result)?;
        let update = self
            .jobs()
            .update_one(
                doc! { "_id": job_id.to_string(), "status": "processing" },
                doc! { "$set": {
                    "status": JobStatus::Completed.as_db_str(),
                    "completed_at": now,
                    "updated_at": now,
                    "result": result_doc,
                } },
            )
            .await?;

        if update.matched_count == 0 {
            return Err(DocumentStoreError::NotFound(format!("job {job_id}")));
        }
        Ok(())
    }

    /// Increments `failure_count` and transitions to QUEUED (requeue) or
    /// FAILED (permanent) depending on `max_retries`. The
    /// returned outcome is the signal `PipelineExecutor` uses to decide
    /// whether to release the publisher's reserved slot.
    pub async fn mark_failed(
        &self,
        job_id: JobId,
        error: &str,
    ) -> Result<MarkFailedOutcome, DocumentStoreError> {
        let current = self
            .jobs()
            .find_one(doc! { "_id": job_id.to_string() })
            .await?
            .ok_or_else(|| DocumentStoreError::NotFound(format!("job {job_id}")))?;

        let now = bson::DateTime::from_chrono(Utc::now());

        // Guard on the pre-increment count: a job gets max_retries requeues
        // (attempts 1..=max_retries) before the (max_retries + 1)th attempt
        // is the one that gives up, so failure_count ends at max_retries.
        let (new_status, new_failure_count, outcome) = if current.failure_count < current.max_retries {
            (JobStatus::Queued, current.failure_count + 1, MarkFailedOutcome::Requeued)
        } else {
            (JobStatus::Failed, current.failure_count, MarkFailedOutcome::PermanentlyFailed)
        };

        let mut set = doc! {
            "status": new_status.as_db_str(),
            "failure_count": new_failure_count,
            "error_message": error,
            "updated_at": now,
        };
        if new_status == JobStatus::Failed {
            set.insert("completed_at", now);
        } else {
            // Requeue resets started_at but preserves config_snapshot.
            set.insert("started_at", Bson::Null);
        }

        self.jobs()
            .update_one(doc! { "_id": job_id.to_string() }, doc! { "$set": set })
            .await?;

        Ok(outcome)
    }

    /// Cancels a QUEUED job. PROCESSING jobs are not cancellable.
    pub async fn cancel(&self, job_id: JobId) -> Result<(), DocumentStoreError> {
        let now = bson::DateTime::from_chrono(Utc::now());
        let result = self
            .jobs()
            .update_one(
                doc! { "_id": job_id.to_string(), "status": "queued" },
                doc! { "$set": { "status": JobStatus::Cancelled.as_db_str(), "updated_at": now, "completed_at": now } },
            )
            .await?;

        if result.matched_count == 1 {
            return Ok(());
        }

        if self.get(job_id).await?.is_none() {
            Err(DocumentStoreError::NotFound(format!("job {job_id}")))
        } else {
            Err(DocumentStoreError::CannotCancel)
        }
    }

    pub async fn get(&self, job_id: JobId) -> Result<Option<Job>, DocumentStoreError> {
        self.jobs()
            .find_one(doc! { "_id": job_id.to_string() })
            .await?
            .map(JobDoc::into_job)
            .transpose()
    }

    pub async fn by_url(&self, blog_url: &str) -> Result<Option<Job>, DocumentStoreError> {
        self.jobs()
            .find_one(doc! { "blog_url": blog_url })
            .await?
            .map(JobDoc::into_job)
            .transpose()
    }

    /// Counts COMPLETED jobs for `publisher_id` completed since `since` — the
    /// daily-limit check feeding `IntakeCoordinator::enqueue` step 3.
    pub async fn count_completed_since(
        &self,
        publisher_id: PublisherId,
        since: DateTime<Utc>,
    ) -> Result<u64, DocumentStoreError> {
        let count = self
            .jobs()
            .count_documents(doc! {
                "publisher_id": publisher_id.to_string(),
                "status": "completed",
                "completed_at": { "$gte": bson::DateTime::from_chrono(since) },
            })
            .await?;
        Ok(count)
    }

    /// Counts QUEUED+PROCESSING jobs grouped by publisher — feeds the
    /// opt-in slot-reconciliation sweep.
    pub async fn active_counts_by_publisher(
        &self,
    ) -> Result<std::collections::HashMap<PublisherId, i64>, DocumentStoreError> {
        let mut cursor = self
            .jobs()
            .clone_with_type::<Document>()
            .aggregate(vec![
                doc! { "$match": { "status": { "$in": ["queued", "processing"] } } },
                doc! { "$group": { "_id": "$publisher_id", "count": { "$sum": 1 } } },
            ])
            .await?;

        let mut out = std::collections::HashMap::new();
        use futures_util::stream::TryStreamExt;
        while let Some(doc) = cursor.try_next().await? {
            let publisher_id = doc.get_str("_id").ok().and_then(|s| parse_uuid(s).ok());
            let count = doc.get("count").and_then(Bson::as_i64);
            if let (Some(id), Some(count)) = (publisher_id, count) {
                out.insert(PublisherId::from_uuid(id), count);
            }
        }
        Ok(out)
    }

    pub async fn stats(&self) -> Result<std::collections::HashMap<String, i64>, DocumentStoreError> {
        let mut cursor = self
            .jobs()
            .clone_with_type::<Document>()
            .aggregate(vec![doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } }])
            .await?;

        let mut out = std::collections::HashMap::new();
        use futures_util::stream::TryStreamExt;
        while let Some(doc) = cursor.try_next().await? {
            let status = doc.get_str("_id").ok();
            let count = doc.get("count").and_then(Bson::as_i64);
            if let (Some(status), Some(count)) = (status, count) {
                out.insert(status.to_string(), count);
            }
        }
        Ok(out)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::ErrorKind;
    match err.kind.as_ref() {
        ErrorKind::Write(mongodb::error::WriteFailure::WriteError(we)) => we.code == 11000,
        ErrorKind::BulkWrite(bwe) => bwe.write_errors.iter().flatten().any(|e| e.code == 11000),
        _ => false,
    }
}
