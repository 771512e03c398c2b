//! IntakeCoordinator: the only path that creates a job. Owns the
//! ordering between domain/whitelist policy checks, the daily-limit gate,
//! the idempotent short-circuit, and slot reservation — getting this
//! ordering wrong is exactly how a publisher's quota gets over- or
//! under-counted.

use chrono::{DateTime, Utc};

use blogpipe_common::types::{Job, JobStatus, Publisher, Question};
use blogpipe_common::{normalize, BlogPipeError, JobId, Result};
use blogpipe_document_store::DocumentStore;
use blogpipe_publisher_store::PublisherStore;

use crate::auth;

pub struct EnqueueResult {
    pub job_id: JobId,
    /// True when step 4's idempotent short-circuit fired: a completed
    /// artifact already exists for this URL, so no job was created.
    pub already_processed: bool,
}

pub enum CheckAndLoadStatus {
    Ready(Vec<Question>),
    Processing { job_id: JobId },
    Failed { job_id: JobId },
    NotStarted { job_id: JobId },
}

pub struct IntakeCoordinator {
    publisher_store: PublisherStore,
    document_store: DocumentStore,
}

impl IntakeCoordinator {
    pub fn new(publisher_store: PublisherStore, document_store: DocumentStore) -> Self {
        Self {
            publisher_store,
            document_store,
        }
    }

    /// Validates domain/whitelist policy, enforces the daily limit, reuses
    /// an existing non-terminal job for the same URL if one exists, and
    /// otherwise reserves a slot and creates a new job.
    pub async fn enqueue(&self, raw_url: &str, publisher: &Publisher) -> Result<EnqueueResult> {
        let url = normalize::normalize(raw_url);

        if !auth::domain_matches(&url, publisher) {
            return Err(BlogPipeError::DomainMismatch);
        }

        if let Some(limit) = publisher.config.daily_blog_limit {
            let completed_today = self
                .document_store
                .count_completed_since(publisher.id, start_of_utc_day())
                .await?;
            if completed_today >= limit {
                return Err(BlogPipeError::DailyLimitExceeded);
            }
        }

        if let Some(existing_job) = self.already_processed(&url).await? {
            return Ok(EnqueueResult {
                job_id: existing_job.job_id,
                already_processed: true,
            });
        }

        if !auth::url_whitelisted(&url, publisher) {
            return Err(BlogPipeError::NotWhitelisted);
        }

        let reservation = self
            .publisher_store
            .reserve_slot(publisher.id)
            .await
            .map_err(BlogPipeError::from)?;

        match self
            .document_store
            .create_job(&url, publisher.id, &publisher.config)
            .await
        {
            Ok((job_id, true)) => {
                reservation.commit();
                Ok(EnqueueResult {
                    job_id,
                    already_processed: false,
                })
            }
            Ok((job_id, false)) => {
                if let Err(e) = reservation.release().await {
                    tracing::error!(error = %e, "failed to release slot after losing create_job race");
                }
                Ok(EnqueueResult {
                    job_id,
                    already_processed: false,
                })
            }
            Err(e) => {
                if let Err(re) = reservation.release().await {
                    tracing::error!(error = %re, "failed to release slot after create_job error");
                }
                Err(e.into())
            }
        }
    }

    /// Re-derives job/question state for a URL without requiring the
    /// caller to have enqueued it first, lazily enqueuing when nothing is
    /// tracked for it yet.
    pub async fn check_and_load(&self, raw_url: &str, publisher: &Publisher) -> Result<CheckAndLoadStatus> {
        let url = normalize::normalize(raw_url);

        if !auth::domain_matches(&url, publisher) {
            return Err(BlogPipeError::DomainMismatch);
        }

        let questions = self.document_store.questions_by_url(&url).await?;
        if !questions.is_empty() {
            return Ok(CheckAndLoadStatus::Ready(questions));
        }

        match self.document_store.by_url(&url).await? {
            Some(job) => Ok(self.status_for_existing_job(&url, job).await?),
            None => self.start_processing(&url, publisher).await,
        }
    }

    async fn status_for_existing_job(&self, url: &str, job: Job) -> Result<CheckAndLoadStatus> {
        match job.status {
            JobStatus::Completed => {
                let questions = self.document_store.questions_by_url(url).await?;
                if questions.is_empty() {
                    Ok(CheckAndLoadStatus::NotStarted { job_id: job.job_id })
                } else {
                    Ok(CheckAndLoadStatus::Ready(questions))
                }
            }
            JobStatus::Processing | JobStatus::Queued => {
                Ok(CheckAndLoadStatus::Processing { job_id: job.job_id })
            }
            JobStatus::Failed | JobStatus::Cancelled => Ok(CheckAndLoadStatus::Failed { job_id: job.job_id }),
        }
    }

    async fn start_processing(&self, url: &str, publisher: &Publisher) -> Result<CheckAndLoadStatus> {
        if !auth::url_whitelisted(url, publisher) {
            return Err(BlogPipeError::NotWhitelisted);
        }

        let reservation = self
            .publisher_store
            .reserve_slot(publisher.id)
            .await
            .map_err(BlogPipeError::from)?;

        match self
            .document_store
            .create_job(url, publisher.id, &publisher.config)
            .await
        {
            Ok((job_id, true)) => {
                reservation.commit();
                Ok(CheckAndLoadStatus::NotStarted { job_id })
            }
            Ok((job_id, false)) => {
                if let Err(e) = reservation.release().await {
                    tracing::error!(error = %e, "failed to release slot after losing create_job race");
                }
                Ok(CheckAndLoadStatus::NotStarted { job_id })
            }
            Err(e) => {
                if let Err(re) = reservation.release().await {
                    tracing::error!(error = %re, "failed to release slot after create_job error");
                }
                Err(e.into())
            }
        }
    }

    /// A completed artifact plus a completed job means this URL has already
    /// been fully processed, so enqueueing again is a no-op.
    async fn already_processed(&self, url: &str) -> Result<Option<Job>> {
        if self.document_store.blog_by_url(url).await?.is_none() {
            return Ok(None);
        }
        match self.document_store.by_url(url).await? {
            Some(job) if job.status == JobStatus::Completed => Ok(Some(job)),
            _ => Ok(None),
        }
    }
}

fn start_of_utc_day() -> DateTime<Utc> {
    Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
}
