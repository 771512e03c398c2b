//! Shared domain types for the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PublisherConfig;
use crate::ids::{BlogId, JobId, PublisherId, QuestionId, SummaryId};

/// Publisher lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherStatus {
    Trial,
    Active,
    Inactive,
}

impl PublisherStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "inactive" => Self::Inactive,
            _ => Self::Trial,
        }
    }
}

/// A publisher tenant. Owned exclusively by PublisherStore.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Publisher {
    pub id: PublisherId,
    pub name: String,
    pub domain: String,
    pub email: String,
    pub status: PublisherStatus,
    pub config: PublisherConfig,
    pub total_blogs_processed: i64,
    pub blog_slots_reserved: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Queued,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Outcome of `JobStore::mark_failed` — the signal slot accounting depends on
///.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkFailedOutcome {
    Requeued,
    PermanentlyFailed,
}

/// Opaque success payload stored on a completed job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobResult {
    pub blog_id: BlogId,
    pub summary_generated: bool,
    pub questions_generated: u32,
    pub embeddings_generated: bool,
}

/// A job document. Owned exclusively by JobStore.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub blog_url: String,
    pub publisher_id: PublisherId,
    pub status: JobStatus,
    pub failure_count: u32,
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    pub config_snapshot: PublisherConfig,
}

/// A crawled-and-persisted blog. Owned by ArtifactStore.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Blog {
    pub id: BlogId,
    pub url: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A blog summary with embedding. Owned by ArtifactStore.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Summary {
    pub id: SummaryId,
    pub blog_url: String,
    pub text: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// A generated question/answer pair with embedding. Owned
/// by ArtifactStore.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub blog_url: String,
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A single nearest-neighbor search hit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub url: String,
    pub score: f64,
}
