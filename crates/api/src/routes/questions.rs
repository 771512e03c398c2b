//! /questions/*. check-and-load and by-url
//! are publisher-scoped reads gated by `AuthPolicy::domain_matches`; single-question lookup and
//! blog purge are admin-only.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use blogpipe_common::types::Question;
use blogpipe_common::{normalize, BlogId, BlogPipeError, JobId, QuestionId};
use blogpipe_core::{auth, CheckAndLoadStatus};
use blogpipe_document_store::DeletionReport;

use crate::auth::{AdminAuth, PublisherAuth};
use crate::response::{err, ok, ApiResult};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct BlogUrlQuery {
    pub blog_url: String,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckAndLoadResponse {
    Ready { questions: Vec<Question> },
    Processing { job_id: JobId },
    Failed { job_id: JobId },
    NotStarted { job_id: JobId },
}

impl From<CheckAndLoadStatus> for CheckAndLoadResponse {
    fn from(status: CheckAndLoadStatus) -> Self {
        match status {
            CheckAndLoadStatus::Ready(questions) => CheckAndLoadResponse::Ready { questions },
            CheckAndLoadStatus::Processing { job_id } => {
                CheckAndLoadResponse::Processing { job_id }
            }
            CheckAndLoadStatus::Failed { job_id } => CheckAndLoadResponse::Failed { job_id },
            CheckAndLoadStatus::NotStarted { job_id } => {
                CheckAndLoadResponse::NotStarted { job_id }
            }
        }
    }
}

/// GET /questions/check-and-load
pub async fn check_and_load(
    State(state): State<SharedState>,
    PublisherAuth(publisher): PublisherAuth,
    Query(q): Query<BlogUrlQuery>,
) -> ApiResult<CheckAndLoadResponse> {
    match state.intake.check_and_load(&q.blog_url, &publisher).await {
        Ok(status) => ok(StatusCode::OK, CheckAndLoadResponse::from(status)),
        Err(e) => err(e),
    }
}

#[derive(Serialize)]
pub struct QuestionsByUrlResponse {
    pub questions: Vec<Question>,
}

/// GET /questions/by-url
pub async fn by_url(
    State(state): State<SharedState>,
    PublisherAuth(publisher): PublisherAuth,
    Query(q): Query<BlogUrlQuery>,
) -> ApiResult<QuestionsByUrlResponse> {
    let url = normalize::normalize(&q.blog_url);

    if !auth::domain_matches(&url, &publisher) {
        return err(BlogPipeError::DomainMismatch);
    }

    match state.document_store.questions_by_url(&url).await {
        Ok(questions) => ok(StatusCode::OK, QuestionsByUrlResponse { questions }),
        Err(e) => err(e.into()),
    }
}

/// GET /questions/{question_id}
pub async fn by_id(
    State(state): State<SharedState>,
    _admin: AdminAuth,
    Path(question_id): Path<String>,
) -> ApiResult<Question> {
    let question_id = match uuid::Uuid::parse_str(&question_id) {
        Ok(id) => QuestionId::from_uuid(id),
        Err(_) => return err(BlogPipeError::Validation("invalid question id".into())),
    };

    match state.document_store.question_by_id(question_id).await {
        Ok(Some(question)) => ok(StatusCode::OK, question),
        Ok(None) => err(BlogPipeError::NotFound(format!(
            "question {question_id}"
        ))),
        Err(e) => err(e.into()),
    }
}

/// DELETE /questions/{blog_id} — admin purge of a blog and its artifacts.
pub async fn delete(
    State(state): State<SharedState>,
    _admin: AdminAuth,
    Path(blog_id): Path<String>,
) -> ApiResult<DeletionReport> {
    let blog_id = match uuid::Uuid::parse_str(&blog_id) {
        Ok(id) => BlogId::from_uuid(id),
        Err(_) => return err(BlogPipeError::Validation("invalid blog id".into())),
    };

    match state.deletion.delete(blog_id).await {
        Ok(report) => ok(StatusCode::OK, report),
        Err(e) => err(e),
    }
}
