//! /jobs/*: enqueue is publisher-authenticated; inspect, stats, and
//! cancel are admin-only.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use blogpipe_common::types::Job;
use blogpipe_common::{BlogPipeError, JobId};

use crate::auth::{AdminAuth, PublisherAuth};
use crate::response::{err, ok, ApiResult};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ProcessRequest {
    pub blog_url: String,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    pub job_id: JobId,
    pub already_processed: bool,
}

/// POST /jobs/process
pub async fn process(
    State(state): State<SharedState>,
    PublisherAuth(publisher): PublisherAuth,
    Json(req): Json<ProcessRequest>,
) -> ApiResult<ProcessResponse> {
    if req.blog_url.trim().is_empty() {
        return err(BlogPipeError::Validation("blog_url is required".into()));
    }

    match state.intake.enqueue(&req.blog_url, &publisher).await {
        Ok(result) => {
            let status = if result.already_processed {
                StatusCode::OK
            } else {
                StatusCode::ACCEPTED
            };
            ok(
                status,
                ProcessResponse {
                    job_id: result.job_id,
                    already_processed: result.already_processed,
                },
            )
        }
        Err(e) => err(e),
    }
}

/// GET /jobs/status/{job_id}
pub async fn status(
    State(state): State<SharedState>,
    _admin: AdminAuth,
    Path(job_id): Path<String>,
) -> ApiResult<Job> {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(e) => return err(e),
    };

    match state.document_store.get(job_id).await {
        Ok(Some(job)) => ok(StatusCode::OK, job),
        Ok(None) => err(BlogPipeError::NotFound(format!("job {job_id}"))),
        Err(e) => err(e.into()),
    }
}

/// GET /jobs/stats
pub async fn stats(
    State(state): State<SharedState>,
    _admin: AdminAuth,
) -> ApiResult<std::collections::HashMap<String, i64>> {
    match state.document_store.stats().await {
        Ok(counts) => ok(StatusCode::OK, counts),
        Err(e) => err(e.into()),
    }
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

/// POST /jobs/cancel/{job_id}
pub async fn cancel(
    State(state): State<SharedState>,
    _admin: AdminAuth,
    Path(job_id): Path<String>,
) -> ApiResult<CancelResponse> {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(e) => return err(e),
    };

    match state.document_store.cancel(job_id).await {
        Ok(()) => ok(
            StatusCode::OK,
            CancelResponse {
                job_id,
                cancelled: true,
            },
        ),
        Err(e) => err(e.into()),
    }
}

fn parse_job_id(raw: &str) -> Result<JobId, BlogPipeError> {
    uuid::Uuid::parse_str(raw)
        .map(JobId::from_uuid)
        .map_err(|_| BlogPipeError::Validation(format!("invalid job id: {raw}")))
}
