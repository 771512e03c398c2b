//! /publishers/*: onboarding is admin-only; metadata is the public
//! widget-bootstrap endpoint and carries no secrets.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use blogpipe_common::config::PublisherConfig;
use blogpipe_common::{normalize, PublisherId};

use crate::auth::AdminAuth;
use crate::response::{err, ok, ApiResult};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct OnboardRequest {
    pub name: String,
    pub domain: String,
    pub email: String,
    #[serde(default)]
    pub config: Option<PublisherConfig>,
}

#[derive(Serialize)]
pub struct OnboardResponse {
    pub publisher_id: PublisherId,
    pub domain: String,
    /// Returned exactly once at creation time.
    pub api_key: String,
}

/// POST /publishers/onboard
pub async fn onboard(
    State(state): State<SharedState>,
    _admin: AdminAuth,
    Json(req): Json<OnboardRequest>,
) -> ApiResult<OnboardResponse> {
    let config = req.config.unwrap_or_default();

    match state
        .publisher_store
        .create(&req.name, &req.domain, &req.email, config)
        .await
    {
        Ok((publisher, api_key)) => ok(
            StatusCode::CREATED,
            OnboardResponse {
                publisher_id: publisher.id,
                domain: publisher.domain,
                api_key,
            },
        ),
        Err(e) => err(e.into()),
    }
}

#[derive(Deserialize)]
pub struct MetadataQuery {
    pub blog_url: String,
}

#[derive(Serialize)]
pub struct MetadataResponse {
    pub domain: String,
    pub questions_per_blog: u8,
    pub generate_summary: bool,
    pub generate_embeddings: bool,
}

/// GET /publishers/metadata — public widget bootstrap, no auth.
pub async fn metadata(
    State(state): State<SharedState>,
    Query(q): Query<MetadataQuery>,
) -> ApiResult<MetadataResponse> {
    let host = normalize::host_of(&normalize::normalize(&q.blog_url)).to_string();

    match state.publisher_store.by_domain(&host, true).await {
        Ok(publisher) => ok(
            StatusCode::OK,
            MetadataResponse {
                domain: publisher.domain,
                questions_per_blog: publisher.config.questions_per_blog,
                generate_summary: publisher.config.generate_summary,
                generate_embeddings: publisher.config.generate_embeddings,
            },
        ),
        Err(e) => err(e.into()),
    }
}
