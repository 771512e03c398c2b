//! POST /search/similar.
//! The request names a question whose embedding seeds the search; results
//! are restricted to blogs under the caller's own domain.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use blogpipe_common::types::SimilarityHit;
use blogpipe_common::{BlogPipeError, QuestionId};

use crate::auth::PublisherAuth;
use crate::response::{err, ok, ApiResult};
use crate::state::SharedState;

fn default_limit() -> usize {
    10
}

#[derive(Deserialize)]
pub struct SimilarRequest {
    pub question_id: QuestionId,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Serialize)]
pub struct SimilarResponse {
    pub results: Vec<SimilarityHit>,
}

/// POST /search/similar
pub async fn similar(
    State(state): State<SharedState>,
    PublisherAuth(publisher): PublisherAuth,
    Json(req): Json<SimilarRequest>,
) -> ApiResult<SimilarResponse> {
    let seed = match state.document_store.question_by_id(req.question_id).await {
        Ok(Some(q)) => q,
        Ok(None) => {
            return err(BlogPipeError::NotFound(format!(
                "question {}",
                req.question_id
            )))
        }
        Err(e) => return err(e.into()),
    };

    let Some(embedding) = seed.embedding else {
        return err(BlogPipeError::Validation(
            "question has no embedding to search from".into(),
        ));
    };

    let limit = req.limit.clamp(1, 100);

    match state
        .document_store
        .search_similar(&embedding, limit, &publisher.domain)
        .await
    {
        Ok(results) => ok(StatusCode::OK, SimilarResponse { results }),
        Err(e) => err(e.into()),
    }
}
