//! POST /qa/ask: an on-demand LLM answer over an already-crawled
//! blog's content. Explicitly not persisted — this does not go through
//! JobStore/ArtifactStore.replace_questions, it answers once and returns.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use blogpipe_common::{normalize, BlogPipeError};

use crate::auth::PublisherAuth;
use crate::response::{err, ok, ApiResult};
use crate::state::SharedState;

const QA_SYSTEM_PROMPT: &str =
    "Answer the user's question using only the blog content provided. If the \
    content does not contain the answer, say so plainly.";

#[derive(Deserialize)]
pub struct AskRequest {
    pub blog_url: String,
    pub question: String,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub answer: String,
}

/// POST /qa/ask
pub async fn ask(
    State(state): State<SharedState>,
    PublisherAuth(publisher): PublisherAuth,
    Json(req): Json<AskRequest>,
) -> ApiResult<AskResponse> {
    let url = normalize::normalize(&req.blog_url);

    if !blogpipe_core::auth::domain_matches(&url, &publisher) {
        return err(BlogPipeError::DomainMismatch);
    }

    if req.question.trim().is_empty() {
        return err(BlogPipeError::Validation("question is required".into()));
    }

    let blog = match state.document_store.blog_by_url(&url).await {
        Ok(Some(blog)) => blog,
        Ok(None) => return err(BlogPipeError::NotFound(format!("blog {url}"))),
        Err(e) => return err(e.into()),
    };

    let prompt = format!(
        "Blog content:\n{}\n\nQuestion: {}",
        blog.content, req.question
    );

    let model = publisher.config.chat_model.clone();
    let temperature = publisher.config.chat_temperature;
    let max_tokens = publisher.config.chat_max_tokens;

    match state
        .llm
        .generate_text(&prompt, QA_SYSTEM_PROMPT, &model, temperature, max_tokens)
        .await
    {
        Ok(answer) => ok(StatusCode::OK, AskResponse { answer }),
        Err(e) => err(BlogPipeError::TransientUpstream(e.to_string())),
    }
}
