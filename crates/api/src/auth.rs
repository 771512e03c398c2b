//! Authentication extractors: `X-API-Key` resolves to a
//! publisher, `X-Admin-Key` is compared against the configured admin secret.
//! Both are plain axum `FromRequestParts` impls so handlers just declare the
//! extractor type they need and get a typed, already-authenticated value.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::Response;

use blogpipe_common::types::Publisher;
use blogpipe_common::BlogPipeError;

use crate::response::error_response;
use crate::state::SharedState;

/// An authenticated publisher, resolved from the `X-API-Key` header.
pub struct PublisherAuth(pub Publisher);

impl FromRequestParts<SharedState> for PublisherAuth {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("X-API-Key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| error_response(BlogPipeError::Auth("missing X-API-Key".into())))?;

        let publisher = state
            .publisher_store
            .by_api_key(key)
            .await
            .map_err(|e| error_response(e.into()))?;

        Ok(PublisherAuth(publisher))
    }
}

/// Proof that the caller presented the admin secret via `X-Admin-Key`.
pub struct AdminAuth;

impl FromRequestParts<SharedState> for AdminAuth {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("X-Admin-Key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| error_response(BlogPipeError::Auth("missing X-Admin-Key".into())))?;

        if key != state.admin_key {
            return Err(error_response(BlogPipeError::Auth(
                "invalid admin key".into(),
            )));
        }

        Ok(AdminAuth)
    }
}

pub type AppState = State<SharedState>;
