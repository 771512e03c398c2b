//! Maps `BlogPipeError` onto the shared response envelope: every
//! response — success or error — carries `status`, `status_code`, `message`,
//! `result`, `request_id`, `timestamp`. Internal classifications
//! (TRANSIENT/PERMANENT upstream errors) are never exposed to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use blogpipe_common::envelope::Envelope;
use blogpipe_common::BlogPipeError;

pub struct ApiResult<T>(pub Result<(StatusCode, T), BlogPipeError>);

impl<T: Serialize> IntoResponse for ApiResult<T> {
    fn into_response(self) -> Response {
        match self.0 {
            Ok((status, body)) => {
                let envelope = Envelope::success(status.as_u16(), "ok", body);
                (status, Json(envelope)).into_response()
            }
            Err(err) => error_response(err),
        }
    }
}

pub fn error_response(err: BlogPipeError) -> Response {
    let status_code = err.status_code();
    let status =
        StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    // TransientUpstreamError/PermanentUpstreamError are internal-only
    // classifications and should never reach this layer in
    // practice — PipelineExecutor catches them before they can. Map them to
    // a generic message defensively rather than assert-fail.
    let message = if err.is_internal_classification() {
        "internal processing error".to_string()
    } else {
        err.to_string()
    };

    tracing::warn!(status = status_code, error = %err, "request failed");

    let envelope: Envelope<()> = Envelope::error(status_code, message);
    (status, Json(envelope)).into_response()
}

pub fn ok<T: Serialize>(status: StatusCode, body: T) -> ApiResult<T> {
    ApiResult(Ok((status, body)))
}

pub fn err<T: Serialize>(e: BlogPipeError) -> ApiResult<T> {
    ApiResult(Err(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn maps_validation_error_to_400() {
        let response = error_response(BlogPipeError::Validation("bad url".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status_code"], 400);
        assert_eq!(body["message"], "validation error: bad url");
    }

    #[tokio::test]
    async fn redacts_internal_classification_errors() {
        let response = error_response(BlogPipeError::TransientUpstream("LLM 503".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "internal processing error");
    }

    #[tokio::test]
    async fn ok_wraps_body_in_success_envelope() {
        let result: ApiResult<&str> = ok(StatusCode::CREATED, "hello");
        let response = result.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["result"], "hello");
    }

    #[tokio::test]
    async fn err_wraps_body_in_error_envelope() {
        let result: ApiResult<()> = err(BlogPipeError::NotFound("job".into()));
        let response = result.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
