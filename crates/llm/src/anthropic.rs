use serde::{Deserialize, Serialize};

use super::LlmError;

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

pub async fn generate_text(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    system_prompt: &str,
    prompt: &str,
    temperature: f64,
    max_tokens: u32,
) -> Result<String, LlmError> {
    let request = AnthropicRequest {
        model,
        max_tokens,
        system: system_prompt,
        messages: vec![AnthropicMessage {
            role: "user",
            content: prompt,
        }],
        temperature: Some(temperature),
    };

    let response = http
        .post(ANTHROPIC_MESSAGES_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&request)
        .send()
        .await
        .map_err(|e| LlmError::Http(e.to_string()))?;

    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(LlmError::RateLimited { retry_after });
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(LlmError::AuthOrQuota(format!(
            "anthropic returned {status}"
        )));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_error_body(status, &body));
    }

    let body = response.text().await.map_err(|e| LlmError::Parse(e.to_string()))?;
    parse_success_body(&body)
}

fn classify_error_body(status: reqwest::StatusCode, body: &str) -> LlmError {
    match serde_json::from_str::<AnthropicErrorBody>(body) {
        Ok(err) if err.error.kind == "invalid_request_error" && err.error.message.contains("quota") => {
            LlmError::AuthOrQuota(err.error.message)
        }
        Ok(err) => LlmError::Api(format!("{}: {}", err.error.kind, err.error.message)),
        Err(_) => LlmError::Api(format!("anthropic returned {status}")),
    }
}

fn parse_success_body(body: &str) -> Result<String, LlmError> {
    let parsed: AnthropicResponse = serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;

    let text = parsed
        .content
        .into_iter()
        .map(|b| b.text)
        .collect::<Vec<_>>()
        .join("");

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_text_block() {
        let body = r#"{"content": [{"type": "text", "text": "hello"}]}"#;
        assert_eq!(parse_success_body(body).unwrap(), "hello");
    }

    #[test]
    fn joins_multiple_text_blocks() {
        let body = r#"{"content": [{"type": "text", "text": "foo"}, {"type": "text", "text": "bar"}]}"#;
        assert_eq!(parse_success_body(body).unwrap(), "foobar");
    }

    #[test]
    fn classifies_quota_errors_as_auth_or_quota() {
        let body = r#"{"error": {"type": "invalid_request_error", "message": "quota exceeded for org"}}"#;
        let err = classify_error_body(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, LlmError::AuthOrQuota(_)));
    }

    #[test]
    fn classifies_other_errors_as_api() {
        let body = r#"{"error": {"type": "overloaded_error", "message": "servers are overloaded"}}"#;
        let err = classify_error_body(reqwest::StatusCode::SERVICE_UNAVAILABLE, body);
        assert!(matches!(err, LlmError::Api(_)));
    }

    #[test]
    fn falls_back_to_status_text_on_unparseable_body() {
        let err = classify_error_body(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "not json");
        match err {
            LlmError::Api(msg) => assert!(msg.contains("500")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
