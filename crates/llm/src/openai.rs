use serde::{Deserialize, Serialize};

use super::LlmError;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAiErrorBody {
    error: OpenAiErrorDetail,
}

#[derive(Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: String,
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
    let request = ChatRequest {
        model,
        max_tokens,
        temperature,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system_prompt,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
    };

    let response = http
        .post(OPENAI_CHAT_URL)
        .bearer_auth(api_key)
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

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(LlmError::AuthOrQuota(format!("openai returned {status}")));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_error_body(status, &body));
    }

    let body = response.text().await.map_err(|e| LlmError::Parse(e.to_string()))?;
    parse_chat_body(&body)
}

pub async fn generate_embedding(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    text: &str,
) -> Result<Vec<f32>, LlmError> {
    let request = EmbeddingRequest { model, input: text };

    let response = http
        .post(OPENAI_EMBEDDINGS_URL)
        .bearer_auth(api_key)
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

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(LlmError::AuthOrQuota(format!("openai returned {status}")));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_error_body(status, &body));
    }

    let body = response.text().await.map_err(|e| LlmError::Parse(e.to_string()))?;
    parse_embedding_body(&body)
}

fn classify_error_body(status: reqwest::StatusCode, body: &str) -> LlmError {
    match serde_json::from_str::<OpenAiErrorBody>(body) {
        Ok(err) if err.error.kind.contains("quota") || err.error.kind.contains("auth") => {
            LlmError::AuthOrQuota(err.error.message)
        }
        Ok(err) => LlmError::Api(format!("{}: {}", err.error.kind, err.error.message)),
        Err(_) => LlmError::Api(format!("openai returned {status}")),
    }
}

fn parse_chat_body(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| LlmError::Parse("empty choices array".into()))
}

fn parse_embedding_body(body: &str) -> Result<Vec<f32>, LlmError> {
    let parsed: EmbeddingResponse = serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
    parsed
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| LlmError::Parse("empty embedding data".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice_message() {
        let body = r#"{"choices": [{"message": {"content": "hello there"}}]}"#;
        assert_eq!(parse_chat_body(body).unwrap(), "hello there");
    }

    #[test]
    fn rejects_empty_choices_array() {
        let body = r#"{"choices": []}"#;
        assert!(matches!(parse_chat_body(body), Err(LlmError::Parse(_))));
    }

    #[test]
    fn parses_embedding_vector() {
        let body = r#"{"data": [{"embedding": [0.1, 0.2, 0.3]}]}"#;
        assert_eq!(parse_embedding_body(body).unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn classifies_quota_errors_as_auth_or_quota() {
        let body = r#"{"error": {"message": "quota exceeded", "type": "insufficient_quota"}}"#;
        let err = classify_error_body(reqwest::StatusCode::TOO_MANY_REQUESTS, body);
        assert!(matches!(err, LlmError::AuthOrQuota(_)));
    }

    #[test]
    fn classifies_other_errors_as_api() {
        let body = r#"{"error": {"message": "model not found", "type": "invalid_request_error"}}"#;
        let err = classify_error_body(reqwest::StatusCode::NOT_FOUND, body);
        assert!(matches!(err, LlmError::Api(_)));
    }
}
