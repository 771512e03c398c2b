//! The LLM provider is an external collaborator, reached only through its
//! contract: `generate_text(prompt, system_prompt, model, temperature,
//! max_tokens) -> text` and `generate_embedding(text, model) -> vector`.
//! Provider routing is a pure function of the model-name prefix, not an
//! open-ended plugin registry.

mod anthropic;
mod openai;

use blogpipe_common::config::RetryConfig;

/// Errors from LLM API calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM HTTP error: {0}")]
    Http(String),

    #[error("LLM auth or quota error: {0}")]
    AuthOrQuota(String),

    #[error("LLM rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM response parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Transient unless the provider indicates a non-retryable auth/quota
    /// error, which is permanent.
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, LlmError::AuthOrQuota(_))
    }
}

/// Capability interface implemented by every provider.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: &str,
        model: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError>;

    async fn generate_embedding(&self, text: &str, model: &str) -> Result<Vec<f32>, LlmError>;
}

/// Routes to a provider implementation by model-name prefix, with retry.
pub struct RoutedLlmClient {
    http: reqwest::Client,
    retry: RetryConfig,
    anthropic_key: Option<String>,
    openai_key: Option<String>,
}

impl RoutedLlmClient {
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            retry,
            anthropic_key: std::env::var("ANTHROPIC_API_KEY").ok().filter(|s| !s.is_empty()),
            openai_key: std::env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
        }
    }

    fn provider_for(&self, model: &str) -> Provider {
        if model.starts_with("claude") {
            Provider::Anthropic
        } else {
            Provider::OpenAi
        }
    }

    async fn send_once(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        match self.provider_for(model) {
            Provider::Anthropic => {
                let key = self
                    .anthropic_key
                    .as_deref()
                    .ok_or_else(|| LlmError::AuthOrQuota("ANTHROPIC_API_KEY not set".into()))?;
                anthropic::generate_text(&self.http, key, model, system_prompt, prompt, temperature, max_tokens)
                    .await
            }
            Provider::OpenAi => {
                let key = self
                    .openai_key
                    .as_deref()
                    .ok_or_else(|| LlmError::AuthOrQuota("OPENAI_API_KEY not set".into()))?;
                openai::generate_text(&self.http, key, model, system_prompt, prompt, temperature, max_tokens)
                    .await
            }
        }
    }

    async fn embed_once(&self, model: &str, text: &str) -> Result<Vec<f32>, LlmError> {
        let key = self
            .openai_key
            .as_deref()
            .ok_or_else(|| LlmError::AuthOrQuota("OPENAI_API_KEY not set".into()))?;
        openai::generate_embedding(&self.http, key, model, text).await
    }

    async fn with_retry<F, Fut, T>(&self, op: F) -> Result<T, LlmError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        let mut attempt = 0u32;
        let mut backoff_ms = self.retry.initial_backoff_ms;

        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_non_retryable() => {
                    metrics::counter!("llm.api.errors").increment(1);
                    return Err(e);
                }
                Err(LlmError::RateLimited { retry_after }) => {
                    if attempt >= self.retry.max_attempts {
                        metrics::counter!("llm.api.errors").increment(1);
                        return Err(LlmError::RateLimited { retry_after });
                    }
                    let wait = retry_after.map(|s| s * 1000).unwrap_or(backoff_ms);
                    tracing::warn!(attempt, wait_ms = wait, "LLM rate limited, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(wait)).await;
                }
                Err(e) => {
                    if attempt >= self.retry.max_attempts {
                        metrics::counter!("llm.api.errors").increment(1);
                        return Err(e);
                    }
                    let jitter = if self.retry.jitter {
                        jitter_ms(attempt, backoff_ms)
                    } else {
                        0
                    };
                    let wait = backoff_ms + jitter;
                    tracing::warn!(attempt, wait_ms = wait, error = %e, "LLM API error, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(wait)).await;
                    backoff_ms = ((backoff_ms as f64) * self.retry.backoff_multiplier) as u64;
                    backoff_ms = backoff_ms.min(self.retry.max_backoff_ms);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for RoutedLlmClient {
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: &str,
        model: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        self.with_retry(|| self.send_once(model, system_prompt, prompt, temperature, max_tokens))
            .await
    }

    async fn generate_embedding(&self, text: &str, model: &str) -> Result<Vec<f32>, LlmError> {
        self.with_retry(|| self.embed_once(model, text)).await
    }
}

enum Provider {
    Anthropic,
    OpenAi,
}

fn jitter_ms(attempt: u32, backoff_ms: u64) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::hash::DefaultHasher::new();
    attempt.hash(&mut hasher);
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos()
        .hash(&mut hasher);
    hasher.finish() % (backoff_ms / 2 + 1)
}

/// Strips a fenced-code-block wrapper from an LLM response before JSON
/// parsing.
pub fn strip_json_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence_with_language_tag() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_json_fence(raw), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_json_fence(raw), "{\"a\": 1}");
    }

    #[test]
    fn passes_through_unwrapped_json() {
        let raw = "{\"a\": 1}";
        assert_eq!(strip_json_fence(raw), "{\"a\": 1}");
    }
}
