use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Publisher-controlled pipeline configuration.
///
/// Recognized options are typed fields with explicit defaults; anything the
/// widget-configuration layer sends that isn't recognized here round-trips
/// through `extra` instead of being silently dropped.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublisherConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_blogs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_blog_limit: Option<u64>,
    #[serde(default)]
    pub whitelisted_blog_urls: Vec<String>,
    #[serde(default = "default_questions_per_blog")]
    pub questions_per_blog: u8,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub chat_temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub chat_max_tokens: u32,
    #[serde(default = "default_true")]
    pub generate_summary: bool,
    #[serde(default = "default_true")]
    pub generate_embeddings: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_question_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_summary_prompt: Option<String>,

    /// Unrecognized keys, preserved verbatim for forward compatibility.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_total_blogs: None,
            daily_blog_limit: None,
            whitelisted_blog_urls: Vec::new(),
            questions_per_blog: default_questions_per_blog(),
            llm_model: default_llm_model(),
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            chat_temperature: default_temperature(),
            chat_max_tokens: default_max_tokens(),
            generate_summary: true,
            generate_embeddings: true,
            custom_question_prompt: None,
            custom_summary_prompt: None,
            extra: Map::new(),
        }
    }
}

impl PublisherConfig {
    /// Merge a partial JSON patch into this config, keeping unknown keys in `extra`.
    pub fn merge_patch(&self, patch: &Value) -> crate::Result<Self> {
        let mut current = serde_json::to_value(self)?;
        if let (Value::Object(base), Value::Object(incoming)) = (&mut current, patch) {
            for (k, v) in incoming {
                base.insert(k.clone(), v.clone());
            }
        }
        let merged: Self = serde_json::from_value(current)?;
        Ok(merged)
    }
}

fn default_questions_per_blog() -> u8 {
    5
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_true() -> bool {
    true
}

/// Retry/backoff parameters for a specific external target (crawler, LLM, store).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Circuit breaker parameters shared by the crawler and LLM clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_seconds: 30,
        }
    }
}

/// Top-level system configuration, deserialized from system.toml.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    pub worker: WorkerConfig,
    pub retry: RetryDefaults,
    pub circuit_breaker: CircuitBreakerConfig,
    pub embedding: EmbeddingSettings,
}

/// Parameters for the WorkerLoop scheduler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub concurrent_jobs: u32,
    pub poll_interval_seconds: u64,
    pub shutdown_deadline_seconds: u64,
    /// Whether to run the optional slot-reconciliation sweep.
    pub reconcile_enabled: bool,
    pub reconcile_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrent_jobs: 1,
            poll_interval_seconds: 5,
            shutdown_deadline_seconds: 30,
            reconcile_enabled: false,
            reconcile_interval_seconds: 300,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryDefaults {
    pub crawler: RetryConfig,
    pub llm: RetryConfig,
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            crawler: RetryConfig::default(),
            llm: RetryConfig::default(),
        }
    }
}

/// Embedding dimensionality, fixed at boot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}
