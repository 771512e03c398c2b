//! System configuration loading: a TOML file parsed into
//! `blogpipe_common::config::SystemConfig`, validated before the process is
//! allowed to start — mirroring the teacher's `load_config`/`validate` pair.

use std::path::{Path, PathBuf};

use blogpipe_common::config::SystemConfig;

pub fn load_config(path: &Path) -> Result<SystemConfig, ConfigError> {
    tracing::info!(path = %path.display(), "loading system configuration");

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: SystemConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    validate(&config)?;

    tracing::info!("system configuration loaded and validated");
    Ok(config)
}

pub fn validate(config: &SystemConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.worker.concurrent_jobs == 0 {
        errors.push("worker.concurrent_jobs must be > 0".to_string());
    }
    if config.worker.poll_interval_seconds == 0 {
        errors.push("worker.poll_interval_seconds must be > 0".to_string());
    }
    if config.worker.shutdown_deadline_seconds == 0 {
        errors.push("worker.shutdown_deadline_seconds must be > 0".to_string());
    }

    validate_retry(&config.retry.crawler, "retry.crawler", &mut errors);
    validate_retry(&config.retry.llm, "retry.llm", &mut errors);

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push("circuit_breaker.failure_threshold must be > 0".to_string());
    }

    if config.embedding.model.is_empty() {
        errors.push("embedding.model must not be empty".to_string());
    }
    if config.embedding.dimensions == 0 {
        errors.push("embedding.dimensions must be > 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors.join("; ")))
    }
}

fn validate_retry(rc: &blogpipe_common::config::RetryConfig, name: &str, errors: &mut Vec<String>) {
    if rc.max_attempts == 0 {
        errors.push(format!("{name}.max_attempts must be > 0"));
    }
    if rc.initial_backoff_ms == 0 {
        errors.push(format!("{name}.initial_backoff_ms must be > 0"));
    }
    if rc.max_backoff_ms < rc.initial_backoff_ms {
        errors.push(format!("{name}.max_backoff_ms must be >= initial_backoff_ms"));
    }
    if rc.backoff_multiplier < 1.0 {
        errors.push(format!("{name}.backoff_multiplier must be >= 1.0"));
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogpipe_common::config::{CircuitBreakerConfig, EmbeddingSettings, RetryConfig, RetryDefaults, WorkerConfig};

    fn valid_config() -> SystemConfig {
        SystemConfig {
            worker: WorkerConfig::default(),
            retry: RetryDefaults::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            embedding: EmbeddingSettings::default(),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn zero_concurrent_jobs_is_rejected() {
        let mut config = valid_config();
        config.worker.concurrent_jobs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn bad_retry_backoff_bounds_are_rejected() {
        let mut config = valid_config();
        config.retry.llm = RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 100,
            backoff_multiplier: 2.0,
            jitter: true,
        };
        assert!(validate(&config).is_err());
    }
}
