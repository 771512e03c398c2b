//! Circuit breaker for the crawler and LLM external dependencies. A
//! tripped breaker classifies the call TRANSIENT immediately, without
//! attempting the network call, bounding retry storms against a down
//! dependency.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use blogpipe_common::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// A single breaker guarding one external dependency. Never held across an
/// `.await` — `inner` is a plain `std::sync::Mutex`.
pub struct CircuitBreaker {
    name: String,
    failure_count: AtomicU32,
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    state: CircuitState,
    last_failure: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            failure_count: AtomicU32::new(0),
            failure_threshold: config.failure_threshold,
            cooldown: Duration::from_secs(config.cooldown_seconds),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                last_failure: None,
            }),
        }
    }

    /// Whether a call should be attempted right now.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => match inner.last_failure {
                Some(last) if last.elapsed() >= self.cooldown => {
                    inner.state = CircuitState::HalfOpen;
                    tracing::info!(circuit = %self.name, "circuit breaker half-open, allowing probe");
                    true
                }
                _ => false,
            },
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        let mut inner = self.inner.lock().unwrap();
        if inner.state != CircuitState::Closed {
            tracing::info!(circuit = %self.name, "circuit breaker closing after successful probe");
            inner.state = CircuitState::Closed;
            metrics::counter!("circuit_breaker.recoveries", "circuit" => self.name.clone())
                .increment(1);
        }
    }

    pub fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        let mut inner = self.inner.lock().unwrap();
        inner.last_failure = Some(Instant::now());

        if count >= self.failure_threshold && inner.state != CircuitState::Open {
            tracing::warn!(circuit = %self.name, failures = count, "circuit breaker OPEN");
            inner.state = CircuitState::Open;
            metrics::counter!("circuit_breaker.trips", "circuit" => self.name.clone()).increment(1);
        }
    }

    pub fn current_state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }
}

/// The crawler and LLM breakers PipelineExecutor consults before each call.
pub struct CircuitBreakers {
    pub crawler: CircuitBreaker,
    pub llm: CircuitBreaker,
}

impl CircuitBreakers {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            crawler: CircuitBreaker::new("crawler", config),
            llm: CircuitBreaker::new("llm", config),
        }
    }

    pub fn report_metrics(&self) {
        for cb in [&self.crawler, &self.llm] {
            let value = match cb.current_state() {
                CircuitState::Closed => 0.0,
                CircuitState::HalfOpen => 0.5,
                CircuitState::Open => 1.0,
            };
            metrics::gauge!("circuit_breaker.state", "circuit" => cb.name.clone()).set(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            cooldown_seconds: 0,
        }
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new("test", &config());
        assert!(cb.allow());
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);
    }

    #[test]
    fn half_opens_after_cooldown_elapses() {
        let cb = CircuitBreaker::new("test", &config());
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.current_state(), CircuitState::Open);
        assert!(cb.allow());
        assert_eq!(cb.current_state(), CircuitState::HalfOpen);
    }

    #[test]
    fn success_closes_circuit() {
        let cb = CircuitBreaker::new("test", &config());
        cb.record_failure();
        cb.record_failure();
        cb.allow();
        cb.record_success();
        assert_eq!(cb.current_state(), CircuitState::Closed);
    }
}
