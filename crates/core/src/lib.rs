pub mod auth;
pub mod circuit_breaker;
pub mod config;
pub mod deletion;
pub mod intake;
pub mod pipeline;
pub mod reconcile;
pub mod worker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakers};
pub use config::{load_config, validate, ConfigError};
pub use deletion::DeletionCoordinator;
pub use intake::{CheckAndLoadStatus, EnqueueResult, IntakeCoordinator};
pub use pipeline::PipelineExecutor;
pub use reconcile::spawn_reconcile_task;
pub use worker::WorkerLoop;
