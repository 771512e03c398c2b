use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use blogpipe_core::{DeletionCoordinator, IntakeCoordinator};
use blogpipe_document_store::DocumentStore;
use blogpipe_llm::LlmProvider;
use blogpipe_publisher_store::PublisherStore;

/// Shared application state reachable from every axum handler.
pub struct AppState {
    pub publisher_store: PublisherStore,
    pub document_store: DocumentStore,
    pub intake: IntakeCoordinator,
    pub deletion: DeletionCoordinator,
    pub llm: Arc<dyn LlmProvider>,
    pub admin_key: String,
    pub metrics_handle: PrometheusHandle,
}

pub type SharedState = Arc<AppState>;
