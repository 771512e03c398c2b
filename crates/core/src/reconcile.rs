//! Opt-in slot-reconciliation sweep: periodically compares each publisher's `blog_slots_reserved`
//! against `count(QUEUED) + count(PROCESSING)` jobs and logs a warning on
//! mismatch. Mirrors the teacher's `embeddings::spawn_backfill_task` shape —
//! a detached periodic task, no shutdown coordination, started only when
//! configured on.
//!
//! This sweep never auto-corrects a mismatch: the source of truth for
//! *which* job is responsible for a reserved slot is JobStore, and silently
//! rewriting `blog_slots_reserved` here could paper over a real bug instead
//! of surfacing it. Auto-correction is left as an Open Question (DESIGN.md).

use std::time::Duration;

use blogpipe_document_store::DocumentStore;
use blogpipe_publisher_store::PublisherStore;

pub fn spawn_reconcile_task(
    publisher_store: PublisherStore,
    document_store: DocumentStore,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_seconds = interval.as_secs(), "slot reconciliation sweep started");

        loop {
            tokio::time::sleep(interval).await;

            if let Err(e) = run_once(&publisher_store, &document_store).await {
                tracing::error!(error = %e, "slot reconciliation sweep failed");
            }
        }
    })
}

async fn run_once(
    publisher_store: &PublisherStore,
    document_store: &DocumentStore,
) -> anyhow::Result<()> {
    let active_by_publisher = document_store.active_counts_by_publisher().await?;
    let reserved_by_publisher = publisher_store.all_reserved_counts().await?;

    let mut mismatches = 0u32;
    for (publisher_id, reserved) in &reserved_by_publisher {
        let active = active_by_publisher.get(publisher_id).copied().unwrap_or(0);
        if *reserved != active {
            mismatches += 1;
            tracing::warn!(
                publisher_id = %publisher_id,
                blog_slots_reserved = reserved,
                active_jobs = active,
                "slot reservation disagrees with active job count"
            );
        }
    }

    metrics::gauge!("reconcile.mismatches").set(mismatches as f64);
    tracing::debug!(mismatches, publishers_checked = reserved_by_publisher.len(), "slot reconciliation sweep complete");
    Ok(())
}
