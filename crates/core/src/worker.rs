//! WorkerLoop: one scheduling task that claims jobs and fans
//! them out to up to `concurrent_jobs` executor tasks, with a graceful,
//! bounded-deadline shutdown. Grounded in the teacher's `ProcessorPool`
//! (`engine/src/processor/pool.rs`) — same `watch::channel(false)` shutdown
//! signal and `Vec<JoinHandle<()>>` join pattern, adapted from a
//! per-worker-consumer queue to a shared poll-and-claim scheduler since this
//! job source has no consumer-group concept.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

use blogpipe_common::config::WorkerConfig;
use blogpipe_document_store::DocumentStore;

use crate::pipeline::PipelineExecutor;

pub struct WorkerLoop {
    document_store: DocumentStore,
    executor: Arc<PipelineExecutor>,
    concurrent_jobs: usize,
    poll_interval: Duration,
    shutdown_deadline: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl WorkerLoop {
    pub fn new(document_store: DocumentStore, executor: PipelineExecutor, config: &WorkerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            document_store,
            executor: Arc::new(executor),
            concurrent_jobs: config.concurrent_jobs.max(1) as usize,
            poll_interval: Duration::from_secs(config.poll_interval_seconds.max(1)),
            shutdown_deadline: Duration::from_secs(config.shutdown_deadline_seconds.max(1)),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// A cloneable handle callers use to trigger graceful shutdown (e.g. from
    /// a SIGTERM handler in the worker binary).
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Runs until the shutdown signal fires, then waits (bounded by
    /// `shutdown_deadline`) for in-flight executor tasks to reach a terminal
    /// JobStore transition. PROCESSING jobs are never cancelled externally
    /// — a deadline overrun just stops waiting, it never aborts
    /// the task, so no job is abandoned mid-transition.
    pub async fn run(self) {
        let semaphore = Arc::new(Semaphore::new(self.concurrent_jobs));
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            if *shutdown_rx.borrow() {
                tracing::info!("worker loop stopping new claims, draining in-flight jobs");
                break;
            }

            let permit = match Arc::clone(&semaphore).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            };

            match self.document_store.claim_next().await {
                Ok(Some(job)) => {
                    let job_id = job.job_id;
                    let executor = Arc::clone(&self.executor);
                    in_flight.retain(|h| !h.is_finished());
                    in_flight.push(tokio::spawn(async move {
                        executor.run(job).await;
                        drop(permit);
                    }));
                    tracing::debug!(job_id = %job_id, "claimed job, dispatched to executor task");
                }
                Ok(None) => {
                    drop(permit);
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(error = %e, "claim_next failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        let drain = futures_util::future::join_all(in_flight.into_iter().map(|h| async move {
            let _ = h.await;
        }));

        if tokio::time::timeout(self.shutdown_deadline, drain).await.is_err() {
            tracing::warn!(
                deadline_seconds = self.shutdown_deadline.as_secs(),
                "shutdown deadline elapsed with executor tasks still in flight; \
                leaving them running in the background rather than abandoning the jobs"
            );
        } else {
            tracing::info!("worker loop shut down cleanly, no jobs in flight");
        }
    }
}
