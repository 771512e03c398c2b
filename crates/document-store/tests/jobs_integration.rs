///! Integration tests for JobStore (the document-store crate's job
///! collection). All tests are `#[ignore]` — run with `cargo test -- --ignored`
///! against a live MongoDB.
///!
///! Setup: connects via MONGO_URI (or a local default) into a per-run
///! database name so tests never collide with each other or a real deployment.
use blogpipe_common::config::PublisherConfig;
use blogpipe_common::types::{JobResult, JobStatus, MarkFailedOutcome};
use blogpipe_common::{BlogId, PublisherId};
use blogpipe_document_store::DocumentStore;

async fn setup() -> DocumentStore {
    let uri = std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = format!("blogpipe_test_{}", uuid::Uuid::new_v4().simple());

    let store = DocumentStore::connect(&uri, &db_name)
        .await
        .expect("failed to connect to MongoDB");
    store.ensure_indexes().await.expect("failed to ensure indexes");
    store
}

fn unique_url(label: &str) -> String {
    format!("https://example.com/{label}-{}", uuid::Uuid::new_v4())
}

fn sample_result() -> JobResult {
    JobResult {
        blog_id: BlogId::new(),
        summary_generated: true,
        questions_generated: 5,
        embeddings_generated: true,
    }
}

#[tokio::test]
#[ignore]
async fn create_job_is_idempotent_for_the_same_url() {
    let store = setup().await;
    let url = unique_url("dup");
    let publisher_id = PublisherId::new();
    let config = PublisherConfig::default();

    let (job_id, created_new) = store
        .create_job(&url, publisher_id, &config)
        .await
        .expect("first create");
    assert!(created_new);

    let (second_id, created_new) = store
        .create_job(&url, publisher_id, &config)
        .await
        .expect("second create");
    assert!(!created_new);
    assert_eq!(job_id, second_id, "duplicate submission returns the in-flight job");
}

#[tokio::test]
#[ignore]
async fn concurrent_create_job_calls_for_the_same_url_produce_one_job() {
    let store = setup().await;
    let url = unique_url("race");
    let publisher_id = PublisherId::new();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let url = url.clone();
        let config = PublisherConfig::default();
        handles.push(tokio::spawn(async move { store.create_job(&url, publisher_id, &config).await }));
    }

    let mut ids = std::collections::HashSet::new();
    let mut created_new_count = 0;
    for handle in handles {
        let (job_id, created_new) = handle.await.expect("task panicked").expect("create_job failed");
        ids.insert(job_id);
        if created_new {
            created_new_count += 1;
        }
    }

    assert_eq!(ids.len(), 1, "all callers should observe the same job id");
    assert_eq!(created_new_count, 1, "exactly one caller should have created the job");
}

#[tokio::test]
#[ignore]
async fn claim_next_under_concurrent_workers_claims_each_queued_job_exactly_once() {
    let store = setup().await;
    let publisher_id = PublisherId::new();
    let config = PublisherConfig::default();

    const N: usize = 10;
    for i in 0..N {
        store
            .create_job(&unique_url(&format!("claim-{i}")), publisher_id, &config)
            .await
            .expect("create_job");
    }

    let mut handles = Vec::new();
    for _ in 0..(N * 3) {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.claim_next().await }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(job) = handle.await.expect("task panicked").expect("claim_next failed") {
            claimed.push(job.job_id);
        }
    }

    let unique: std::collections::HashSet<_> = claimed.iter().collect();
    assert_eq!(claimed.len(), N, "exactly N jobs should be claimed across all callers");
    assert_eq!(unique.len(), N, "no job should be claimed twice");
}

#[tokio::test]
#[ignore]
async fn mark_failed_requeues_until_max_retries_then_permanently_fails() {
    let store = setup().await;
    let url = unique_url("retry");
    let publisher_id = PublisherId::new();
    let config = PublisherConfig::default();

    let (job_id, _) = store.create_job(&url, publisher_id, &config).await.expect("create_job");

    // default max_retries is 3: two requeues, then permanent failure.
    for _ in 0..3 {
        let claimed = store.claim_next().await.expect("claim_next").expect("a job should be claimable");
        assert_eq!(claimed.job_id, job_id);
        let outcome = store
            .mark_failed(job_id, "transient crawl failure")
            .await
            .expect("mark_failed");
        assert_eq!(outcome, MarkFailedOutcome::Requeued);
    }

    let claimed = store.claim_next().await.expect("claim_next").expect("final claim");
    assert_eq!(claimed.job_id, job_id);
    let outcome = store
        .mark_failed(job_id, "permanent crawl failure")
        .await
        .expect("mark_failed");
    assert_eq!(outcome, MarkFailedOutcome::PermanentlyFailed);

    let job = store.get(job_id).await.expect("get").expect("job should exist");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_count, 3);
}

#[tokio::test]
#[ignore]
async fn mark_completed_then_cancel_is_rejected() {
    let store = setup().await;
    let url = unique_url("terminal");
    let publisher_id = PublisherId::new();
    let config = PublisherConfig::default();

    let (job_id, _) = store.create_job(&url, publisher_id, &config).await.expect("create_job");
    store.claim_next().await.expect("claim_next");
    store
        .mark_completed(job_id, &sample_result())
        .await
        .expect("mark_completed");

    let result = store.cancel(job_id).await;
    assert!(result.is_err(), "a COMPLETED job must not be cancellable");

    let job = store.get(job_id).await.expect("get").expect("job should exist");
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
#[ignore]
async fn cancel_only_succeeds_while_queued() {
    let store = setup().await;
    let url = unique_url("cancel");
    let publisher_id = PublisherId::new();
    let config = PublisherConfig::default();

    let (job_id, _) = store.create_job(&url, publisher_id, &config).await.expect("create_job");
    store.cancel(job_id).await.expect("cancel a queued job");

    let job = store.get(job_id).await.expect("get").expect("job should exist");
    assert_eq!(job.status, JobStatus::Cancelled);

    // A cancelled (terminal) job frees the URL for a new submission.
    let (new_job_id, created_new) = store.create_job(&url, publisher_id, &config).await.expect("create_job");
    assert!(created_new);
    assert_ne!(new_job_id, job_id);
}
