///! Integration tests for ArtifactStore (blogs/summaries/questions). All
///! tests are `#[ignore]` — run with `cargo test -- --ignored` against a live
///! MongoDB.
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
    format!("https://blog.example.com/{label}-{}", uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore]
async fn questions_by_url_is_empty_not_error_when_none_exist() {
    let store = setup().await;
    let url = unique_url("none");

    let questions = store.questions_by_url(&url).await.expect("questions_by_url");
    assert!(questions.is_empty());
}

#[tokio::test]
#[ignore]
async fn replace_questions_swaps_the_set_atomically() {
    let store = setup().await;
    let url = unique_url("swap");

    store
        .replace_questions(
            &url,
            vec![
                ("Q1".into(), "A1".into(), None),
                ("Q2".into(), "A2".into(), None),
            ],
        )
        .await
        .expect("first replace_questions");

    let first_round = store.questions_by_url(&url).await.expect("questions_by_url");
    assert_eq!(first_round.len(), 2);

    store
        .replace_questions(&url, vec![("Q3".into(), "A3".into(), None)])
        .await
        .expect("second replace_questions");

    let second_round = store.questions_by_url(&url).await.expect("questions_by_url");
    assert_eq!(second_round.len(), 1, "readers should only ever see one generation");
    assert_eq!(second_round[0].question, "Q3");
}

#[tokio::test]
#[ignore]
async fn increment_question_click_is_monotonic() {
    let store = setup().await;
    let url = unique_url("click");

    store
        .replace_questions(&url, vec![("Q".into(), "A".into(), None)])
        .await
        .expect("replace_questions");
    let questions = store.questions_by_url(&url).await.expect("questions_by_url");
    let id = questions[0].id;

    let first = store.increment_question_click(id).await.expect("increment 1");
    let second = store.increment_question_click(id).await.expect("increment 2");
    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[tokio::test]
#[ignore]
async fn delete_blog_cascades_to_questions_and_summary() {
    let store = setup().await;
    let url = unique_url("delete");

    let blog_id = store
        .upsert_blog(&url, "Title", "content", serde_json::Value::Null)
        .await
        .expect("upsert_blog");
    store
        .upsert_summary(&url, "summary text", vec!["point".into()], None)
        .await
        .expect("upsert_summary");
    store
        .replace_questions(&url, vec![("Q".into(), "A".into(), None)])
        .await
        .expect("replace_questions");

    let report = store.delete_blog(blog_id).await.expect("delete_blog");
    assert!(report.blog_deleted);
    assert!(report.summary_deleted);
    assert_eq!(report.questions_deleted, 1);

    assert!(store.blog_by_url(&url).await.expect("blog_by_url").is_none());
    assert!(store.questions_by_url(&url).await.expect("questions_by_url").is_empty());

    // Repeated deletion is safe and reports nothing further deleted.
    let second_report = store.delete_blog(blog_id).await.expect("second delete_blog");
    assert!(!second_report.blog_deleted);
}

#[tokio::test]
#[ignore]
async fn search_similar_restricts_to_publisher_domain_and_ranks_by_similarity() {
    let store = setup().await;
    let own_domain = format!("{}.example.com", uuid::Uuid::new_v4());
    let other_domain = format!("{}.other.com", uuid::Uuid::new_v4());

    let own_url = format!("https://{own_domain}/a");
    let other_url = format!("https://{other_domain}/b");

    store
        .replace_questions(&own_url, vec![("near".into(), "A".into(), Some(vec![1.0, 0.0, 0.0]))])
        .await
        .expect("replace_questions own");
    store
        .replace_questions(
            &other_url,
            vec![("far".into(), "A".into(), Some(vec![1.0, 0.0, 0.0]))],
        )
        .await
        .expect("replace_questions other");

    let results = store
        .search_similar(&[1.0, 0.0, 0.0], 10, &own_domain)
        .await
        .expect("search_similar");

    assert_eq!(results.len(), 1, "search must not leak another publisher's questions");
    assert_eq!(results[0].url, own_url);
    assert!((results[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
#[ignore]
async fn search_similar_does_not_match_a_domain_sharing_only_a_label_prefix() {
    let store = setup().await;
    // Same reversed-host prefix ("com.example...") but not a subdomain —
    // a naive prefix match without a label boundary would conflate them.
    let suffix = uuid::Uuid::new_v4();
    let own_domain = format!("example-{suffix}.com");
    let lookalike_domain = format!("example-{suffix}other.com");

    let lookalike_url = format!("https://{lookalike_domain}/b");
    store
        .replace_questions(&lookalike_url, vec![("far".into(), "A".into(), Some(vec![1.0, 0.0, 0.0]))])
        .await
        .expect("replace_questions lookalike");

    let results = store
        .search_similar(&[1.0, 0.0, 0.0], 10, &own_domain)
        .await
        .expect("search_similar");

    assert!(
        results.is_empty(),
        "a domain sharing only a label prefix must not match"
    );
}
