use chrono::Utc;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use blogpipe_common::types::{Blog, Question, SimilarityHit, Summary};
use blogpipe_common::{normalize, BlogId, QuestionId, SummaryId};

use crate::client::{
    DocumentStore, DocumentStoreError, BLOGS_COLLECTION, QUESTIONS_COLLECTION,
    QUESTION_GENERATIONS_COLLECTION, SUMMARIES_COLLECTION,
};

#[derive(Debug, Serialize, Deserialize)]
struct BlogDoc {
    #[serde(rename = "_id")]
    id: String,
    url: String,
    title: String,
    content: String,
    #[serde(default)]
    metadata: serde_json::Value,
    created_at: bson::DateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct SummaryDoc {
    #[serde(rename = "_id")]
    id: String,
    blog_url: String,
    text: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
    created_at: bson::DateTime,
}

/// A question document tagged with the generation it belongs to. Readers
/// only ever see the generation recorded as current for `blog_url` in the
/// `question_generations` collection.
#[derive(Debug, Serialize, Deserialize)]
struct QuestionDoc {
    #[serde(rename = "_id")]
    id: String,
    blog_url: String,
    /// Reversed, dot-joined host labels (e.g. "com.example.blog") so a
    /// publisher-domain subdomain match can be expressed as an indexed
    /// prefix query instead of a suffix scan.
    reversed_host: String,
    generation: String,
    question: String,
    answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
    click_count: i64,
    created_at: bson::DateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct GenerationMarkerDoc {
    #[serde(rename = "_id")]
    blog_url: String,
    current_generation: String,
}

fn parse_uuid(s: &str) -> Result<uuid::Uuid, DocumentStoreError> {
    uuid::Uuid::parse_str(s).map_err(|e| DocumentStoreError::BsonDe(bson::de::Error::custom(e.to_string())))
}

impl BlogDoc {
    fn into_blog(self) -> Result<Blog, DocumentStoreError> {
        Ok(Blog {
            id: BlogId::from_uuid(parse_uuid(&self.id)?),
            url: self.url,
            title: self.title,
            content: self.content,
            metadata: self.metadata,
            created_at: self.created_at.to_chrono(),
        })
    }
}

impl SummaryDoc {
    fn into_summary(self) -> Result<Summary, DocumentStoreError> {
        Ok(Summary {
            id: SummaryId::from_uuid(parse_uuid(&self.id)?),
            blog_url: self.blog_url,
            text: self.text,
            key_points: self.key_points,
            embedding: self.embedding,
            created_at: self.created_at.to_chrono(),
        })
    }
}

impl QuestionDoc {
    fn into_question(self) -> Result<Question, DocumentStoreError> {
        Ok(Question {
            id: QuestionId::from_uuid(parse_uuid(&self.id)?),
            blog_url: self.blog_url,
            question: self.question,
            answer: self.answer,
            embedding: self.embedding,
            click_count: self.click_count,
            created_at: self.created_at.to_chrono(),
        })
    }
}

pub(crate) async fn ensure_artifact_indexes(db: &Database) -> Result<(), DocumentStoreError> {
    let blogs: Collection<BlogDoc> = db.collection(BLOGS_COLLECTION);
    blogs
        .create_index(IndexModel::builder().keys(doc! { "url": 1 }).options(
            mongodb::options::IndexOptions::builder().unique(true).build(),
        ).build())
        .await?;

    let summaries: Collection<SummaryDoc> = db.collection(SUMMARIES_COLLECTION);
    summaries
        .create_index(
            IndexModel::builder()
                .keys(doc! { "blog_url": 1 })
                .options(mongodb::options::IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    let questions: Collection<QuestionDoc> = db.collection(QUESTIONS_COLLECTION);
    questions
        .create_indexes(vec![
            IndexModel::builder()
                .keys(doc! { "blog_url": 1, "generation": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "reversed_host": 1 })
                .build(),
        ])
        .await?;

    Ok(())
}

fn reversed_host(url: &str) -> String {
    let host = normalize::host_of(url);
    host.split('.').rev().collect::<Vec<_>>().join(".")
}

fn reversed_domain_prefix(domain: &str) -> String {
    domain.to_lowercase().split('.').rev().collect::<Vec<_>>().join(".")
}

/// `reversed_host` regex anchored on a label boundary, so a publisher domain
/// only matches itself or a subdomain, never another domain that merely
/// shares its label prefix (e.g. "example.com" must not match "exampleother.com").
fn domain_match_pattern(domain: &str) -> String {
    format!("^{}(\\.|$)", regex_escape(&reversed_domain_prefix(domain)))
}

impl DocumentStore {
    fn blogs(&self) -> Collection<BlogDoc> {
        self.db().collection(BLOGS_COLLECTION)
    }
    fn summaries(&self) -> Collection<SummaryDoc> {
        self.db().collection(SUMMARIES_COLLECTION)
    }
    fn questions(&self) -> Collection<QuestionDoc> {
        self.db().collection(QUESTIONS_COLLECTION)
    }
    fn question_generations(&self) -> Collection<GenerationMarkerDoc> {
        self.db().collection(QUESTION_GENERATIONS_COLLECTION)
    }

    pub async fn upsert_blog(
        &self,
        url: &str,
        title: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<BlogId, DocumentStoreError> {
        let existing = self.blogs().find_one(doc! { "url": url }).await?;
        let id = existing
            .as_ref()
            .map(|b| b.id.clone())
            .unwrap_or_else(|| BlogId::new().to_string());

        let doc = BlogDoc {
            id: id.clone(),
            url: url.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            metadata,
            created_at: existing
                .map(|b| b.created_at)
                .unwrap_or_else(|| bson::DateTime::from_chrono(Utc::now())),
        };

        self.blogs()
            .replace_one(doc! { "_id": &id }, &doc)
            .upsert(true)
            .await?;

        Ok(BlogId::from_uuid(parse_uuid(&id)?))
    }

    pub async fn upsert_summary(
        &self,
        blog_url: &str,
        text: &str,
        key_points: Vec<String>,
        embedding: Option<Vec<f32>>,
    ) -> Result<SummaryId, DocumentStoreError> {
        let existing = self.summaries().find_one(doc! { "blog_url": blog_url }).await?;
        let id = existing
            .as_ref()
            .map(|s| s.id.clone())
            .unwrap_or_else(|| SummaryId::new().to_string());

        let doc = SummaryDoc {
            id: id.clone(),
            blog_url: blog_url.to_string(),
            text: text.to_string(),
            key_points,
            embedding,
            created_at: existing
                .map(|s| s.created_at)
                .unwrap_or_else(|| bson::DateTime::from_chrono(Utc::now())),
        };

        self.summaries()
            .replace_one(doc! { "_id": &id }, &doc)
            .upsert(true)
            .await?;

        Ok(SummaryId::from_uuid(parse_uuid(&id)?))
    }

    /// Swaps the question set for `blog_url`. The generation
    /// marker flip is a single-document write, so it is the instant readers
    /// observe the swap; the new docs are visible (unreferenced) before that
    /// point and the old docs are deleted (unreferenced) after it, so a
    /// reader never sees a mixed set even though this store can't do a
    /// cross-document transaction.
    pub async fn replace_questions(
        &self,
        blog_url: &str,
        items: Vec<(String, String, Option<Vec<f32>>)>,
    ) -> Result<(), DocumentStoreError> {
        let new_generation = uuid::Uuid::new_v4().to_string();
        let now = bson::DateTime::from_chrono(Utc::now());
        let host = reversed_host(blog_url);

        if !items.is_empty() {
            let docs: Vec<QuestionDoc> = items
                .into_iter()
                .map(|(question, answer, embedding)| QuestionDoc {
                    id: QuestionId::new().to_string(),
                    blog_url: blog_url.to_string(),
                    reversed_host: host.clone(),
                    generation: new_generation.clone(),
                    question,
                    answer,
                    embedding,
                    click_count: 0,
                    created_at: now,
                })
                .collect();
            self.questions().insert_many(&docs).await?;
        }

        self.question_generations()
            .replace_one(
                doc! { "_id": blog_url },
                &GenerationMarkerDoc {
                    blog_url: blog_url.to_string(),
                    current_generation: new_generation.clone(),
                },
            )
            .upsert(true)
            .await?;

        self.questions()
            .delete_many(doc! { "blog_url": blog_url, "generation": { "$ne": &new_generation } })
            .await?;

        Ok(())
    }

    pub async fn questions_by_url(&self, blog_url: &str) -> Result<Vec<Question>, DocumentStoreError> {
        let marker = self
            .question_generations()
            .find_one(doc! { "_id": blog_url })
            .await?;

        let Some(marker) = marker else {
            return Ok(Vec::new());
        };

        use futures_util::stream::TryStreamExt;
        let mut cursor = self
            .questions()
            .find(doc! { "blog_url": blog_url, "generation": &marker.current_generation })
            .await?;

        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            out.push(doc.into_question()?);
        }
        Ok(out)
    }

    pub async fn question_by_id(&self, id: QuestionId) -> Result<Option<Question>, DocumentStoreError> {
        self.questions()
            .find_one(doc! { "_id": id.to_string() })
            .await?
            .map(QuestionDoc::into_question)
            .transpose()
    }

    pub async fn blog_by_url(&self, url: &str) -> Result<Option<Blog>, DocumentStoreError> {
        self.blogs()
            .find_one(doc! { "url": url })
            .await?
            .map(BlogDoc::into_blog)
            .transpose()
    }

    pub async fn increment_question_click(&self, id: QuestionId) -> Result<i64, DocumentStoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .questions()
            .find_one_and_update(doc! { "_id": id.to_string() }, doc! { "$inc": { "click_count": 1 } })
            .with_options(options)
            .await?
            .ok_or_else(|| DocumentStoreError::NotFound(format!("question {id}")))?;

        Ok(updated.click_count)
    }

    /// Nearest-neighbor search over question embeddings restricted to
    /// `publisher_domain`. Candidates are pre-filtered at the
    /// database level via an indexed prefix match on `reversed_host`, then
    /// scored in-process by cosine similarity — this deployment has no
    /// native vector index available, so ranking happens in application
    /// code over the pre-filtered candidate set (see DESIGN.md).
    pub async fn search_similar(
        &self,
        embedding: &[f32],
        limit: usize,
        publisher_domain: &str,
    ) -> Result<Vec<SimilarityHit>, DocumentStoreError> {
        let anchored = domain_match_pattern(publisher_domain);

        use futures_util::stream::TryStreamExt;
        let mut cursor = self
            .questions()
            .find(doc! { "reversed_host": { "$regex": anchored }, "embedding": { "$exists": true } })
            .await?;

        let mut scored: Vec<(String, f64)> = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            if let Some(candidate) = &doc.embedding {
                let score = cosine_similarity(embedding, candidate);
                scored.push((doc.blog_url.clone(), score));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(url, score)| SimilarityHit { url, score })
            .collect())
    }

    /// Removes a blog and cascades to its questions and summary. Not
    /// transactional across collections; reports per-collection counts and
    /// is safe to retry.
    pub async fn delete_blog(&self, blog_id: BlogId) -> Result<DeletionReport, DocumentStoreError> {
        let blog = self
            .blogs()
            .find_one(doc! { "_id": blog_id.to_string() })
            .await?;

        let Some(blog) = blog else {
            return Ok(DeletionReport {
                blog_deleted: false,
                questions_deleted: 0,
                summary_deleted: false,
            });
        };

        let questions_deleted = self
            .questions()
            .delete_many(doc! { "blog_url": &blog.url })
            .await?
            .deleted_count;

        self.question_generations()
            .delete_one(doc! { "_id": &blog.url })
            .await?;

        let summary_deleted = self
            .summaries()
            .delete_one(doc! { "blog_url": &blog.url })
            .await?
            .deleted_count
            > 0;

        let blog_deleted = self
            .blogs()
            .delete_one(doc! { "_id": blog_id.to_string() })
            .await?
            .deleted_count
            > 0;

        Ok(DeletionReport {
            blog_deleted,
            questions_deleted,
            summary_deleted,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeletionReport {
    pub blog_deleted: bool,
    pub questions_deleted: u64,
    pub summary_deleted: bool,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if ".^$|()[]{}*+?\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0_f32, 2.0, 3.0];
        let score = cosine_similarity(&v, &v);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![0.0_f32, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn reversed_host_reverses_labels() {
        assert_eq!(reversed_host("https://blog.example.com/a"), "com.example.blog");
    }

    #[test]
    fn reversed_domain_prefix_matches_subdomain_host() {
        let prefix = reversed_domain_prefix("example.com");
        let host = reversed_host("https://blog.example.com/a");
        assert!(host.starts_with(&prefix));
    }

    #[test]
    fn domain_match_pattern_is_anchored_on_a_label_boundary() {
        assert_eq!(domain_match_pattern("example.com"), "^com\\.example(\\.|$)");
    }

    // `$regex` semantics without a regex engine: emulate exactly what the
    // anchored pattern matches (prefix followed by "." or end of string).
    fn pattern_matches(pattern_domain: &str, candidate_host: &str) -> bool {
        let prefix = reversed_domain_prefix(pattern_domain);
        candidate_host == prefix || candidate_host.starts_with(&format!("{prefix}."))
    }

    #[test]
    fn does_not_match_a_domain_sharing_only_a_label_prefix() {
        assert!(!pattern_matches("example.com", &reversed_host("https://exampleother.com/a")));
    }

    #[test]
    fn matches_self_and_subdomains_only() {
        assert!(pattern_matches("example.com", &reversed_host("https://example.com/a")));
        assert!(pattern_matches("example.com", &reversed_host("https://blog.example.com/a")));
    }
}
