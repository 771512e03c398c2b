//! PipelineExecutor: executes one claimed job end to end and
//! reconciles slot accounting. This is the one component that catches and
//! classifies every external failure — it must never let an error escape
//! without either completing the job or invoking `mark_failed`.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use blogpipe_common::config::PublisherConfig;
use blogpipe_common::types::{Job, JobResult, MarkFailedOutcome};
use blogpipe_crawler::{Crawler, CrawlResult, FailureKind};
use blogpipe_document_store::DocumentStore;
use blogpipe_llm::LlmProvider;
use blogpipe_publisher_store::PublisherStore;

use crate::circuit_breaker::CircuitBreakers;

const JSON_ENFORCEMENT_SYSTEM_PROMPT: &str = "You produce only machine-readable output. \
Respond with a single JSON object and nothing else: no prose, no markdown code fences, \
no explanation before or after the JSON.";

/// A failure classified by this executor, fed to `JobStore::mark_failed`.
enum Classified {
    Transient(String),
    Permanent(String),
}

impl Classified {
    fn message(&self) -> &str {
        match self {
            Classified::Transient(m) | Classified::Permanent(m) => m,
        }
    }
}

pub struct PipelineExecutor {
    publisher_store: PublisherStore,
    document_store: DocumentStore,
    crawler: Arc<dyn Crawler>,
    llm: Arc<dyn LlmProvider>,
    breakers: Arc<CircuitBreakers>,
    call_timeout: Duration,
    embedding_model: String,
}

impl PipelineExecutor {
    pub fn new(
        publisher_store: PublisherStore,
        document_store: DocumentStore,
        crawler: Arc<dyn Crawler>,
        llm: Arc<dyn LlmProvider>,
        breakers: Arc<CircuitBreakers>,
        call_timeout: Duration,
        embedding_model: String,
    ) -> Self {
        Self {
            publisher_store,
            document_store,
            crawler,
            llm,
            breakers,
            call_timeout,
            embedding_model,
        }
    }

    /// Runs `job` (already claimed, status PROCESSING) to a terminal
    /// JobStore transition. Never propagates an error: every branch ends in
    /// either `mark_completed` + `release_slot(true)` or `mark_failed` +
    /// (conditionally) `release_slot(false)`.
    pub async fn run(&self, job: Job) {
        match self.execute(&job).await {
            Ok(result) => self.finish_success(&job, result).await,
            Err(classified) => self.finish_failure(&job, classified).await,
        }
    }

    async fn finish_success(&self, job: &Job, result: JobResult) {
        if let Err(e) = self.document_store.mark_completed(job.job_id, &result).await {
            // A crash or store error here leaves the publisher's reserved
            // slot over-counted until a reconciler sweep catches it — known
            // residual risk.
            tracing::error!(job_id = %job.job_id, error = %e, "mark_completed failed after successful pipeline run");
            return;
        }

        if let Err(e) = self
            .publisher_store
            .release_slot(job.publisher_id, true)
            .await
        {
            tracing::error!(job_id = %job.job_id, publisher_id = %job.publisher_id, error = %e, "release_slot(processed=true) failed after mark_completed");
        }

        metrics::counter!("pipeline.jobs.completed").increment(1);
    }

    async fn finish_failure(&self, job: &Job, classified: Classified) {
        tracing::warn!(job_id = %job.job_id, error = classified.message(), "job failed, classifying");

        let outcome = match self
            .document_store
            .mark_failed(job.job_id, classified.message())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job_id = %job.job_id, error = %e, "mark_failed itself failed");
                return;
            }
        };

        match outcome {
            MarkFailedOutcome::Requeued => {
                // Slot stays reserved: the job remains in the publisher's
                // committed quota until a future attempt completes or
                // permanently fails it.
                metrics::counter!("pipeline.jobs.requeued").increment(1);
            }
            MarkFailedOutcome::PermanentlyFailed => {
                if let Err(e) = self
                    .publisher_store
                    .release_slot(job.publisher_id, false)
                    .await
                {
                    tracing::error!(job_id = %job.job_id, publisher_id = %job.publisher_id, error = %e, "release_slot(processed=false) failed after permanent failure");
                }
                metrics::counter!("pipeline.jobs.failed_permanently").increment(1);
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<JobResult, Classified> {
        // job.config_snapshot is always populated at job creation, so there
        // is no PublisherStore fallback to reach here.
        let config = &job.config_snapshot;

        let crawl = self.crawl(&job.blog_url).await?;

        let blog_id = self
            .document_store
            .upsert_blog(&job.blog_url, &crawl.title, &crawl.text, serde_json::Value::Null)
            .await
            .map_err(|e| Classified::Transient(e.to_string()))?;

        let mut summary_generated = false;
        let mut summary_text: Option<String> = None;
        let mut summary_key_points: Vec<String> = Vec::new();
        let mut summary_embedding: Option<Vec<f32>> = None;

        if config.generate_summary {
            let (text, key_points) = self.generate_summary(config, &crawl.text).await?;
            summary_embedding = if config.generate_embeddings {
                Some(self.embed(&text).await?)
            } else {
                None
            };
            summary_text = Some(text);
            summary_key_points = key_points;
            summary_generated = true;
        }

        let mut questions = self.generate_questions(config, &crawl.text).await?;

        if config.generate_embeddings {
            for i in 0..questions.len() {
                let embedding = self.embed(&questions[i].0).await?;
                questions[i].2 = Some(embedding);
            }
        }
        let embeddings_generated = config.generate_embeddings;

        if let Some(text) = &summary_text {
            self.document_store
                .upsert_summary(&job.blog_url, text, summary_key_points.clone(), summary_embedding.clone())
                .await
                .map_err(|e| Classified::Transient(e.to_string()))?;
        }

        let questions_generated = questions.len() as u32;
        self.document_store
            .replace_questions(&job.blog_url, questions)
            .await
            .map_err(|e| Classified::Transient(e.to_string()))?;

        Ok(JobResult {
            blog_id,
            summary_generated,
            questions_generated,
            embeddings_generated,
        })
    }

    async fn crawl(&self, url: &str) -> Result<CrawlResult, Classified> {
        if !self.breakers.crawler.allow() {
            return Err(Classified::Transient(
                "crawler circuit breaker open".to_string(),
            ));
        }

        match tokio::time::timeout(self.call_timeout, self.crawler.crawl(url)).await {
            Ok(Ok(result)) => {
                self.breakers.crawler.record_success();
                Ok(result)
            }
            Ok(Err(e)) => {
                self.breakers.crawler.record_failure();
                match e.kind {
                    FailureKind::Transient => Err(Classified::Transient(e.message)),
                    FailureKind::Permanent => Err(Classified::Permanent(e.message)),
                }
            }
            Err(_elapsed) => {
                self.breakers.crawler.record_failure();
                Err(Classified::Transient(format!(
                    "crawl of {url} timed out after {:?}",
                    self.call_timeout
                )))
            }
        }
    }

    async fn call_llm(
        &self,
        system_prompt: &str,
        prompt: &str,
        model: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, Classified> {
        if !self.breakers.llm.allow() {
            return Err(Classified::Transient("llm circuit breaker open".to_string()));
        }

        let call = self
            .llm
            .generate_text(prompt, system_prompt, model, temperature, max_tokens);

        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(text)) => {
                self.breakers.llm.record_success();
                Ok(text)
            }
            Ok(Err(e)) => {
                self.breakers.llm.record_failure();
                if e.is_non_retryable() {
                    Err(Classified::Permanent(e.to_string()))
                } else {
                    Err(Classified::Transient(e.to_string()))
                }
            }
            Err(_elapsed) => {
                self.breakers.llm.record_failure();
                Err(Classified::Transient("llm call timed out".to_string()))
            }
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, Classified> {
        if !self.breakers.llm.allow() {
            return Err(Classified::Transient("llm circuit breaker open".to_string()));
        }

        let call = self.llm.generate_embedding(text, &self.embedding_model);
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(vector)) => {
                self.breakers.llm.record_success();
                Ok(vector)
            }
            Ok(Err(e)) => {
                self.breakers.llm.record_failure();
                if e.is_non_retryable() {
                    Err(Classified::Permanent(e.to_string()))
                } else {
                    Err(Classified::Transient(e.to_string()))
                }
            }
            Err(_elapsed) => {
                self.breakers.llm.record_failure();
                Err(Classified::Transient("embedding call timed out".to_string()))
            }
        }
    }

    /// Step 4: summary generation with one reformatting retry on parse
    /// failure before classifying the job TRANSIENT.
    async fn generate_summary(
        &self,
        config: &PublisherConfig,
        content: &str,
    ) -> Result<(String, Vec<String>), Classified> {
        let instruction = config
            .custom_summary_prompt
            .clone()
            .unwrap_or_else(default_summary_instruction);
        let prompt = format!("{instruction}\n\n---\n{content}");

        let raw = self
            .call_llm(
                JSON_ENFORCEMENT_SYSTEM_PROMPT,
                &prompt,
                &config.llm_model,
                config.temperature,
                config.max_tokens,
            )
            .await?;

        if let Ok(parsed) = parse_summary_json(&raw) {
            return Ok(parsed);
        }

        let reformat = format!(
            "{prompt}\n\nYour previous response could not be parsed as JSON. Respond with ONLY \
            a valid JSON object of the form {{\"text\": string, \"key_points\": [string, ...]}}."
        );
        let raw2 = self
            .call_llm(
                JSON_ENFORCEMENT_SYSTEM_PROMPT,
                &reformat,
                &config.llm_model,
                config.temperature,
                config.max_tokens,
            )
            .await?;

        parse_summary_json(&raw2)
            .map_err(|e| Classified::Transient(format!("summary JSON parse failed twice: {e}")))
    }

    /// Step 5: generates exactly `config.questions_per_blog` pairs, with one
    /// "produce exactly N" retry if the count doesn't match.
    async fn generate_questions(
        &self,
        config: &PublisherConfig,
        content: &str,
    ) -> Result<Vec<(String, String, Option<Vec<f32>>)>, Classified> {
        let n = config.questions_per_blog as usize;
        if n == 0 {
            return Ok(Vec::new());
        }

        let instruction = config
            .custom_question_prompt
            .clone()
            .unwrap_or_else(|| default_question_instruction(n));
        let prompt = format!("{instruction}\n\n---\n{content}");

        let raw = self
            .call_llm(
                JSON_ENFORCEMENT_SYSTEM_PROMPT,
                &prompt,
                &config.chat_model,
                config.chat_temperature,
                config.chat_max_tokens,
            )
            .await?;

        if let Ok(items) = parse_questions_json(&raw) {
            if items.len() == n {
                return Ok(into_question_tuples(items));
            }
        }

        let reformat = format!(
            "{prompt}\n\nProduce EXACTLY {n} question-answer pairs, no more and no fewer, as a \
            JSON object {{\"questions\": [{{\"question\": string, \"answer\": string}}, ...]}}."
        );
        let raw2 = self
            .call_llm(
                JSON_ENFORCEMENT_SYSTEM_PROMPT,
                &reformat,
                &config.chat_model,
                config.chat_temperature,
                config.chat_max_tokens,
            )
            .await?;

        let items2 = parse_questions_json(&raw2)
            .map_err(|e| Classified::Transient(format!("question JSON parse failed: {e}")))?;

        if items2.len() != n {
            return Err(Classified::Transient(format!(
                "expected {n} questions, got {}",
                items2.len()
            )));
        }

        Ok(into_question_tuples(items2))
    }
}

fn into_question_tuples(items: Vec<QuestionItem>) -> Vec<(String, String, Option<Vec<f32>>)> {
    items
        .into_iter()
        .map(|q| (q.question, q.answer, None))
        .collect()
}

#[derive(Deserialize)]
struct SummaryResponse {
    text: String,
    #[serde(default)]
    key_points: Vec<String>,
}

#[derive(Deserialize)]
struct QuestionItem {
    question: String,
    answer: String,
}

#[derive(Deserialize)]
struct QuestionsResponse {
    questions: Vec<QuestionItem>,
}

fn parse_summary_json(raw: &str) -> Result<(String, Vec<String>), serde_json::Error> {
    let stripped = blogpipe_llm::strip_json_fence(raw);
    let parsed: SummaryResponse = serde_json::from_str(stripped)?;
    Ok((parsed.text, parsed.key_points))
}

fn parse_questions_json(raw: &str) -> Result<Vec<QuestionItem>, serde_json::Error> {
    let stripped = blogpipe_llm::strip_json_fence(raw);
    let parsed: QuestionsResponse = serde_json::from_str(stripped)?;
    Ok(parsed.questions)
}

fn default_summary_instruction() -> String {
    "Summarize the blog content below in 2-4 sentences, and list 2-5 key points. Respond as JSON \
    of the form {\"text\": string, \"key_points\": [string, ...]}."
        .to_string()
}

fn default_question_instruction(n: usize) -> String {
    format!(
        "Generate exactly {n} question-and-answer pairs a reader of this blog post might ask, \
        based only on the content below. Respond as JSON of the form \
        {{\"questions\": [{{\"question\": string, \"answer\": string}}, ...]}}."
    )
}
