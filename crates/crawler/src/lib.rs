//! The crawler is an external collaborator, reached only through its
//! contract (`Crawler::crawl`). This is a thin, real implementation of that
//! contract; rate limiting, caching, and browser rendering are out of core
//! scope and not attempted here.

mod html;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use html::extract_readable_text;

/// Failure classification consumed by `JobStore::mark_failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
}

#[derive(Debug, thiserror::Error)]
#[error("crawl failed ({kind:?}): {message}")]
pub struct CrawlError {
    pub kind: FailureKind,
    pub message: String,
}

impl CrawlError {
    fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }
}

/// Result of a successful crawl: title + cleaned text.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub title: String,
    pub text: String,
}

/// Object-safe crawler contract, so the pipeline executor can be tested
/// against a mock implementation.
pub trait Crawler: Send + Sync {
    fn crawl<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CrawlResult, CrawlError>> + Send + 'a>>;
}

/// Real HTTP-based crawler: fetches the URL, strips boilerplate HTML, and
/// extracts a page title and readable text.
pub struct HttpCrawler {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpCrawler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent("BlogPipe-Crawler/0.1")
                .build()
                .expect("failed to build crawler HTTP client"),
            timeout,
        }
    }

    async fn fetch(&self, url: &str) -> Result<CrawlResult, CrawlError> {
        let start = std::time::Instant::now();

        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(CrawlError::transient(format!(
                "upstream returned status {status}"
            )));
        }
        if status.is_client_error() {
            return Err(CrawlError::permanent(format!(
                "upstream returned status {status}"
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.is_empty() && !content_type.contains("text/html") && !content_type.contains("text/plain") {
            return Err(CrawlError::permanent(format!(
                "unsupported content-type: {content_type}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::transient(format!("body read failed: {e}")))?;

        let title = html::extract_title(&body).unwrap_or_else(|| url.to_string());
        let text = html::extract_readable_text(&body);

        if text.trim().is_empty() {
            return Err(CrawlError::permanent("crawled page had no extractable text"));
        }

        metrics::histogram!("crawler.fetch.latency").record(start.elapsed().as_secs_f64());

        Ok(CrawlResult { title, text })
    }
}

impl Crawler for HttpCrawler {
    fn crawl<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CrawlResult, CrawlError>> + Send + 'a>> {
        Box::pin(self.fetch(url))
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> CrawlError {
    if e.is_timeout() {
        CrawlError::transient(format!("timeout: {e}"))
    } else if e.is_connect() {
        CrawlError::transient(format!("connect error: {e}"))
    } else if let Some(status) = e.status() {
        if status.as_u16() == 429 || status.is_server_error() {
            CrawlError::transient(format!("status {status}"))
        } else {
            CrawlError::permanent(format!("status {status}"))
        }
    } else {
        CrawlError::transient(format!("network error: {e}"))
    }
}
