//! Batch submission to the crawl4ai service, with retry and backoff.

use crate::error::{CrawlError, DispatchError, Result};
use crate::result::PageResult;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// How many times a batch is sent and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            unit,
        }
    }

    /// Wait before attempt `attempt` (0-based): `attempt²` units.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt.saturating_mul(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF_UNIT)
    }
}

/// Per-request crawl parameters forwarded to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlParams {
    pub max_depth: usize,
    pub max_urls: usize,
    pub same_domain: bool,
    pub word_count_threshold: u32,
}

impl Default for CrawlParams {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_urls: 100,
            same_domain: true,
            word_count_threshold: 10,
        }
    }
}

#[derive(Debug, Serialize)]
struct CrawlRequest<'a> {
    urls: &'a [String],
    include_raw_html: bool,
    crawler_config: CrawlerConfig,
}

#[derive(Debug, Serialize)]
struct CrawlerConfig {
    max_depth: usize,
    max_urls: usize,
    strategy: &'static str,
    external_links: bool,
    only_text: bool,
    word_count_threshold: u32,
}

#[derive(Debug, Deserialize)]
pub struct CrawlResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Vec<RawPage>,
    #[serde(default)]
    pub server_processing_time_s: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RawPage {
    pub url: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub markdown: Option<MarkdownField>,
    #[serde(default)]
    pub media: Option<Media>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Older servers send markdown as a plain string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MarkdownField {
    Plain(String),
    Structured {
        #[serde(default)]
        raw_markdown: String,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub images: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
pub struct MediaItem {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    detail: Option<Value>,
}

impl From<RawPage> for PageResult {
    fn from(raw: RawPage) -> Self {
        let markdown = match raw.markdown {
            Some(MarkdownField::Plain(text)) => text,
            Some(MarkdownField::Structured { raw_markdown }) => raw_markdown,
            None => String::new(),
        };
        let media_links = raw
            .media
            .unwrap_or_default()
            .images
            .into_iter()
            .filter_map(|item| item.url)
            .filter(|url| !url.trim().is_empty())
            .collect();
        let error = if raw.success {
            None
        } else {
            Some(
                raw.error_message
                    .unwrap_or_else(|| "Service marked page unsuccessful".to_string()),
            )
        };

        Self {
            url: raw.url,
            success: raw.success,
            raw_html: raw.html.unwrap_or_default(),
            markdown,
            media_links,
            metadata: raw.metadata.unwrap_or_default(),
            error,
        }
    }
}

/// Result of dispatching one batch. Failure here is recoverable: the caller
/// logs it and moves on.
#[derive(Debug)]
pub enum BatchOutcome {
    /// One result per submitted URL, in submission order.
    Delivered(Vec<PageResult>),
    /// Every attempt failed.
    Failed { attempts: u32, error: DispatchError },
}

pub struct Dispatcher {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(server_url).map_err(|e| {
            CrawlError::Configuration(format!("Invalid server URL '{}': {}", server_url, e))
        })?;
        let endpoint = format!("{}/crawl", base.as_str().trim_end_matches('/'));

        let client = Client::builder()
            .user_agent(concat!("crawlr/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_token: None,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Submit `urls` as one batch, retrying failed attempts with backoff.
    ///
    /// Only cancellation during a backoff wait is returned as an error; a
    /// request already sent is allowed to finish.
    pub async fn dispatch(
        &self,
        urls: &[String],
        params: &CrawlParams,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome> {
        if urls.is_empty() {
            return Ok(BatchOutcome::Delivered(Vec::new()));
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_before(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(batch_size = urls.len(), "Cancelled while waiting to retry batch");
                        return Err(CrawlError::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match self.send(urls, params).await {
                Ok(response) => {
                    info!(
                        batch_size = urls.len(),
                        returned = response.results.len(),
                        server_time_s = response.server_processing_time_s.unwrap_or_default(),
                        "Batch crawled"
                    );
                    return Ok(BatchOutcome::Delivered(correlate(urls, response)));
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Batch attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Ok(BatchOutcome::Failed {
            attempts: max_attempts,
            error: last_error.unwrap_or(DispatchError::Rejected),
        })
    }

    async fn send(
        &self,
        urls: &[String],
        params: &CrawlParams,
    ) -> std::result::Result<CrawlResponse, DispatchError> {
        let body = CrawlRequest {
            urls,
            include_raw_html: true,
            crawler_config: CrawlerConfig {
                max_depth: params.max_depth,
                max_urls: params.max_urls,
                strategy: "bfs",
                external_links: !params.same_domain,
                only_text: true,
                word_count_threshold: params.word_count_threshold,
            },
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref token) = self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "Crawl service responded");

        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(api_error(status.as_u16(), &text));
        }

        let parsed: CrawlResponse = serde_json::from_str(&text)?;
        if !parsed.success {
            return Err(DispatchError::Rejected);
        }
        Ok(parsed)
    }
}

fn api_error(status_code: u16, body: &str) -> DispatchError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or_else(|| match parsed.detail {
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
            None => None,
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    DispatchError::Api {
        status_code,
        message,
        details: parsed.details,
    }
}

fn correlation_key(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Match results to the submitted URLs by URL, not by position. Exact URL
/// matches are taken first; a result differing only by a trailing `/` is
/// used for a URL that has no exact match. A submitted URL with no matching
/// result becomes a failed page.
pub fn correlate(urls: &[String], response: CrawlResponse) -> Vec<PageResult> {
    let mut remaining: Vec<RawPage> = Vec::with_capacity(response.results.len());
    for raw in response.results {
        if remaining.iter().any(|r| r.url == raw.url) {
            debug!(url = %raw.url, "Ignoring duplicate result");
            continue;
        }
        remaining.push(raw);
    }

    let mut matched: Vec<Option<RawPage>> = urls
        .iter()
        .map(|url| {
            let index = remaining.iter().position(|r| r.url == *url)?;
            Some(remaining.remove(index))
        })
        .collect();

    for (url, slot) in urls.iter().zip(matched.iter_mut()) {
        if slot.is_some() {
            continue;
        }
        let key = correlation_key(url);
        if let Some(index) = remaining.iter().position(|r| correlation_key(&r.url) == key) {
            *slot = Some(remaining.remove(index));
        }
    }

    for extra in &remaining {
        debug!(url = %extra.url, "Ignoring result for URL that was not submitted");
    }

    urls.iter()
        .zip(matched)
        .map(|(url, raw)| match raw {
            Some(raw) => {
                let mut page = PageResult::from(raw);
                page.url = url.clone();
                page
            }
            None => {
                warn!(url = %url, "No result returned for URL");
                PageResult::with_error(url.clone(), "Missing from service response".to_string())
            }
        })
        .collect()
}
