use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// One page as returned by the crawl service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    pub success: bool,
    pub raw_html: String,
    pub markdown: String,
    pub media_links: Vec<String>,
    pub metadata: Map<String, Value>,
    pub error: Option<String>,
}

impl PageResult {
    pub fn new(url: String) -> Self {
        Self {
            url,
            success: true,
            raw_html: String::new(),
            markdown: String::new(),
            media_links: Vec::new(),
            metadata: Map::new(),
            error: None,
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        Self {
            url,
            success: false,
            raw_html: String::new(),
            markdown: String::new(),
            media_links: Vec::new(),
            metadata: Map::new(),
            error: Some(error),
        }
    }
}

/// Successful pages in the order they were processed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub success: bool,
    pub results: Vec<PageResult>,
}

impl AggregateResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.url.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No entries left to dispatch.
    FrontierDrained,
    /// The visited set reached `max_urls`.
    LimitReached,
    /// The cancellation token fired; results are partial.
    Cancelled,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::FrontierDrained => "frontier drained",
            Termination::LimitReached => "URL limit reached",
            Termination::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub visited: usize,
    pub batches_dispatched: usize,
    pub batches_failed: usize,
    pub failed_urls: Vec<String>,
    pub elapsed: Duration,
}

/// Everything a finished (or cancelled) run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub aggregate: AggregateResult,
    pub termination: Termination,
    pub stats: CrawlStats,
}

impl CrawlOutcome {
    pub fn is_partial(&self) -> bool {
        self.termination == Termination::Cancelled
    }
}
