use crate::dispatch::{BatchOutcome, CrawlParams, Dispatcher, RetryPolicy};
use crate::error::{CrawlError, Result};
use crate::filter::ScopeFilter;
use crate::frontier::{Frontier, FrontierEntry};
use crate::link::extract_links;
use crate::result::{AggregateResult, CrawlOutcome, CrawlStats, PageResult, Termination};
use crate::score::PriorityScorer;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Called with (visited so far, best estimate of total URLs).
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;
/// Called once for every page added to the aggregate result.
pub type ResultCallback = Arc<dyn Fn(&PageResult) + Send + Sync>;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    pub max_depth: usize,
    pub max_urls: usize,
    pub batch_size: usize,
    /// Batches in flight at once. 1 keeps dispatch strictly sequential.
    pub max_concurrent: usize,
    pub word_count_threshold: u32,
    pub exclude_patterns: Vec<String>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_urls: 100,
            batch_size: 10,
            max_concurrent: 1,
            word_count_threshold: 10,
            exclude_patterns: Vec::new(),
        }
    }
}

impl CrawlSettings {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CrawlError::Configuration("batch size must be at least 1".to_string()));
        }
        if self.max_urls == 0 {
            return Err(CrawlError::Configuration("max URLs must be at least 1".to_string()));
        }
        if self.max_concurrent == 0 {
            return Err(CrawlError::Configuration(
                "max concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-run state that is not the frontier.
struct RunState {
    aggregate: AggregateResult,
    harvested: HashSet<String>,
    stats: CrawlStats,
}

pub struct Crawler {
    dispatcher: Dispatcher,
    scorer: PriorityScorer,
    settings: CrawlSettings,
    progress_callback: Option<ProgressCallback>,
    result_callback: Option<ResultCallback>,
}

impl Crawler {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_timeout(server_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(server_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self::with_dispatcher(Dispatcher::new(server_url, timeout)?))
    }

    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            scorer: PriorityScorer::default(),
            settings: CrawlSettings::default(),
            progress_callback: None,
            result_callback: None,
        }
    }

    pub fn with_settings(mut self, settings: CrawlSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.settings.max_depth = depth;
        self
    }

    pub fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.settings.max_urls = max_urls;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.settings.batch_size = batch_size;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.settings.max_concurrent = max_concurrent;
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.settings.exclude_patterns = patterns;
        self
    }

    pub fn with_scorer(mut self, scorer: PriorityScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.dispatcher = self.dispatcher.with_api_token(token);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.dispatcher = self.dispatcher.with_retry_policy(retry);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    /// Crawl the site behind `seed` until the frontier drains, the URL limit
    /// is hit, or `cancel` fires.
    ///
    /// Failed batches and failed pages are logged and skipped. Cancellation
    /// is not an error: the pages harvested so far come back with
    /// `Termination::Cancelled`. Only a bad seed or bad settings fail the run.
    pub async fn crawl(&self, seed: &str, cancel: CancellationToken) -> Result<CrawlOutcome> {
        self.settings.validate()?;
        let scope = ScopeFilter::new(seed)?
            .with_exclude_patterns(self.settings.exclude_patterns.clone());

        let seed = scope.seed();

        info!(
            server = %self.dispatcher.endpoint(),
            exclude_patterns = scope.exclude_patterns().len(),
            "Starting crawl of {} (max depth {}, max URLs {}, batch size {}, {} in flight)",
            seed,
            self.settings.max_depth,
            self.settings.max_urls,
            self.settings.batch_size,
            self.settings.max_concurrent
        );

        let started = Instant::now();
        let params = CrawlParams {
            max_depth: self.settings.max_depth,
            max_urls: self.settings.max_urls,
            same_domain: true,
            word_count_threshold: self.settings.word_count_threshold,
        };
        let mut frontier = Frontier::seeded(seed, self.settings.max_depth, self.settings.max_urls);
        let mut state = RunState {
            aggregate: AggregateResult::default(),
            harvested: HashSet::new(),
            stats: CrawlStats::default(),
        };

        let round_size = self
            .settings
            .batch_size
            .saturating_mul(self.settings.max_concurrent);

        let termination = loop {
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping crawl");
                break Termination::Cancelled;
            }

            let entries = frontier.dequeue(round_size);
            if entries.is_empty() {
                break if frontier.limit_reached() {
                    Termination::LimitReached
                } else {
                    Termination::FrontierDrained
                };
            }
            self.report_progress(&frontier);

            let cancelled = self
                .run_round(entries, &params, &scope, &mut frontier, &mut state, &cancel)
                .await?;
            self.report_progress(&frontier);

            if cancelled {
                break Termination::Cancelled;
            }
        };

        let mut stats = state.stats;
        stats.visited = frontier.visited_count();
        stats.elapsed = started.elapsed();

        let mut aggregate = state.aggregate;
        aggregate.success = termination != Termination::Cancelled && !aggregate.is_empty();

        info!(
            pages = aggregate.len(),
            visited = stats.visited,
            failed_batches = stats.batches_failed,
            "Crawl complete ({})",
            termination.as_str()
        );

        Ok(CrawlOutcome {
            aggregate,
            termination,
            stats,
        })
    }

    /// Dispatch one round of batches and fold the results into the run.
    /// Returns true when the round was cut short by cancellation.
    async fn run_round(
        &self,
        entries: Vec<FrontierEntry>,
        params: &CrawlParams,
        scope: &ScopeFilter,
        frontier: &mut Frontier,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let depths: HashMap<String, usize> = entries
            .iter()
            .map(|e| (e.url.clone(), e.depth))
            .collect();
        let batches: Vec<Vec<String>> = entries
            .chunks(self.settings.batch_size)
            .map(|chunk| chunk.iter().map(|e| e.url.clone()).collect())
            .collect();

        let outcomes = self.dispatch_batches(&batches, params, cancel).await;

        let mut cancelled = false;
        let mut discovered: Vec<(String, usize)> = Vec::new();

        for (urls, outcome) in batches.iter().zip(outcomes) {
            state.stats.batches_dispatched += 1;
            match outcome {
                Ok(BatchOutcome::Delivered(pages)) => {
                    for page in pages {
                        let depth = depths.get(&page.url).copied().unwrap_or(self.settings.max_depth);
                        self.absorb_page(page, depth, scope, frontier, state, &mut discovered);
                    }
                }
                Ok(BatchOutcome::Failed { attempts, error }) => {
                    error!(
                        batch_size = urls.len(),
                        attempts,
                        error = %error,
                        "Batch failed, skipping"
                    );
                    state.stats.batches_failed += 1;
                    state.stats.failed_urls.extend(urls.iter().cloned());
                }
                Err(CrawlError::Cancelled) => {
                    cancelled = true;
                    state.stats.failed_urls.extend(urls.iter().cloned());
                }
                Err(e) => return Err(e),
            }
        }

        if !cancelled {
            self.enqueue_discovered(discovered, frontier);
        }
        Ok(cancelled)
    }

    async fn dispatch_batches(
        &self,
        batches: &[Vec<String>],
        params: &CrawlParams,
        cancel: &CancellationToken,
    ) -> Vec<Result<BatchOutcome>> {
        let dispatcher = &self.dispatcher;
        // buffered() yields outcomes in submission order
        stream::iter(batches.iter())
            .map(|urls| async move { dispatcher.dispatch(urls, params, cancel).await })
            .buffered(self.settings.max_concurrent)
            .collect()
            .await
    }

    fn absorb_page(
        &self,
        page: PageResult,
        depth: usize,
        scope: &ScopeFilter,
        frontier: &Frontier,
        state: &mut RunState,
        discovered: &mut Vec<(String, usize)>,
    ) {
        if !page.success {
            warn!(
                url = %page.url,
                error = page.error.as_deref().unwrap_or("unknown"),
                "Page crawl failed"
            );
            state.stats.failed_urls.push(page.url);
            return;
        }

        if !frontier.is_visited(&page.url) || !state.harvested.insert(page.url.clone()) {
            warn!(url = %page.url, "Dropping result for URL that was not dispatched once");
            return;
        }

        if depth < self.settings.max_depth {
            let links = extract_links(&page.raw_html, &page.url);
            let in_scope = scope.filter(links, frontier.visited());
            debug!(url = %page.url, depth, new_links = in_scope.len(), "Expanded page");
            discovered.extend(in_scope.into_iter().map(|url| (url, depth + 1)));
        }

        if let Some(ref callback) = self.result_callback {
            callback(&page);
        }
        state.aggregate.results.push(page);
    }

    /// Score everything found this round together and queue it as one batch.
    fn enqueue_discovered(&self, discovered: Vec<(String, usize)>, frontier: &mut Frontier) {
        if discovered.is_empty() {
            return;
        }

        let mut depth_of: HashMap<String, usize> = HashMap::new();
        let mut unique = Vec::new();
        for (url, depth) in discovered {
            if frontier.is_visited(&url) || depth_of.contains_key(&url) {
                continue;
            }
            depth_of.insert(url.clone(), depth);
            unique.push(url);
        }

        let entries: Vec<FrontierEntry> = self
            .scorer
            .rank(unique)
            .into_iter()
            .filter_map(|candidate| {
                let depth = depth_of.get(&candidate.url).copied()?;
                Some(FrontierEntry::new(candidate.url, depth))
            })
            .collect();

        let queued = frontier.enqueue_many(entries);
        debug!(queued, pending = frontier.len(), "Queued discovered links");
    }

    fn report_progress(&self, frontier: &Frontier) {
        if let Some(ref callback) = self.progress_callback {
            let visited = frontier.visited_count();
            let total = visited
                .saturating_add(frontier.len())
                .min(frontier.max_urls());
            callback(visited, total);
        }
    }
}
