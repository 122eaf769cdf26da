use crate::config::Settings;
use crate::progress::ProgressSink;
use crawlr_engine::{CrawlError, CrawlOutcome, Crawler, PageResult, ProgressCallback};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

/// Callback for reporting individual pages as they are harvested
pub type CrawlResultCallback = Arc<dyn Fn(&PageResult) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Build a crawler from validated settings.
pub fn build_crawler(settings: &Settings) -> Result<Crawler, CrawlError> {
    Ok(
        Crawler::with_timeout(&settings.server_url, settings.request_timeout())?
            .with_settings(settings.crawl_settings())
            .with_api_token(settings.api_token.clone())
            .with_retry_policy(settings.retry_policy()),
    )
}

/// Run a crawl of `settings.url`, reporting progress to `progress`.
///
/// Cancellation returns the partial outcome rather than an error.
pub async fn execute_crawl(
    settings: &Settings,
    progress: Arc<dyn ProgressSink>,
    result_callback: Option<CrawlResultCallback>,
    cancel: CancellationToken,
) -> Result<CrawlOutcome, CrawlError> {
    let sink = progress.clone();
    let progress_callback: ProgressCallback = Arc::new(move |current, total| {
        sink.set_total(total);
        sink.set_current(current);
    });

    let mut crawler = build_crawler(settings)?.with_progress_callback(progress_callback);
    if let Some(callback) = result_callback {
        crawler = crawler.with_result_callback(callback);
    }

    info!(url = %settings.url, server = %settings.server_url, "Starting crawl");
    let outcome = crawler.crawl(&settings.url, cancel).await?;

    progress.finish(&format!(
        "Crawl {}: {} pages harvested",
        outcome.termination.as_str(),
        outcome.aggregate.len()
    ));
    Ok(outcome)
}
