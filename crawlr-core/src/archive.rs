//! Writes harvested pages into the library: markdown for every page, then
//! the images they reference. Per-file failures are logged and counted,
//! never fatal.

use crate::error::{StorageError, StorageResult};
use crate::progress::ProgressSink;
use crate::storage::{FileInfo, Storage};
use crawlr_engine::PageResult;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

pub const MEDIA_ACCEPT: &str =
    "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFailure {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub markdown: Vec<FileInfo>,
    pub media: Vec<FileInfo>,
    /// Pages that came back with no markdown.
    pub skipped_empty: usize,
    pub failures: Vec<ArchiveFailure>,
    /// Media downloads were cut short by cancellation.
    pub media_cancelled: bool,
}

impl ArchiveSummary {
    pub fn files_written(&self) -> usize {
        self.markdown.len() + self.media.len()
    }

    fn record_failure(&mut self, url: &str, err: &StorageError) {
        self.failures.push(ArchiveFailure {
            url: url.to_string(),
            error: err.to_string(),
        });
    }
}

pub struct Archiver {
    storage: Storage,
    client: Client,
    api_token: Option<String>,
}

impl Archiver {
    pub fn new(storage: Storage, timeout: Duration) -> StorageResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("crawlr/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(StorageError::Client)?;
        Ok(Self {
            storage,
            client,
            api_token: None,
        })
    }

    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn archive(
        &self,
        pages: &[PageResult],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ArchiveSummary {
        let mut summary = ArchiveSummary::default();

        for page in pages.iter().filter(|p| p.success) {
            if page.markdown.trim().is_empty() {
                debug!(url = %page.url, "No markdown for page");
                summary.skipped_empty += 1;
                continue;
            }
            match self.storage.save_markdown(&page.markdown, &page.url) {
                Ok(info) => summary.markdown.push(info),
                Err(e) => {
                    error!(url = %page.url, error = %e, "Failed to save markdown");
                    summary.record_failure(&page.url, &e);
                }
            }
        }

        if !self.storage.include_media() {
            return summary;
        }

        let media = collect_media(pages);
        progress.set_total(media.len());

        for (i, media_url) in media.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(remaining = media.len() - i, "Media download cancelled");
                summary.media_cancelled = true;
                break;
            }
            progress.set_current(i);

            match self.download(media_url).await {
                Ok(Some(info)) => {
                    info!(path = %info.path.display(), size = info.size, "Saved media file");
                    summary.media.push(info);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(url = %media_url, error = %e, "Failed to archive media file");
                    summary.record_failure(media_url.as_str(), &e);
                }
            }
        }

        if !summary.media_cancelled {
            progress.set_current(media.len());
        }
        progress.finish(&format!("{} media files saved", summary.media.len()));
        summary
    }

    async fn download(&self, media_url: &Url) -> StorageResult<Option<FileInfo>> {
        let mut request = self.client.get(media_url.as_str()).header(ACCEPT, MEDIA_ACCEPT);
        if let Some(ref token) = self.api_token {
            request = request.bearer_auth(token);
        }

        let download_err = |source| StorageError::Download {
            url: media_url.to_string(),
            source,
        };
        let response = request.send().await.map_err(download_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::DownloadStatus {
                url: media_url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(download_err)?;

        let filename = media_filename(media_url);
        self.storage
            .save_media_file(&mut &bytes[..], media_url.as_str(), &filename)
    }
}

/// Image URLs from every successful page, resolved against the page URL and
/// deduplicated in first-seen order. Inline `data:` images are skipped.
pub fn collect_media(pages: &[PageResult]) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut media = Vec::new();

    for page in pages.iter().filter(|p| p.success) {
        let Ok(base) = Url::parse(&page.url) else {
            error!(url = %page.url, "Failed to parse page URL for media");
            continue;
        };
        for link in &page.media_links {
            let resolved = match base.join(link.trim()) {
                Ok(url) => url,
                Err(e) => {
                    error!(url = %link, error = %e, "Failed to resolve media URL");
                    continue;
                }
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            if seen.insert(resolved.to_string()) {
                media.push(resolved);
            }
        }
    }

    media
}

fn media_filename(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| "media".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, media: &[&str]) -> PageResult {
        let mut page = PageResult::new(url.to_string());
        page.markdown = format!("# {}", url);
        page.media_links = media.iter().map(|m| m.to_string()).collect();
        page
    }

    #[test]
    fn test_collect_media_resolves_and_dedups() {
        let pages = vec![
            page("https://site.test/docs/a", &["../img/logo.png", "diagram.svg"]),
            page("https://site.test/b", &["/img/logo.png", "data:image/png;base64,AAAA"]),
        ];
        let media: Vec<String> = collect_media(&pages).iter().map(|u| u.to_string()).collect();
        assert_eq!(
            media,
            vec![
                "https://site.test/img/logo.png",
                "https://site.test/docs/diagram.svg",
            ]
        );
    }

    #[test]
    fn test_collect_media_ignores_failed_pages() {
        let failed = PageResult::with_error("https://site.test/x".to_string(), "boom".to_string());
        assert!(collect_media(&[failed]).is_empty());
    }

    #[test]
    fn test_media_filename() {
        let url = Url::parse("https://site.test/img/logo.png?v=2").unwrap();
        assert_eq!(media_filename(&url), "logo.png");
        let root = Url::parse("https://site.test/").unwrap();
        assert_eq!(media_filename(&root), "media");
    }
}
