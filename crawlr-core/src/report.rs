// Crawl report rendering

use crate::archive::ArchiveSummary;
use crate::crawl::extract_url_path;
use colored::Colorize;
use crawlr_engine::{CrawlOutcome, Termination};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => f.write_str("text"),
            ReportFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPage {
    pub url: String,
    pub host: String,
    pub path: String,
    pub markdown_bytes: usize,
    pub media_links: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveCounts {
    pub markdown_files: usize,
    pub media_files: usize,
    pub skipped_empty: usize,
    pub failures: usize,
    pub media_cancelled: bool,
}

impl From<&ArchiveSummary> for ArchiveCounts {
    fn from(summary: &ArchiveSummary) -> Self {
        Self {
            markdown_files: summary.markdown.len(),
            media_files: summary.media.len(),
            skipped_empty: summary.skipped_empty,
            failures: summary.failures.len(),
            media_cancelled: summary.media_cancelled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub seed: String,
    pub library: String,
    pub generated_at: String,
    pub success: bool,
    pub termination: Termination,
    pub pages_harvested: usize,
    pub urls_visited: usize,
    pub batches_dispatched: usize,
    pub batches_failed: usize,
    pub elapsed_secs: f64,
    pub failed_urls: Vec<String>,
    pub pages: Vec<ReportPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveCounts>,
}

impl CrawlReport {
    pub fn new(
        seed: &str,
        library: &str,
        outcome: &CrawlOutcome,
        archive: Option<&ArchiveSummary>,
    ) -> Self {
        let pages = outcome
            .aggregate
            .results
            .iter()
            .map(|page| ReportPage {
                url: page.url.clone(),
                host: Url::parse(&page.url)
                    .ok()
                    .and_then(|u| u.host_str().map(String::from))
                    .unwrap_or_default(),
                path: extract_url_path(&page.url),
                markdown_bytes: page.markdown.len(),
                media_links: page.media_links.len(),
            })
            .collect();

        Self {
            seed: seed.to_string(),
            library: library.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            success: outcome.aggregate.success,
            termination: outcome.termination,
            pages_harvested: outcome.aggregate.len(),
            urls_visited: outcome.stats.visited,
            batches_dispatched: outcome.stats.batches_dispatched,
            batches_failed: outcome.stats.batches_failed,
            elapsed_secs: outcome.stats.elapsed.as_secs_f64(),
            failed_urls: outcome.stats.failed_urls.clone(),
            pages,
            archive: archive.map(ArchiveCounts::from),
        }
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, serde_json::Error> {
        match format {
            ReportFormat::Text => Ok(generate_text_report(self)),
            ReportFormat::Json => generate_json_report(self),
        }
    }
}

pub fn generate_text_report(report: &CrawlReport) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push_str("\n\n# Summary:\n");
    out.push_str(&format!("  Seed: {}\n", report.seed));
    out.push_str(&format!("  Library: {}\n", report.library));
    out.push_str(&format!("  Pages harvested: {}\n", report.pages_harvested));
    out.push_str(&format!("  URLs visited: {}\n", report.urls_visited));
    out.push_str(&format!(
        "  Batches: {} dispatched, {} failed\n",
        report.batches_dispatched, report.batches_failed
    ));
    out.push_str(&format!("  Failed URLs: {}\n", report.failed_urls.len()));

    let termination = match report.termination {
        Termination::Cancelled => report.termination.as_str().yellow().to_string(),
        _ => report.termination.as_str().green().to_string(),
    };
    out.push_str(&format!("  Finished: {}\n", termination));
    out.push_str(&format!("  Elapsed: {:.1}s\n", report.elapsed_secs));

    if let Some(ref archive) = report.archive {
        out.push_str(&format!(
            "  Files written: {} markdown, {} media\n",
            archive.markdown_files, archive.media_files
        ));
        if archive.failures > 0 {
            out.push_str(&format!(
                "  Archive failures: {}\n",
                archive.failures.to_string().red()
            ));
        }
    }

    out.push('\n');
    out.push_str(RULE);
    out.push_str("\n\n");

    // BTreeMap keeps host order stable between runs
    let mut by_host: BTreeMap<&str, Vec<&ReportPage>> = BTreeMap::new();
    for page in &report.pages {
        by_host.entry(page.host.as_str()).or_default().push(page);
    }

    for (host, pages) in &by_host {
        out.push_str(&format!("## {}\n", host));
        out.push_str(&format!("  {} pages harvested\n\n", pages.len()));
        for page in pages {
            let mut line = format!("  {}", page.path);
            if page.media_links > 0 {
                line.push_str(&format!(" {}", format!("({} media)", page.media_links).dimmed()));
            }
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');
    }

    if !report.failed_urls.is_empty() {
        out.push_str("## Failed\n");
        for url in &report.failed_urls {
            out.push_str(&format!("  {}\n", url.red()));
        }
        out.push('\n');
    }

    out
}

pub fn generate_json_report(report: &CrawlReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "crawlr",
                "version": env!("CARGO_PKG_VERSION"),
                "format": "json"
            },
            "crawl": report
        }
    });
    serde_json::to_string_pretty(&json_report)
}
