// Tests for crawl report generation

use crawlr_core::archive::ArchiveSummary;
use crawlr_core::report::{CrawlReport, ReportFormat, generate_json_report, generate_text_report};
use crawlr_engine::{AggregateResult, CrawlOutcome, CrawlStats, PageResult, Termination};
use std::time::Duration;

fn outcome(termination: Termination) -> CrawlOutcome {
    let mut home = PageResult::new("https://docs.example.com/".to_string());
    home.markdown = "# Home".to_string();
    let mut guide = PageResult::new("https://docs.example.com/guide/intro".to_string());
    guide.media_links = vec!["/img/a.png".to_string(), "/img/b.png".to_string()];

    CrawlOutcome {
        aggregate: AggregateResult {
            success: termination != Termination::Cancelled,
            results: vec![home, guide],
        },
        termination,
        stats: CrawlStats {
            visited: 3,
            batches_dispatched: 2,
            batches_failed: 1,
            failed_urls: vec!["https://docs.example.com/broken".to_string()],
            elapsed: Duration::from_millis(1500),
        },
    }
}

#[test]
fn test_report_from_outcome() {
    let report = CrawlReport::new(
        "https://docs.example.com/",
        "docs",
        &outcome(Termination::FrontierDrained),
        None,
    );

    assert_eq!(report.pages_harvested, 2);
    assert_eq!(report.urls_visited, 3);
    assert_eq!(report.batches_failed, 1);
    assert_eq!(report.pages[0].path, "/");
    assert_eq!(report.pages[1].path, "/guide/intro");
    assert_eq!(report.pages[1].host, "docs.example.com");
    assert_eq!(report.pages[1].media_links, 2);
    assert!((report.elapsed_secs - 1.5).abs() < f64::EPSILON);
    assert!(report.archive.is_none());
}

#[test]
fn test_text_report_lists_pages_by_host() {
    let report = CrawlReport::new(
        "https://docs.example.com/",
        "docs",
        &outcome(Termination::LimitReached),
        Some(&ArchiveSummary::default()),
    );
    let text = generate_text_report(&report);

    assert!(text.contains("# Summary:"));
    assert!(text.contains("Pages harvested: 2"));
    assert!(text.contains("Batches: 2 dispatched, 1 failed"));
    assert!(text.contains("URL limit reached"));
    assert!(text.contains("## docs.example.com"));
    assert!(text.contains("  /guide/intro"));
    assert!(text.contains("## Failed"));
    assert!(text.contains("Files written: 0 markdown, 0 media"));
}

#[test]
fn test_json_report_round_trips() {
    let report = CrawlReport::new(
        "https://docs.example.com/",
        "docs",
        &outcome(Termination::Cancelled),
        None,
    );
    let json = generate_json_report(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["report"]["metadata"]["generator"], "crawlr");
    let crawl = &value["report"]["crawl"];
    assert_eq!(crawl["termination"], "cancelled");
    assert_eq!(crawl["success"], false);
    assert_eq!(crawl["pages"].as_array().unwrap().len(), 2);
    assert!(crawl.get("archive").is_none());
}

#[test]
fn test_report_format_parsing() {
    assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
    assert_eq!("text".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
    assert!("csv".parse::<ReportFormat>().is_err());

    let report = CrawlReport::new(
        "https://docs.example.com/",
        "docs",
        &outcome(Termination::FrontierDrained),
        None,
    );
    assert!(report.render(ReportFormat::Json).unwrap().starts_with('{'));
}
