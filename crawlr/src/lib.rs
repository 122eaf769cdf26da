pub mod commands;
pub mod handlers;

pub use handlers::{apply_overrides, settings_from_matches};

// Re-export crawl functionality from crawlr-core
pub use crawlr_core::crawl::{CrawlResultCallback, execute_crawl, extract_url_path};
pub use crawlr_core::report::{CrawlReport, ReportFormat};
