pub mod crawler;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod frontier;
pub mod link;
pub mod result;
pub mod score;

pub use crawler::{CrawlSettings, Crawler, ProgressCallback, ResultCallback};
pub use dispatch::{BatchOutcome, CrawlParams, Dispatcher, RetryPolicy};
pub use error::{CrawlError, DispatchError};
pub use filter::ScopeFilter;
pub use frontier::{Frontier, FrontierEntry};
pub use link::extract_links;
pub use result::{AggregateResult, CrawlOutcome, CrawlStats, PageResult, Termination};
pub use score::{PriorityScorer, ScoredCandidate};
pub use tokio_util::sync::CancellationToken;
