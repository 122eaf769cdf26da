use thiserror::Error;

/// Errors that end a crawl run. Everything else is recovered inside the run.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Crawl cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CrawlError>;

/// Why a single dispatch attempt failed. Always eligible for retry.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error: {status_code} - {message}")]
    Api {
        status_code: u16,
        message: String,
        details: Option<String>,
    },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Service rejected the batch")]
    Rejected,
}

impl DispatchError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DispatchError::Api { status_code, .. } => Some(*status_code),
            DispatchError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
