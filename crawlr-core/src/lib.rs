pub mod archive;
pub mod config;
pub mod crawl;
pub mod error;
pub mod progress;
pub mod report;
pub mod storage;

pub use config::{LogOutput, Settings};
pub use error::{ConfigError, StorageError};
