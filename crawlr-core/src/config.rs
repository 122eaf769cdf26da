//! Layered settings for a crawl run.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `CRAWLR_*` environment variables. The CLI applies its flags on top of the
//! result before calling [`Settings::validate`].

use crate::error::ConfigError;
use crawlr_engine::{CrawlSettings, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const ENV_PREFIX: &str = "CRAWLR_";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:11235/";

/// Searched in order when no explicit config path is given.
pub const CONFIG_SEARCH_PATHS: [&str; 2] = ["config/config.toml", "config.toml"];

const LOG_LEVELS: [&str; 4] = ["DEBUG", "INFO", "WARN", "ERROR"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    pub fn writes_console(&self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    pub fn writes_file(&self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "console" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            other => Err(ConfigError::invalid(
                "log_output",
                format!("'{}' is not one of console, file, both", other),
            )),
        }
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogOutput::Console => "console",
            LogOutput::File => "file",
            LogOutput::Both => "both",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seed URL.
    pub url: String,
    /// Library name, sanitised into a directory under `output`.
    pub library: String,
    /// Output folder. `~` is expanded.
    pub output: String,

    pub server_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Whole-run timeout in seconds, 0 disables it.
    pub run_timeout: u64,

    pub max_concurrent: usize,
    pub max_depth: usize,
    pub max_urls: usize,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_unit_ms: u64,
    pub word_count_threshold: u32,
    pub exclude_patterns: Vec<String>,

    pub include_media: bool,
    pub overwrite_files: bool,

    pub log_level: String,
    pub log_output: LogOutput,
    pub log_file_path: String,
    pub log_include_time: bool,
    pub log_structured: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: String::new(),
            library: String::new(),
            output: String::new(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_token: None,
            timeout: 30,
            run_timeout: 0,
            max_concurrent: 1,
            max_depth: 2,
            max_urls: 100,
            batch_size: 10,
            max_attempts: 3,
            backoff_unit_ms: 1000,
            word_count_threshold: 10,
            exclude_patterns: Vec::new(),
            include_media: true,
            overwrite_files: false,
            log_level: "INFO".to_string(),
            log_output: LogOutput::Console,
            log_file_path: "crawlr.log".to_string(),
            log_include_time: true,
            log_structured: false,
        }
    }
}

impl Settings {
    /// Defaults, then the config file (if any), then the process environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match locate_config(config_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env(std::env::vars())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply every `CRAWLR_<KEY>` pair from `vars`. Unknown keys are ignored.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let key = key.to_lowercase();
            if self.set(&key, &value)? {
                debug!(key = %key, "Setting overridden from environment");
            }
        }
        Ok(())
    }

    /// Set one setting from its string form. Returns false for unknown keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool, ConfigError> {
        match key {
            "url" => self.url = value.to_string(),
            "library" => self.library = value.to_string(),
            "output" => self.output = value.to_string(),
            "server_url" => self.server_url = value.to_string(),
            "api_token" => {
                self.api_token = Some(value.to_string()).filter(|t| !t.is_empty());
            }
            "timeout" => self.timeout = parse_value(key, value)?,
            "run_timeout" => self.run_timeout = parse_value(key, value)?,
            "max_concurrent" => self.max_concurrent = parse_value(key, value)?,
            "max_depth" => self.max_depth = parse_value(key, value)?,
            "max_urls" => self.max_urls = parse_value(key, value)?,
            "batch_size" => self.batch_size = parse_value(key, value)?,
            "max_attempts" => self.max_attempts = parse_value(key, value)?,
            "backoff_unit_ms" => self.backoff_unit_ms = parse_value(key, value)?,
            "word_count_threshold" => self.word_count_threshold = parse_value(key, value)?,
            "exclude_patterns" => {
                self.exclude_patterns = value
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect();
            }
            "include_media" => self.include_media = parse_bool(key, value)?,
            "overwrite_files" => self.overwrite_files = parse_bool(key, value)?,
            "log_level" => self.log_level = value.to_string(),
            "log_output" => self.log_output = value.parse()?,
            "log_file_path" => self.log_file_path = value.to_string(),
            "log_include_time" => self.log_include_time = parse_bool(key, value)?,
            "log_structured" => self.log_structured = parse_bool(key, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Missing("url"));
        }
        if self.library.trim().is_empty() {
            return Err(ConfigError::Missing("library"));
        }
        if self.output.trim().is_empty() {
            return Err(ConfigError::Missing("output"));
        }

        let seed = Url::parse(&self.url)
            .map_err(|e| ConfigError::invalid("url", format!("'{}': {}", self.url, e)))?;
        if seed.host_str().is_none() {
            return Err(ConfigError::invalid("url", format!("'{}' has no host", self.url)));
        }
        Url::parse(&self.server_url).map_err(|e| {
            ConfigError::invalid("server_url", format!("'{}': {}", self.server_url, e))
        })?;

        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be at least 1"));
        }
        if self.max_urls == 0 {
            return Err(ConfigError::invalid("max_urls", "must be at least 1"));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::invalid("max_concurrent", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_uppercase().as_str()) {
            return Err(ConfigError::invalid(
                "log_level",
                format!("'{}' is not one of {}", self.log_level, LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }

    /// Level name understood by `tracing_subscriber::EnvFilter`.
    pub fn tracing_level(&self) -> String {
        self.log_level.to_lowercase()
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.output).into_owned())
    }

    pub fn log_file(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.log_file_path).into_owned())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        (self.run_timeout > 0).then(|| Duration::from_secs(self.run_timeout))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_unit_ms))
    }

    pub fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            max_depth: self.max_depth,
            max_urls: self.max_urls,
            batch_size: self.batch_size,
            max_concurrent: self.max_concurrent,
            word_count_threshold: self.word_count_threshold,
            exclude_patterns: self.exclude_patterns.clone(),
        }
    }
}

/// The config file to read: `explicit` if given (it must exist), otherwise
/// the first of [`CONFIG_SEARCH_PATHS`] that exists.
pub fn locate_config(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        return Ok(Some(path.to_path_buf()));
    }

    Ok(CONFIG_SEARCH_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.is_file()))
}

/// A commented config file holding every default.
pub fn default_toml() -> Result<String, ConfigError> {
    let body = toml::to_string_pretty(&Settings::default())?;
    Ok(format!(
        "# crawlr configuration\n\
         # Every key can also be set with a CRAWLR_<KEY> environment variable.\n\
         # Command-line flags take precedence over both.\n\n{}",
        body
    ))
}

/// Write [`default_toml`] to `path`, refusing to replace an existing file
/// unless `force` is set.
pub fn write_default_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, default_toml()?).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("'{}': {}", value, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, format!("'{}' is not a boolean", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Settings {
        Settings {
            url: "https://docs.example.com/".to_string(),
            library: "example docs".to_string(),
            output: "/tmp/out".to_string(),
            ..Settings::default()
        }
    }

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server_url, "http://localhost:11235/");
        assert_eq!(settings.timeout, 30);
        assert_eq!(settings.max_concurrent, 1);
        assert_eq!(settings.max_depth, 2);
        assert_eq!(settings.max_urls, 100);
        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.max_attempts, 3);
        assert!(settings.include_media);
        assert!(!settings.overwrite_files);
        assert_eq!(settings.log_output, LogOutput::Console);
        assert_eq!(settings.run_deadline(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            url = "https://docs.example.com/"
            max_depth = 4
            exclude_patterns = ["/blog/"]
            log_output = "both"
            "#,
        )
        .unwrap();
        assert_eq!(settings.max_depth, 4);
        assert_eq!(settings.exclude_patterns, vec!["/blog/"]);
        assert_eq!(settings.log_output, LogOutput::Both);
        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = valid();
        settings
            .apply_env(env(&[
                ("CRAWLR_MAX_URLS", "7"),
                ("CRAWLR_INCLUDE_MEDIA", "false"),
                ("CRAWLR_EXCLUDE_PATTERNS", "/blog/, /tag/ ,"),
                ("CRAWLR_LOG_OUTPUT", "FILE"),
                ("CRAWLR_UNKNOWN_KEY", "ignored"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();
        assert_eq!(settings.max_urls, 7);
        assert!(!settings.include_media);
        assert_eq!(settings.exclude_patterns, vec!["/blog/", "/tag/"]);
        assert_eq!(settings.log_output, LogOutput::File);
    }

    #[test]
    fn test_env_rejects_bad_number() {
        let mut settings = valid();
        let err = settings
            .apply_env(env(&[("CRAWLR_BATCH_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "batch_size"));
    }

    #[test]
    fn test_validate_requires_fields() {
        assert!(matches!(
            Settings::default().validate(),
            Err(ConfigError::Missing("url"))
        ));
        let mut settings = valid();
        settings.library = " ".to_string();
        assert!(matches!(settings.validate(), Err(ConfigError::Missing("library"))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = valid();
        settings.url = "not a url".to_string();
        assert!(settings.validate().is_err());

        let mut settings = valid();
        settings.batch_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = valid();
        settings.log_level = "chatty".to_string();
        assert!(settings.validate().is_err());

        let mut settings = valid();
        settings.log_level = "debug".to_string();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.tracing_level(), "debug");
    }

    #[test]
    fn test_conversions() {
        let mut settings = valid();
        settings.run_timeout = 90;
        settings.backoff_unit_ms = 250;
        settings.max_concurrent = 4;

        assert_eq!(settings.run_deadline(), Some(Duration::from_secs(90)));
        assert_eq!(settings.retry_policy().unit, Duration::from_millis(250));
        assert_eq!(settings.retry_policy().max_attempts, 3);
        let crawl = settings.crawl_settings();
        assert_eq!(crawl.max_concurrent, 4);
        assert_eq!(crawl.batch_size, 10);
    }

    #[test]
    fn test_default_toml_parses_back() {
        let text = default_toml().unwrap();
        assert!(text.starts_with("# crawlr configuration"));
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn test_log_output_parse() {
        assert_eq!("Console".parse::<LogOutput>().unwrap(), LogOutput::Console);
        assert!("syslog".parse::<LogOutput>().is_err());
        assert!(LogOutput::Both.writes_console() && LogOutput::Both.writes_file());
        assert!(!LogOutput::File.writes_console());
    }
}
