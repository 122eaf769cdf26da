// Tests for loading and writing config files

use crawlr_core::config::{Settings, locate_config, write_default_config};
use crawlr_core::{ConfigError, LogOutput};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_from_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crawlr.toml");
    fs::write(
        &path,
        r#"
url = "https://docs.example.com/"
library = "docs"
output = "~/archive"
server_url = "http://crawl4ai.internal:11235/"
max_concurrent = 3
include_media = false
log_output = "file"
"#,
    )
    .unwrap();

    let settings = Settings::from_file(&path).unwrap();
    assert_eq!(settings.server_url, "http://crawl4ai.internal:11235/");
    assert_eq!(settings.max_concurrent, 3);
    assert!(!settings.include_media);
    assert_eq!(settings.log_output, LogOutput::File);
    assert_eq!(settings.max_urls, 100);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_from_file_reports_parse_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "max_depth = \"deep\"").unwrap();

    assert!(matches!(
        Settings::from_file(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        locate_config(Some(&missing)),
        Err(ConfigError::Read { .. })
    ));
}

#[test]
fn test_write_default_config_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config").join("config.toml");

    write_default_config(&path, false).unwrap();
    let written = Settings::from_file(&path).unwrap();
    assert_eq!(written, Settings::default());

    assert!(matches!(
        write_default_config(&path, false),
        Err(ConfigError::AlreadyExists(_))
    ));
    write_default_config(&path, true).unwrap();
}
