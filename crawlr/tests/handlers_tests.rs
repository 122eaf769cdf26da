use crawlr::commands::command_argument_builder;
use crawlr::handlers::{apply_overrides, handle_init, settings_from_matches};
use crawlr_core::{LogOutput, Settings};
use std::fs;
use tempfile::TempDir;

fn sub_matches(args: &[&str]) -> clap::ArgMatches {
    let matches = command_argument_builder()
        .try_get_matches_from(args)
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    sub.clone()
}

#[test]
fn test_crawl_flags_override_settings() {
    let args = sub_matches(&[
        "crawlr",
        "crawl",
        "-u",
        "https://docs.example.com/",
        "-l",
        "docs",
        "-o",
        "/tmp/out",
        "--server-url",
        "http://crawl4ai.internal:11235/",
        "--max-depth",
        "4",
        "--max-urls",
        "250",
        "--batch-size",
        "5",
        "--max-concurrent",
        "2",
        "--run-timeout",
        "600",
        "-x",
        "/blog/",
        "-x",
        "/tag/",
        "--no-media",
        "--overwrite",
        "--log-output",
        "both",
    ]);

    let mut settings = Settings::default();
    apply_overrides(&mut settings, &args).unwrap();

    assert_eq!(settings.url, "https://docs.example.com/");
    assert_eq!(settings.library, "docs");
    assert_eq!(settings.output, "/tmp/out");
    assert_eq!(settings.server_url, "http://crawl4ai.internal:11235/");
    assert_eq!(settings.max_depth, 4);
    assert_eq!(settings.max_urls, 250);
    assert_eq!(settings.batch_size, 5);
    assert_eq!(settings.max_concurrent, 2);
    assert_eq!(settings.run_timeout, 600);
    assert_eq!(settings.exclude_patterns, vec!["/blog/", "/tag/"]);
    assert!(!settings.include_media);
    assert!(settings.overwrite_files);
    assert_eq!(settings.log_output, LogOutput::Both);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_unset_flags_keep_settings() {
    let args = sub_matches(&["crawlr", "crawl", "-u", "https://docs.example.com/"]);
    let mut settings = Settings {
        max_depth: 7,
        include_media: true,
        ..Settings::default()
    };
    apply_overrides(&mut settings, &args).unwrap();

    assert_eq!(settings.max_depth, 7);
    assert!(settings.include_media);
    assert_eq!(settings.batch_size, 10);
}

#[test]
fn test_flags_take_precedence_over_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("crawlr.toml");
    fs::write(
        &config,
        "url = \"https://docs.example.com/\"\nlibrary = \"from-file\"\noutput = \"/tmp/x\"\nmax_urls = 20\n",
    )
    .unwrap();
    let config_arg = config.to_string_lossy().into_owned();

    let args = sub_matches(&["crawlr", "crawl", "--config", &config_arg, "-l", "from-flag"]);
    let settings = settings_from_matches(&args).unwrap();

    assert_eq!(settings.library, "from-flag");
    assert_eq!(settings.max_urls, 20);
    assert_eq!(settings.url, "https://docs.example.com/");
}

#[test]
fn test_invalid_numeric_flag_is_rejected_by_parser() {
    let result = command_argument_builder().try_get_matches_from([
        "crawlr",
        "crawl",
        "--max-depth",
        "deep",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_unknown_report_format_is_rejected() {
    let result = command_argument_builder().try_get_matches_from([
        "crawlr", "crawl", "--format", "csv",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_init_writes_config_and_respects_force() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let path_arg = path.to_string_lossy().into_owned();

    let args = sub_matches(&["crawlr", "init", &path_arg, "-q"]);
    handle_init(&args).unwrap();
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("server_url = \"http://localhost:11235/\""));

    assert!(handle_init(&args).is_err());

    let forced = sub_matches(&["crawlr", "init", &path_arg, "--force", "-q"]);
    handle_init(&forced).unwrap();
}
