use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use crawlr_core::archive::Archiver;
use crawlr_core::config::{Settings, write_default_config};
use crawlr_core::crawl::execute_crawl;
use crawlr_core::progress::{BarProgress, NoProgress, ProgressSink};
use crawlr_core::report::{CrawlReport, ReportFormat};
use crawlr_core::storage::Storage;
use crawlr_core::{ConfigError, LogOutput};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Load settings (file, then environment) and lay the command-line flags
/// on top.
pub fn settings_from_matches(args: &ArgMatches) -> Result<Settings, ConfigError> {
    let config_path = args.get_one::<PathBuf>("config");
    let mut settings = Settings::load(config_path.map(PathBuf::as_path))?;
    apply_overrides(&mut settings, args)?;
    Ok(settings)
}

/// Copy every flag the user actually passed into `settings`.
pub fn apply_overrides(settings: &mut Settings, args: &ArgMatches) -> Result<(), ConfigError> {
    let string_flags = [
        ("url", "url"),
        ("library", "library"),
        ("output", "output"),
        ("server-url", "server_url"),
        ("api-token", "api_token"),
        ("log-level", "log_level"),
        ("log-output", "log_output"),
        ("log-file-path", "log_file_path"),
    ];
    for (flag, key) in string_flags {
        if let Some(value) = args.get_one::<String>(flag) {
            settings.set(key, value)?;
        }
    }

    if let Some(timeout) = args.get_one::<u64>("timeout") {
        settings.timeout = *timeout;
    }
    if let Some(run_timeout) = args.get_one::<u64>("run-timeout") {
        settings.run_timeout = *run_timeout;
    }
    if let Some(max_concurrent) = args.get_one::<usize>("max-concurrent") {
        settings.max_concurrent = *max_concurrent;
    }
    if let Some(max_depth) = args.get_one::<usize>("max-depth") {
        settings.max_depth = *max_depth;
    }
    if let Some(max_urls) = args.get_one::<usize>("max-urls") {
        settings.max_urls = *max_urls;
    }
    if let Some(batch_size) = args.get_one::<usize>("batch-size") {
        settings.batch_size = *batch_size;
    }
    if let Some(max_attempts) = args.get_one::<u32>("max-attempts") {
        settings.max_attempts = *max_attempts;
    }
    if let Some(patterns) = args.get_many::<String>("exclude") {
        settings.exclude_patterns.extend(patterns.cloned());
    }
    if args.get_flag("no-media") {
        settings.include_media = false;
    }
    if args.get_flag("overwrite") {
        settings.overwrite_files = true;
    }
    if args.get_flag("log-structured") {
        settings.log_structured = true;
    }
    Ok(())
}

/// Install the global subscriber described by the logging settings.
/// `RUST_LOG` wins over `log_level` when set.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.tracing_level()));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if settings.log_output.writes_console() {
        layers.push(fmt_layer(std::io::stderr, settings, true));
    }
    if settings.log_output.writes_file() {
        let path = settings.log_file();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        layers.push(fmt_layer(Mutex::new(file), settings, false));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install logger")?;
    Ok(())
}

fn fmt_layer<W>(writer: W, settings: &Settings, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false);
    match (settings.log_structured, settings.log_include_time) {
        (true, true) => layer.json().boxed(),
        (true, false) => layer.json().without_time().boxed(),
        (false, true) => layer.boxed(),
        (false, false) => layer.without_time().boxed(),
    }
}

/// Cancel `crawl` on the first Ctrl-C. Once the crawl token is cancelled
/// (the crawl finished or was interrupted), a further Ctrl-C cancels
/// `archive`.
pub fn spawn_interrupt_handler(crawl: CancellationToken, archive: CancellationToken) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !crawl.is_cancelled() {
                warn!("Interrupt received, stopping crawl and keeping harvested pages");
                crawl.cancel();
            } else {
                warn!("Interrupt received, stopping media downloads");
                archive.cancel();
                break;
            }
        }
    });
}

/// Cancel `token` once `deadline` elapses, unless it is cancelled first.
pub fn spawn_run_deadline(token: CancellationToken, deadline: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(deadline) => {
                warn!(seconds = deadline.as_secs(), "Run timeout reached, stopping crawl");
                token.cancel();
            }
        }
    });
}

pub async fn handle_crawl(sub_matches: &ArgMatches) -> Result<()> {
    let settings = settings_from_matches(sub_matches).context("Invalid configuration")?;
    settings.validate().context("Invalid configuration")?;
    init_logging(&settings)?;

    let quiet = sub_matches.get_flag("quiet");
    let format: ReportFormat = sub_matches
        .get_one::<String>("format")
        .map(|f| f.parse::<ReportFormat>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or_default();

    // Fail on an unwritable output folder before spending time crawling
    let storage = Storage::from_settings(&settings).context("Failed to prepare library")?;

    if !quiet {
        eprintln!("\n{} {}", "Crawling".bold(), settings.url);
        eprintln!("Server: {}", settings.server_url);
        eprintln!(
            "Max depth: {}  Max URLs: {}  Batch size: {}  In flight: {}",
            settings.max_depth, settings.max_urls, settings.batch_size, settings.max_concurrent
        );
        eprintln!("Library: {}\n", storage.library_dir().display());
    }

    let crawl_token = CancellationToken::new();
    let archive_token = CancellationToken::new();
    spawn_interrupt_handler(crawl_token.clone(), archive_token.clone());
    if let Some(deadline) = settings.run_deadline() {
        spawn_run_deadline(crawl_token.clone(), deadline);
    }

    let crawl_progress: Arc<dyn ProgressSink> = if quiet {
        Arc::new(NoProgress)
    } else {
        Arc::new(BarProgress::new("crawl"))
    };

    let outcome = execute_crawl(&settings, crawl_progress, None, crawl_token.clone())
        .await
        .context("Crawl failed")?;
    // Marks the crawl phase over for the interrupt handler and deadline task
    crawl_token.cancel();

    let archiver = Archiver::new(storage, settings.request_timeout())
        .context("Failed to prepare archiver")?
        .with_api_token(settings.api_token.clone());
    let media_progress: Box<dyn ProgressSink> = if quiet || !settings.include_media {
        Box::new(NoProgress)
    } else {
        Box::new(BarProgress::new("media"))
    };
    let summary = archiver
        .archive(&outcome.aggregate.results, media_progress.as_ref(), &archive_token)
        .await;
    info!(
        files = summary.files_written(),
        failures = summary.failures.len(),
        "Archive complete"
    );

    let report = CrawlReport::new(&settings.url, &settings.library, &outcome, Some(&summary));
    let rendered = report.render(format).context("Failed to render report")?;
    if let Some(path) = sub_matches.get_one::<PathBuf>("report") {
        std::fs::write(path, &rendered)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        if !quiet {
            eprintln!("{} Report saved to {}", "✓".green(), path.display());
        }
    }
    print!("{}", rendered);

    if outcome.is_partial() {
        eprintln!(
            "{} Crawl stopped early; {} pages were archived",
            "!".yellow(),
            outcome.aggregate.len()
        );
    } else if outcome.aggregate.is_empty() {
        bail!("No pages were harvested from {}", settings.url);
    }
    Ok(())
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    let path = args
        .get_one::<PathBuf>("PATH")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(crate::commands::DEFAULT_CONFIG_PATH));
    let path = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
    let force = args.get_flag("force");

    write_default_config(&path, force)?;

    if !args.get_flag("quiet") {
        println!("{} Wrote default configuration to {}", "✓".green(), path.display());
        println!(
            "  Set url, library and output there, or pass them as -u, -l and -o. \
             Log output defaults to {}.",
            LogOutput::default()
        );
    }
    Ok(())
}
