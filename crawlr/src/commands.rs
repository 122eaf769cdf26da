use clap::{ArgAction, arg, command, value_parser};
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("crawlr")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("crawlr")
        .about("Recursively harvest a site as markdown through a crawl4ai server")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress progress bars and non-essential output")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("init")
                .about("Writes a default configuration file")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Where to write the configuration file")
                        .value_parser(value_parser!(PathBuf))
                        .default_value(DEFAULT_CONFIG_PATH),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing configuration file")
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a site starting from a seed URL and archive every page as markdown \
                into a library.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The seed URL to crawl (required unless set in config)"),
                )
                .arg(
                    arg!(-l --"library" <NAME>)
                        .required(false)
                        .help("The library to store the crawl in (required unless set in config)"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Destination folder for libraries (required unless set in config)"),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Config file (default: ./config/config.toml, then ./config.toml)")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"server-url" <URL>)
                        .required(false)
                        .help("Base URL of the crawl4ai server"),
                )
                .arg(
                    arg!(--"api-token" <TOKEN>)
                        .required(false)
                        .help("Bearer token for the crawl4ai server"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout in seconds")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    arg!(--"run-timeout" <SECONDS>)
                        .required(false)
                        .help("Stop the crawl after this many seconds and keep what was harvested (0 = no limit)")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    arg!(--"max-concurrent" <NUM>)
                        .required(false)
                        .help("Batches in flight at once")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    arg!(-d --"max-depth" <DEPTH>)
                        .required(false)
                        .help("Maximum link depth from the seed")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    arg!(-m --"max-urls" <NUM>)
                        .required(false)
                        .help("Maximum number of URLs to visit")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    arg!(-b --"batch-size" <NUM>)
                        .required(false)
                        .help("URLs submitted per request")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-attempts" <NUM>)
                        .required(false)
                        .help("Attempts per batch before it is skipped")
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    arg!(-x --"exclude" <PATTERN>)
                        .required(false)
                        .help("Skip URLs containing this substring (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    arg!(--"no-media")
                        .required(false)
                        .help("Do not download images")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"overwrite")
                        .required(false)
                        .help("Overwrite files that already exist in the library")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"log-level" <LEVEL>)
                        .required(false)
                        .help("Log level")
                        .value_parser(["DEBUG", "INFO", "WARN", "ERROR", "debug", "info", "warn", "error"]),
                )
                .arg(
                    arg!(--"log-output" <OUTPUT>)
                        .required(false)
                        .help("Where logs go")
                        .value_parser(["console", "file", "both"]),
                )
                .arg(
                    arg!(--"log-file-path" <PATH>)
                        .required(false)
                        .help("Log file used when log output includes file"),
                )
                .arg(
                    arg!(--"log-structured")
                        .required(false)
                        .help("Emit logs as JSON lines")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-r --"report" <PATH>)
                        .required(false)
                        .help("Also save the report to this file")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}
