use colored::Colorize;
use crawlr::commands::command_argument_builder;
use crawlr::handlers::{handle_crawl, handle_init};

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
}
