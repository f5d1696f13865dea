mod cli;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pr-digest",
    version,
    about = "GitHub PR digests via chunked LLM summarization"
)]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a local markdown or text file
    Summarize(cli::summarize::SummarizeArgs),
    /// Fetch merged pull requests to a JSON file
    Fetch(cli::fetch::FetchArgs),
    /// Fetch PRs, build the digest, and publish it
    Report(cli::report::ReportArgs),
}

fn main() {
    pr_digest::tracing_init::init();

    let app = App::parse();
    let result = match app.command {
        Commands::Summarize(args) => cli::summarize::run(&args),
        Commands::Fetch(args) => cli::fetch::run(&args),
        Commands::Report(args) => cli::report::run(&args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
