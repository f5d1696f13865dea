use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use pr_digest::config::GithubConfig;
use pr_digest::github::{GithubClient, TimeRange};
use pr_digest::report;

#[derive(Args)]
pub struct FetchArgs {
    /// Repositories in owner/repo form
    #[arg(required = true)]
    pub repos: Vec<String>,

    /// Base branches to inspect
    #[arg(long, short, default_values_t = [String::from("main")])]
    pub branches: Vec<String>,

    /// Time range: 1w, 1m, 6m, 1y, custom:YYYY-MM-DD[:YYYY-MM-DD]
    #[arg(long, default_value = "1w")]
    pub time_range: String,

    /// Output JSON file (multi-repo runs get one file per repo)
    #[arg(long, short, default_value = "prs.json")]
    pub output: PathBuf,

    /// GitHub token (defaults to GITHUB_TOKEN)
    #[arg(long)]
    pub github_token: Option<String>,
}

pub fn run(args: &FetchArgs) -> Result<()> {
    let range = TimeRange::parse(&args.time_range)?;
    let client = GithubClient::new(&GithubConfig::from_env(args.github_token.as_deref()));
    let multi = args.repos.len() > 1;

    // One repository failing must not take down the rest of the batch.
    let mut failed: Vec<&str> = Vec::new();
    for repo in &args.repos {
        let output = super::per_repo_path(&args.output, repo, multi);
        match client.fetch_merged_prs(repo, &args.branches, &range) {
            Ok(prs) => {
                report::save_prs_json(&output, &prs)?;
                println!(
                    "Fetched {} merged PRs from {} ({})",
                    prs.len(),
                    repo,
                    range.label
                );
                println!("Saved to {}", output.display());
            }
            Err(e) => {
                tracing::error!(repo = %repo, error = %e, "Fetch failed, continuing");
                failed.push(repo.as_str());
            }
        }
    }

    if failed.len() == args.repos.len() {
        bail!("all repositories failed: {}", failed.join(", "));
    }
    if !failed.is_empty() {
        println!("Skipped after errors: {}", failed.join(", "));
    }
    Ok(())
}
