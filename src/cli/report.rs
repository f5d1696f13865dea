use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use pr_digest::config::{GithubConfig, LlmConfig, SlackConfig};
use pr_digest::constants::{MAX_CHUNK_TOKENS, MAX_FINAL_WORDS};
use pr_digest::github::{GithubClient, TimeRange};
use pr_digest::report;
use pr_digest::slack::SlackClient;
use pr_digest::summarizer::{self, ChunkedSummarizer, SummarizeOptions};
use pr_digest::tokenizer::Tokenizer;

#[derive(Args)]
pub struct ReportArgs {
    /// Repositories in owner/repo form
    #[arg(required = true)]
    pub repos: Vec<String>,

    /// Base branches to inspect
    #[arg(long, short, default_values_t = [String::from("main")])]
    pub branches: Vec<String>,

    /// Time range: 1w, 1m, 6m, 1y, custom:YYYY-MM-DD[:YYYY-MM-DD]
    #[arg(long, default_value = "1w")]
    pub time_range: String,

    /// Output file for the digest (multi-repo runs get one file per repo)
    #[arg(long, short, default_value = "summary.md")]
    pub output: PathBuf,

    /// Reuse previously fetched PRs instead of hitting GitHub (single repo)
    #[arg(long)]
    pub from_json: Option<PathBuf>,

    /// OpenAI API key (defaults to OPENAI_API_KEY)
    #[arg(long)]
    pub openai_key: Option<String>,

    /// GitHub token (defaults to GITHUB_TOKEN)
    #[arg(long)]
    pub github_token: Option<String>,

    /// Post the digest to Slack using env credentials
    #[arg(long)]
    pub slack: bool,

    /// Slack webhook URL (defaults to SLACK_WEBHOOK_URL, implies --slack)
    #[arg(long)]
    pub slack_webhook: Option<String>,

    /// Slack bot token (defaults to SLACK_BOT_TOKEN, implies --slack)
    #[arg(long)]
    pub slack_token: Option<String>,

    /// Slack channel (required with a bot token)
    #[arg(long)]
    pub slack_channel: Option<String>,

    /// Maximum tokens per chunk
    #[arg(long, default_value_t = MAX_CHUNK_TOKENS)]
    pub chunk_tokens: usize,

    /// Maximum words in the final summary
    #[arg(long, default_value_t = MAX_FINAL_WORDS)]
    pub max_words: usize,

    /// Only estimate cost and chunk count, no LLM calls
    #[arg(long)]
    pub estimate_only: bool,

    /// Skip the cost confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl ReportArgs {
    fn slack_requested(&self) -> bool {
        self.slack || self.slack_webhook.is_some() || self.slack_token.is_some()
    }
}

pub fn run(args: &ReportArgs) -> Result<()> {
    let range = TimeRange::parse(&args.time_range)?;
    if args.from_json.is_some() && args.repos.len() > 1 {
        bail!("--from-json works with a single repository");
    }

    // Resolve credentials before any fetching or chunking: a missing key
    // should not surface only after minutes of pagination.
    let llm = if args.estimate_only {
        None
    } else {
        Some(LlmConfig::from_env(args.openai_key.as_deref())?)
    };
    let slack = if args.slack_requested() {
        Some(SlackConfig::from_env(
            args.slack_webhook.as_deref(),
            args.slack_token.as_deref(),
            args.slack_channel.as_deref(),
        )?)
    } else {
        None
    };
    let github = GithubConfig::from_env(args.github_token.as_deref());

    // One repository failing must not take down the rest of the batch.
    let multi = args.repos.len() > 1;
    let mut handled = 0usize;
    let mut failed: Vec<&str> = Vec::new();
    for repo in &args.repos {
        if multi {
            println!("\n=== {repo} ===");
        }
        let output = super::per_repo_path(&args.output, repo, multi);
        match run_one(args, repo, &range, llm.as_ref(), slack.as_ref(), &github, &output) {
            Ok(true) => handled += 1,
            Ok(false) => println!("No merged PRs found in {} for {}", repo, range.label),
            Err(e) => {
                tracing::error!(repo = %repo, error = %e, "Report failed, continuing");
                failed.push(repo.as_str());
            }
        }
    }

    if !failed.is_empty() && handled == 0 {
        bail!("all repositories failed: {}", failed.join(", "));
    }
    if handled == 0 {
        bail!("no merged pull requests found for {}", range.label);
    }
    if !failed.is_empty() {
        println!("Skipped after errors: {}", failed.join(", "));
    }
    Ok(())
}

/// Full fetch-digest-publish flow for one repository. `Ok(false)` means the
/// window held no merged PRs, so there was nothing to digest.
fn run_one(
    args: &ReportArgs,
    repo: &str,
    range: &TimeRange,
    llm: Option<&LlmConfig>,
    slack: Option<&SlackConfig>,
    github: &GithubConfig,
    output: &Path,
) -> Result<bool> {
    let prs = match &args.from_json {
        Some(path) => report::load_prs_json(path)
            .with_context(|| format!("Failed to load PRs from {}", path.display()))?,
        None => GithubClient::new(github)
            .fetch_merged_prs(repo, &args.branches, range)
            .with_context(|| format!("Failed to fetch PRs from {repo}"))?,
    };

    if prs.is_empty() {
        return Ok(false);
    }
    println!("Found {} merged PRs", prs.len());

    let document = report::build_digest_document(&prs, &range.label);

    let tokenizer = Tokenizer::new()?;
    let estimate = summarizer::estimate_cost(&tokenizer, &document, args.chunk_tokens);
    super::print_estimate(&estimate);

    let Some(llm) = llm else {
        println!("\nCost estimation complete. Run without --estimate-only to process.");
        return Ok(true);
    };

    if !super::confirm_cost(&estimate, args.yes)? {
        println!("Processing cancelled.");
        return Ok(true);
    }

    let summarizer = ChunkedSummarizer::new(
        llm.clone(),
        SummarizeOptions {
            max_chunk_tokens: args.chunk_tokens,
            max_final_words: args.max_words,
        },
    )?;
    let summary = summarizer.summarize_document(&document)?;
    let rendered = summary.render();

    report::write_summary(output, &rendered)?;
    println!("Digest saved to {}", output.display());

    if let Some(slack) = slack {
        // The file is already on disk; a failed post loses nothing.
        SlackClient::new(slack.clone())
            .post_summary(&rendered, repo, &range.label, prs.len())
            .context("Failed to post digest to Slack")?;
        println!("Digest posted to Slack");
    }

    Ok(true)
}
