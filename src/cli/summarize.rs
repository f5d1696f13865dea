use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use pr_digest::config::LlmConfig;
use pr_digest::constants::{MAX_CHUNK_TOKENS, MAX_FINAL_WORDS};
use pr_digest::report;
use pr_digest::summarizer::{self, ChunkedSummarizer, SummarizeOptions};
use pr_digest::tokenizer::Tokenizer;

#[derive(Args)]
pub struct SummarizeArgs {
    /// Input file (.md or .txt)
    pub input: PathBuf,

    /// Output file
    #[arg(long, short, default_value = "summary.md")]
    pub output: PathBuf,

    /// OpenAI API key (defaults to OPENAI_API_KEY)
    #[arg(long)]
    pub openai_key: Option<String>,

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

pub fn run(args: &SummarizeArgs) -> Result<()> {
    let content = report::read_input_file(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    // Estimation needs no credentials; a real run checks them before any
    // chunking or cost work happens.
    let llm = if args.estimate_only {
        None
    } else {
        Some(LlmConfig::from_env(args.openai_key.as_deref())?)
    };

    let tokenizer = Tokenizer::new()?;
    let estimate = summarizer::estimate_cost(&tokenizer, &content, args.chunk_tokens);
    super::print_estimate(&estimate);

    let Some(llm) = llm else {
        println!("\nCost estimation complete. Run without --estimate-only to process.");
        return Ok(());
    };

    if !super::confirm_cost(&estimate, args.yes)? {
        println!("Processing cancelled.");
        return Ok(());
    }

    let summarizer = ChunkedSummarizer::new(
        llm,
        SummarizeOptions {
            max_chunk_tokens: args.chunk_tokens,
            max_final_words: args.max_words,
        },
    )?;

    let summary = summarizer.summarize_document(&content)?;
    report::write_summary(&args.output, &summary.render())?;

    println!("Summary complete.");
    println!("  Words:  {} (target {})", summary.word_count, args.max_words);
    println!("  Output: {}", args.output.display());
    if summary.word_count > args.max_words {
        tracing::warn!(
            words = summary.word_count,
            target = args.max_words,
            "Summary exceeds target word count"
        );
    }

    Ok(())
}
