pub mod fetch;
pub mod report;
pub mod summarize;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use pr_digest::constants::COST_CONFIRM_THRESHOLD_USD;
use pr_digest::summarizer::CostEstimate;

/// Output path for one repository's artifact. A single-repo run writes to
/// the given path unchanged; when several repositories are processed the
/// repo name (slashes flattened) is inserted before the extension so each
/// gets its own file.
pub fn per_repo_path(base: &Path, repo: &str, multi: bool) -> PathBuf {
    if !multi {
        return base.to_path_buf();
    }
    let slug = repo.replace('/', "-");
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let name = match base.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{slug}.{ext}"),
        None => format!("{stem}-{slug}"),
    };
    base.with_file_name(name)
}

pub fn print_estimate(estimate: &CostEstimate) {
    println!("Document analysis:");
    println!("  Total tokens:    {}", estimate.total_tokens);
    println!("  Chunks needed:   {}", estimate.chunks);
    println!("  Estimated cost:  ${:.4}", estimate.total_cost);
    println!("  Input cost:      ${:.4}", estimate.input_cost);
    println!("  Output cost:     ${:.4}", estimate.output_cost);
}

/// Ask before committing to a run above the cost threshold. `--yes` skips
/// the prompt.
pub fn confirm_cost(estimate: &CostEstimate, assume_yes: bool) -> Result<bool> {
    if assume_yes || estimate.total_cost <= COST_CONFIRM_THRESHOLD_USD {
        return Ok(true);
    }
    print!(
        "Estimated cost is ${:.4}. Continue? (y/N): ",
        estimate.total_cost
    );
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_repo_path_single_repo_unchanged() {
        let p = per_repo_path(Path::new("out/prs.json"), "acme/svc", false);
        assert_eq!(p, Path::new("out/prs.json"));
    }

    #[test]
    fn test_per_repo_path_multi_repo_inserts_slug() {
        let p = per_repo_path(Path::new("out/prs.json"), "acme/svc", true);
        assert_eq!(p, Path::new("out/prs-acme-svc.json"));

        let bare = per_repo_path(Path::new("digest"), "acme/svc", true);
        assert_eq!(bare, Path::new("digest-acme-svc"));
    }
}
