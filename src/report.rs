//! Digest document assembly and file I/O.
//!
//! Turns a list of merged PRs into the text document the summarizer
//! consumes: grouped by base branch, one detail block per PR, plus a totals
//! section. Also handles the JSON save/load used by the `fetch` →
//! `report --from-json` flow.

use std::collections::BTreeSet;
use std::path::Path;

use crate::constants::PR_BODY_EXCERPT_CHARS;
use crate::error::{DigestError, DigestResult};
use crate::github::PullRequest;

/// Build the summarizer input document.
pub fn build_digest_document(prs: &[PullRequest], range_label: &str) -> String {
    let mut doc = format!(
        "Merged pull requests for period {range_label}. Total PRs: {}.\n\n",
        prs.len()
    );

    for (branch, branch_prs) in group_by_branch(prs) {
        doc.push_str(&format!("## {branch} branch ({} PRs)\n\n", branch_prs.len()));
        for pr in branch_prs {
            doc.push_str(&format!("### PR #{}: {}\n", pr.number, pr.title));
            doc.push_str(&format!("- Author: {}\n", pr.author));
            doc.push_str(&format!("- Merged: {}\n", pr.merged_at.format("%Y-%m-%d %H:%M")));
            doc.push_str(&format!("- URL: {}\n", pr.url));
            if !pr.body.trim().is_empty() {
                doc.push_str(&format!(
                    "- Description: {}\n",
                    excerpt(&pr.body, PR_BODY_EXCERPT_CHARS)
                ));
            }
            if !pr.labels.is_empty() {
                doc.push_str(&format!("- Labels: {}\n", pr.labels.join(", ")));
            }
            if !pr.issue_refs.is_empty() {
                doc.push_str(&format!("- Linked issues: {}\n", pr.issue_refs.join(", ")));
            }
            if pr.additions + pr.deletions + pr.changed_files > 0 {
                doc.push_str(&format!(
                    "- Changes: +{} -{} lines, {} files\n",
                    pr.additions, pr.deletions, pr.changed_files
                ));
            }
            doc.push('\n');
        }
    }

    let contributors: BTreeSet<&str> = prs.iter().map(|pr| pr.author.as_str()).collect();
    doc.push_str(&format!(
        "## Totals\n\n- Contributors: {}\n- Pull requests: {}\n",
        contributors.into_iter().collect::<Vec<_>>().join(", "),
        prs.len()
    ));

    doc
}

/// Group PRs by base branch, branches in order of first appearance (the PR
/// list arrives sorted newest-first).
fn group_by_branch(prs: &[PullRequest]) -> Vec<(String, Vec<&PullRequest>)> {
    let mut groups: Vec<(String, Vec<&PullRequest>)> = Vec::new();
    for pr in prs {
        match groups.iter_mut().find(|(b, _)| *b == pr.base_branch) {
            Some((_, list)) => list.push(pr),
            None => groups.push((pr.base_branch.clone(), vec![pr])),
        }
    }
    groups
}

/// Single-line excerpt of a PR body, capped at `max_chars` characters.
fn excerpt(body: &str, max_chars: usize) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

/// Read a digest input file. Only `.md` and `.txt` are accepted; empty files
/// are rejected before the pipeline starts.
pub fn read_input_file(path: &Path) -> DigestResult<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if ext != "md" && ext != "txt" {
        return Err(DigestError::InvalidInput(format!(
            "unsupported file type '{}', only .md and .txt are supported",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(DigestError::InvalidInput(format!(
            "file '{}' is empty",
            path.display()
        )));
    }
    Ok(content)
}

pub fn write_summary(path: &Path, rendered: &str) -> DigestResult<()> {
    std::fs::write(path, rendered)?;
    tracing::info!(path = %path.display(), "Summary saved");
    Ok(())
}

pub fn save_prs_json(path: &Path, prs: &[PullRequest]) -> DigestResult<()> {
    let json = serde_json::to_string_pretty(prs)?;
    std::fs::write(path, json)?;
    tracing::info!(count = prs.len(), path = %path.display(), "PRs saved");
    Ok(())
}

pub fn load_prs_json(path: &Path) -> DigestResult<Vec<PullRequest>> {
    let raw = std::fs::read_to_string(path)?;
    let prs: Vec<PullRequest> = serde_json::from_str(&raw)?;
    tracing::info!(count = prs.len(), path = %path.display(), "PRs loaded");
    Ok(prs)
}
