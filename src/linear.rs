//! Issue-tracker enrichment — lexical extraction of Linear issue references.
//!
//! Purely local: identifiers are scraped from PR text rather than looked up
//! against the Linear API, since the digest only needs the references for
//! prompt context and links.

use regex::Regex;

/// Extract Linear-style issue identifiers (`OPS-204`) from a PR's title,
/// body, and head branch name. Branch names are matched case-insensitively
/// (`ops-204-fix-cache` is the common branch convention). Results keep the
/// order of first appearance, deduplicated.
///
/// The pattern is a heuristic: other UPPERCASE-123 tokens (e.g. "SHA-256")
/// match too.
pub fn extract_issue_refs(title: &str, body: &str, head_branch: &str) -> Vec<String> {
    let pattern = Regex::new(r"\b[A-Z][A-Z0-9]+-\d+\b").unwrap();

    let branch_upper = head_branch.to_uppercase();
    let mut refs = Vec::new();
    for source in [title, body, branch_upper.as_str()] {
        for m in pattern.find_iter(source) {
            let id = m.as_str().to_string();
            if !refs.contains(&id) {
                refs.push(id);
            }
        }
    }
    refs
}
