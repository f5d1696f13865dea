//! GitHub REST client — merged-PR fetching over a time window.
//!
//! Lists closed PRs per base branch (newest first, 100 per page) and keeps
//! the ones whose merge date falls inside the requested range. The GitHub
//! list endpoint does not include diff stats, so `additions` / `deletions` /
//! `changed_files` stay zero unless filled from another source.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::GithubConfig;
use crate::constants::{GITHUB_API_BASE, GITHUB_PER_PAGE, GITHUB_TIMEOUT_SECS};
use crate::error::{DigestError, DigestResult};
use crate::linear;

/// One merged pull request, normalized from the GitHub API shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub base_branch: String,
    pub head_branch: String,
    pub merged_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub body: String,
    pub labels: Vec<String>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changed_files: u64,
    /// Linked issue-tracker identifiers found in title, body, or branch name.
    #[serde(default)]
    pub issue_refs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RepoInfo {
    pub name: String,
    pub private: bool,
    pub default_branch: String,
}

/// UTC window for PR filtering, parsed from a range expression.
#[derive(Debug, Clone)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The range expression as given, used for report labeling.
    pub label: String,
}

impl TimeRange {
    /// Parse `1w`, `1m` (30 days), `6m` (180 days), `1y` (365 days),
    /// `custom:YYYY-MM-DD[:YYYY-MM-DD]`, or a bare date/RFC 3339 instant
    /// used as the window start.
    pub fn parse(expr: &str) -> DigestResult<Self> {
        let now = Utc::now();
        let (start, end) = match expr {
            "1w" => (now - chrono::Duration::weeks(1), now),
            "1m" => (now - chrono::Duration::days(30), now),
            "6m" => (now - chrono::Duration::days(180), now),
            "1y" => (now - chrono::Duration::days(365), now),
            custom if custom.starts_with("custom:") => {
                let parts: Vec<&str> = custom.splitn(3, ':').collect();
                match parts.as_slice() {
                    ["custom", s] => (parse_instant(s)?, now),
                    ["custom", s, e] => (parse_instant(s)?, parse_instant(e)?),
                    _ => {
                        return Err(DigestError::InvalidInput(format!(
                            "invalid custom range '{expr}', use custom:YYYY-MM-DD or custom:YYYY-MM-DD:YYYY-MM-DD"
                        )))
                    }
                }
            }
            other => (parse_instant(other)?, now),
        };

        if start > end {
            return Err(DigestError::InvalidInput(format!(
                "range start {start} is after end {end}"
            )));
        }

        Ok(Self { start, end, label: expr.to_string() })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

fn parse_instant(s: &str) -> DigestResult<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            DigestError::InvalidInput(format!(
                "invalid time range '{s}', use 1w, 1m, 6m, 1y, custom:YYYY-MM-DD, or an ISO date"
            ))
        })
}

// GitHub API response shapes (only the fields we read).

#[derive(Deserialize)]
struct ApiRepo {
    name: String,
    private: bool,
    default_branch: String,
}

#[derive(Deserialize)]
struct ApiBranch {
    name: String,
}

#[derive(Deserialize)]
struct ApiPull {
    number: u64,
    title: String,
    user: Option<ApiUser>,
    base: ApiRef,
    head: ApiRef,
    merged_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    html_url: String,
    body: Option<String>,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changed_files: u64,
}

#[derive(Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct ApiLabel {
    name: String,
}

pub struct GithubClient {
    token: Option<String>,
    base_url: String,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Self {
        Self {
            token: config.token.clone(),
            base_url: GITHUB_API_BASE.to_string(),
        }
    }

    /// Verify the repository is reachable with the current credentials.
    /// 404 and 401 come back as `GithubApi` errors with the status attached,
    /// so the CLI can explain the difference.
    pub fn check_repo_access(&self, repo: &str) -> DigestResult<RepoInfo> {
        let api: ApiRepo = self.get_json(&format!("/repos/{repo}"), &[])?;
        tracing::info!(
            repo = %api.name,
            private = api.private,
            default_branch = %api.default_branch,
            "Repository accessible"
        );
        Ok(RepoInfo {
            name: api.name,
            private: api.private,
            default_branch: api.default_branch,
        })
    }

    /// All branch names, following pagination to the end.
    pub fn list_branches(&self, repo: &str) -> DigestResult<Vec<String>> {
        let mut branches = Vec::new();
        let mut page: u32 = 1;
        loop {
            let batch: Vec<ApiBranch> = self.get_json(
                &format!("/repos/{repo}/branches"),
                &[
                    ("per_page", GITHUB_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ],
            )?;
            let len = batch.len();
            branches.extend(batch.into_iter().map(|b| b.name));
            if len < GITHUB_PER_PAGE as usize {
                break;
            }
            page += 1;
        }
        Ok(branches)
    }

    /// Fetch PRs merged into any of `base_branches` within `range`, newest
    /// first. Branches that do not exist are skipped with a warning; when
    /// none exist the call fails.
    pub fn fetch_merged_prs(
        &self,
        repo: &str,
        base_branches: &[String],
        range: &TimeRange,
    ) -> DigestResult<Vec<PullRequest>> {
        self.check_repo_access(repo)?;

        let available = self.list_branches(repo)?;
        let valid: Vec<&String> = base_branches
            .iter()
            .filter(|b| available.iter().any(|a| a == *b))
            .collect();

        if valid.is_empty() {
            return Err(DigestError::InvalidInput(format!(
                "none of the requested branches ({}) exist in {repo}",
                base_branches.join(", ")
            )));
        }
        if valid.len() != base_branches.len() {
            let missing: Vec<&str> = base_branches
                .iter()
                .filter(|b| !available.iter().any(|a| a == *b))
                .map(|b| b.as_str())
                .collect();
            tracing::warn!(
                missing = %missing.join(", "),
                "Some branches not found, skipping them"
            );
        }

        let mut all = Vec::new();
        for branch in valid {
            tracing::info!(branch = %branch, "Fetching merged PRs");
            let mut page: u32 = 1;
            loop {
                let batch: Vec<ApiPull> = self.get_json(
                    &format!("/repos/{repo}/pulls"),
                    &[
                        ("state", "closed".to_string()),
                        ("base", branch.clone()),
                        ("sort", "updated".to_string()),
                        ("direction", "desc".to_string()),
                        ("per_page", GITHUB_PER_PAGE.to_string()),
                        ("page", page.to_string()),
                    ],
                )?;
                let len = batch.len();
                all.extend(page_to_merged(batch, branch, range));
                if len < GITHUB_PER_PAGE as usize {
                    break;
                }
                page += 1;
            }
        }

        all.sort_by(|a, b| b.merged_at.cmp(&a.merged_at));
        tracing::info!(count = all.len(), "Fetched merged PRs");
        Ok(all)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> DigestResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = ureq::get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "pr-digest");
        if let Some(token) = &self.token {
            request = request.header("Authorization", &format!("token {token}"));
        }
        for (key, value) in query {
            request = request.query(*key, value);
        }

        let mut response = request
            .config()
            .timeout_global(Some(Duration::from_secs(GITHUB_TIMEOUT_SECS)))
            .http_status_as_error(false)
            .build()
            .call()
            .map_err(|e| DigestError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let message = match status {
                404 => "repository or resource not found (check the name and your access)".into(),
                401 => "authentication required (set GITHUB_TOKEN)".into(),
                _ => response.body_mut().read_to_string().unwrap_or_default(),
            };
            return Err(DigestError::GithubApi { status, message });
        }

        response
            .body_mut()
            .read_json()
            .map_err(|e| DigestError::Http(e.to_string()))
    }
}

/// Keep the merged-in-range PRs from one result page, tagged with the base
/// branch they were fetched for.
fn page_to_merged(page: Vec<ApiPull>, base_branch: &str, range: &TimeRange) -> Vec<PullRequest> {
    page.into_iter()
        .filter_map(|pr| {
            let merged_at = pr.merged_at?;
            if !range.contains(merged_at) {
                return None;
            }
            Some(normalize(pr, base_branch, merged_at))
        })
        .collect()
}

fn normalize(pr: ApiPull, base_branch: &str, merged_at: DateTime<Utc>) -> PullRequest {
    let body = pr.body.unwrap_or_default();
    let head_branch = pr.head.name;
    let issue_refs = linear::extract_issue_refs(&pr.title, &body, &head_branch);
    PullRequest {
        number: pr.number,
        title: pr.title,
        author: pr.user.map(|u| u.login).unwrap_or_else(|| "unknown".into()),
        base_branch: base_branch.to_string(),
        head_branch,
        merged_at,
        created_at: pr.created_at,
        url: pr.html_url,
        body,
        labels: pr.labels.into_iter().map(|l| l.name).collect(),
        additions: pr.additions,
        deletions: pr.deletions,
        changed_files: pr.changed_files,
        issue_refs,
    }
}
