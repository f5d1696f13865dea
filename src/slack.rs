//! Slack publishing — Block Kit payload construction and delivery.
//!
//! Delivery goes through an incoming webhook when one is configured,
//! otherwise through `chat.postMessage` with a bot token. A failed post is
//! an error for the caller to report; it never invalidates the summary that
//! was already produced.

use std::time::Duration;

use serde::Deserialize;

use crate::config::SlackConfig;
use crate::constants::{SLACK_POST_MESSAGE_URL, SLACK_SECTION_LIMIT, SLACK_TIMEOUT_SECS};
use crate::error::{DigestError, DigestResult};

/// Build the Block Kit payload for a digest post.
pub fn format_message(
    summary: &str,
    repo: &str,
    range_label: &str,
    pr_count: usize,
) -> serde_json::Value {
    let body = truncate_section(&markdown_to_mrkdwn(summary));
    let generated = chrono::Utc::now().format("%Y-%m-%d %H:%M");

    serde_json::json!({
        "blocks": [
            {
                "type": "header",
                "text": {
                    "type": "plain_text",
                    "text": format!("GitHub PR Summary - {repo}"),
                    "emoji": true
                }
            },
            {
                "type": "context",
                "elements": [{
                    "type": "mrkdwn",
                    "text": format!(
                        "Time period: {range_label} | Total PRs: {pr_count} | Generated: {generated}"
                    )
                }]
            },
            { "type": "divider" },
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": body }
            },
            { "type": "divider" },
            {
                "type": "context",
                "elements": [{
                    "type": "mrkdwn",
                    "text": "Generated automatically by pr-digest"
                }]
            }
        ]
    })
}

/// Convert the digest's markdown into Slack mrkdwn: heading lines become
/// `*bold*` with both markers present, `**bold**` loses a star on each side,
/// list dashes become bullets, fenced code becomes inline code. Longest
/// heading markers are matched first so `###` does not leave stray hashes.
pub fn markdown_to_mrkdwn(markdown: &str) -> String {
    let headings_bolded = markdown
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            for marker in ["### ", "## ", "# "] {
                if let Some(rest) = trimmed.strip_prefix(marker) {
                    return format!("*{}*", rest.trim_end());
                }
            }
            line.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n");

    headings_bolded
        .replace("**", "*")
        .replace("- ", "• ")
        .replace("```", "`")
        .replace("\n\n", "\n")
}

/// Section blocks reject text over the Block Kit cap; cut with a marker.
fn truncate_section(text: &str) -> String {
    if text.chars().count() <= SLACK_SECTION_LIMIT {
        return text.to_string();
    }
    let cut: String = text.chars().take(SLACK_SECTION_LIMIT - 1).collect();
    format!("{cut}…")
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

pub struct SlackClient {
    config: SlackConfig,
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> Self {
        Self { config }
    }

    /// Format and deliver the digest.
    pub fn post_summary(
        &self,
        summary: &str,
        repo: &str,
        range_label: &str,
        pr_count: usize,
    ) -> DigestResult<()> {
        let mut message = format_message(summary, repo, range_label, pr_count);

        if let Some(url) = &self.config.webhook_url {
            self.post_json(url, &message, None)?;
            tracing::info!("Summary posted to Slack via webhook");
            return Ok(());
        }

        // Bot-token path; chat.postMessage needs an explicit channel.
        let token = self.config.bot_token.as_ref().ok_or_else(|| {
            DigestError::Config("Slack client built without webhook or bot token".into())
        })?;
        if let Some(channel) = &self.config.channel {
            message["channel"] = serde_json::Value::String(channel.clone());
        } else {
            return Err(DigestError::Config(
                "Slack bot-token delivery requires --slack-channel".into(),
            ));
        }
        self.post_json(SLACK_POST_MESSAGE_URL, &message, Some(token))?;
        tracing::info!("Summary posted to Slack via bot token");
        Ok(())
    }

    fn post_json(
        &self,
        url: &str,
        message: &serde_json::Value,
        bearer: Option<&str>,
    ) -> DigestResult<()> {
        let mut request = ureq::post(url).header("content-type", "application/json");
        if let Some(token) = bearer {
            request = request.header("Authorization", &format!("Bearer {token}"));
        }

        let mut response = request
            .config()
            .timeout_global(Some(Duration::from_secs(SLACK_TIMEOUT_SECS)))
            .http_status_as_error(false)
            .build()
            .send_json(message)
            .map_err(|e| DigestError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let detail = response.body_mut().read_to_string().unwrap_or_default();
            return Err(DigestError::Slack(format!("HTTP {status}: {detail}")));
        }

        // Webhooks answer plain "ok"; the Web API answers JSON with an `ok`
        // flag that can be false on a 200.
        if bearer.is_some() {
            let parsed: PostMessageResponse = response
                .body_mut()
                .read_json()
                .map_err(|e| DigestError::Slack(format!("unreadable response: {e}")))?;
            if !parsed.ok {
                return Err(DigestError::Slack(
                    parsed.error.unwrap_or_else(|| "unknown API error".into()),
                ));
            }
        }
        Ok(())
    }
}
