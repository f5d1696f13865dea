//! Process-level configuration — explicit objects built once at startup.
//!
//! Each remote collaborator (OpenAI, GitHub, Slack) gets its own config
//! struct, resolved from CLI flags with environment-variable fallback.
//! Credential checks happen here, before any chunking or network work.

use crate::constants::{DEFAULT_MODEL, OPENAI_CHAT_URL};
use crate::error::{DigestError, DigestResult};

/// Resolve a credential: a non-blank explicit flag wins, then the
/// environment variable. Blank values count as absent on both sides, so a
/// blank flag falls through to the environment instead of masking it.
fn resolve(explicit: Option<&str>, env_var: &str) -> Option<String> {
    explicit
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .filter(|v| !v.trim().is_empty())
}

/// Configuration for the summarization LLM.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

impl LlmConfig {
    /// Build from `--openai-key` / `OPENAI_API_KEY`. A missing key is a
    /// hard configuration error — the pipeline must not start without it.
    pub fn from_env(key_override: Option<&str>) -> DigestResult<Self> {
        let api_key = resolve(key_override, "OPENAI_API_KEY").ok_or_else(|| {
            DigestError::Config(
                "OpenAI API key is required. Set OPENAI_API_KEY or pass --openai-key.".into(),
            )
        })?;

        Ok(Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            endpoint: OPENAI_CHAT_URL.to_string(),
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

/// Configuration for the GitHub REST API.
///
/// The token is optional: public repositories work unauthenticated, with
/// lower rate limits.
#[derive(Debug, Clone, Default)]
pub struct GithubConfig {
    pub token: Option<String>,
}

impl GithubConfig {
    pub fn from_env(token_override: Option<&str>) -> Self {
        let token = resolve(token_override, "GITHUB_TOKEN");
        if token.is_none() {
            tracing::warn!(
                "No GitHub token configured; private repositories and high request volumes will fail"
            );
        }
        Self { token }
    }
}

/// Configuration for Slack delivery. Either a webhook URL or a bot token
/// must be present; the webhook takes precedence when both are set.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub webhook_url: Option<String>,
    pub bot_token: Option<String>,
    pub channel: Option<String>,
}

impl SlackConfig {
    pub fn from_env(
        webhook_override: Option<&str>,
        token_override: Option<&str>,
        channel: Option<&str>,
    ) -> DigestResult<Self> {
        let webhook_url = resolve(webhook_override, "SLACK_WEBHOOK_URL");
        let bot_token = resolve(token_override, "SLACK_BOT_TOKEN");

        if webhook_url.is_none() && bot_token.is_none() {
            return Err(DigestError::Config(
                "Slack delivery needs SLACK_WEBHOOK_URL or SLACK_BOT_TOKEN.".into(),
            ));
        }

        Ok(Self {
            webhook_url,
            bot_token,
            channel: channel.map(str::to_string),
        })
    }
}
