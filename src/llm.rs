//! LLM call boundary — request/response types, error taxonomy, OpenAI client.
//!
//! Failures are returned as tagged values, not exceptions-in-disguise: the
//! retry loop in the summarizer inspects [`LlmCallError::is_transient`]
//! instead of matching on broad error classes.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::constants::{LLM_TIMEOUT_SECS, MAX_ATTEMPTS, RETRY_BASE_DELAY_SECS};

/// One completion call: system + user prompt, sampling temperature, output cap.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Failure classes for a completion call.
///
/// `RateLimited`, `Connection` and `Api` are transient — expected to succeed
/// on retry. Anything else (malformed or empty response payloads) is
/// permanent and skips the retry loop entirely.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmCallError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl LlmCallError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Connection(_) | Self::Api { .. }
        )
    }
}

/// Seam for the completion call, so the pipeline can be exercised without a
/// network. Production code uses [`OpenAiClient`].
pub trait LlmBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmCallError>;
}

/// Fixed retry schedule: `max_attempts` tries with exponential backoff
/// starting at `base_delay` (2s, 4s, 8s with the defaults).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_secs(RETRY_BASE_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given 0-based failed attempt.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Blocking OpenAI chat-completions client.
pub struct OpenAiClient {
    config: LlmConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }
}

impl LlmBackend for OpenAiClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmCallError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_output_tokens,
        });

        let mut response = ureq::post(&self.config.endpoint)
            .header("Authorization", &format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .config()
            .timeout_global(Some(Duration::from_secs(LLM_TIMEOUT_SECS)))
            .http_status_as_error(false)
            .build()
            .send_json(&body)
            .map_err(|e| LlmCallError::Connection(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 {
            let detail = response.body_mut().read_to_string().unwrap_or_default();
            return Err(LlmCallError::RateLimited(truncate_detail(&detail)));
        }
        if !(200..300).contains(&status) {
            let detail = response.body_mut().read_to_string().unwrap_or_default();
            return Err(LlmCallError::Api {
                status,
                message: truncate_detail(&detail),
            });
        }

        let parsed: ChatResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| LlmCallError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmCallError::Malformed("empty completion".into()))
    }
}

/// Error bodies can be full HTML pages; keep logs readable.
fn truncate_detail(detail: &str) -> String {
    const MAX: usize = 500;
    let trimmed = detail.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmCallError::RateLimited("slow down".into()).is_transient());
        assert!(LlmCallError::Connection("reset".into()).is_transient());
        assert!(LlmCallError::Api { status: 502, message: "bad gateway".into() }.is_transient());
        assert!(!LlmCallError::Malformed("no choices".into()).is_transient());
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        };
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(8));
    }

    #[test]
    fn test_truncate_detail_caps_length() {
        let long = "x".repeat(2_000);
        let cut = truncate_detail(&long);
        assert!(cut.chars().count() <= 501);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate_detail("  short  "), "short");
    }
}
