//! PR Digest — merged-PR fetching and chunked LLM summarization.
//!
//! Fetches merged pull requests from GitHub over a configurable time window,
//! enriches them with Linear issue references, and produces a natural-language
//! digest through a chunked summarization pipeline. The digest is published
//! to a file and/or a Slack channel.

// Core types
pub mod config;
pub mod constants;
pub mod error;

// Summarization pipeline
pub mod llm;
pub mod summarizer;
pub mod tokenizer;

// Collaborators
pub mod github;
pub mod linear;
pub mod report;
pub mod slack;

pub mod tracing_init;

// Re-exports for convenience
pub use error::{DigestError, DigestResult};
