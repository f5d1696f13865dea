//! Chunked summarization pipeline.
//!
//! One pass per document: split into token-bounded chunks, summarize each
//! chunk sequentially with bounded retries, merge the partial summaries into
//! one narrative, append the metadata trailer. Single-chunk documents skip
//! the chunk/merge detour and go through one direct call.
//!
//! The pipeline degrades instead of aborting: a chunk that fails all
//! attempts becomes a placeholder summary, a failed merge falls back to
//! concatenated partials. Only empty input and missing credentials are
//! reported as errors, and both before any model call is made.

use serde::Serialize;

use crate::config::LlmConfig;
use crate::constants::{
    CALL_MAX_OUTPUT_TOKENS, CHUNK_SUMMARY_WORD_LIMIT, CHUNK_TEMPERATURE, INPUT_COST_PER_1K,
    MAX_CHUNK_TOKENS, MAX_FINAL_WORDS, MERGE_OUTPUT_TOKEN_BUDGET, MERGE_TEMPERATURE,
    MERGE_WORD_LIMIT, OUTPUT_COMPRESSION_RATIO, OUTPUT_COST_PER_1K,
};
use crate::error::{DigestError, DigestResult};
use crate::llm::{CompletionRequest, LlmBackend, LlmCallError, OpenAiClient, RetryPolicy};
use crate::tokenizer::Tokenizer;

const DIGEST_HEADER: &str = "Executive Summary";
const NO_CONTENT_BODY: &str = "No content was provided for analysis.";

const CHUNK_SYSTEM_PROMPT: &str = "You are an expert technical writer. Create concise, \
    well-structured summaries using markdown. Focus on categorizing changes into new \
    features, bug fixes, and improvements. Be specific and actionable.";

const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a technical writer creating brief, engaging \
    updates about software development progress. Write in a conversational, article-style \
    format with technical precision that is easy to read quickly. Focus on business impact, \
    user benefits, and technical achievements. Keep summaries concise and include relevant \
    links. Mention performance improvements and system enhancements while remaining \
    accessible to both technical and non-technical stakeholders.";

/// A token-bounded slice of the input document.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    /// 0-based position within the document.
    pub index: usize,
    /// Total chunk count, embedded in prompts for context.
    pub total: usize,
}

/// The summary of a single chunk, prior to merging. Produced by every
/// summarization attempt — failed attempts yield a placeholder text instead
/// of an error.
#[derive(Debug, Clone)]
pub struct PartialSummary {
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// The merged digest plus trailer metadata. Terminal artifact of the
/// pipeline; [`FinalSummary::render`] produces the published text blob.
#[derive(Debug, Clone)]
pub struct FinalSummary {
    pub body: String,
    pub word_count: usize,
    pub token_count: usize,
}

impl FinalSummary {
    pub fn render(&self) -> String {
        format!(
            "# {DIGEST_HEADER}\n\n{}\n\n---\n*Generated from {} words ({} tokens)*",
            self.body,
            self.word_count,
            group_thousands(self.token_count)
        )
    }
}

/// Pre-flight projection of token volumes and cost. Computed without any
/// network call, so expensive runs can be gated behind a threshold.
#[derive(Debug, Clone, Serialize)]
pub struct CostEstimate {
    pub total_tokens: usize,
    pub chunks: usize,
    pub estimated_input_tokens: usize,
    pub estimated_output_tokens: usize,
    pub total_cost: f64,
    pub input_cost: f64,
    pub output_cost: f64,
}

#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    pub max_chunk_tokens: usize,
    pub max_final_words: usize,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            max_chunk_tokens: MAX_CHUNK_TOKENS,
            max_final_words: MAX_FINAL_WORDS,
        }
    }
}

pub struct ChunkedSummarizer {
    backend: Box<dyn LlmBackend>,
    tokenizer: Tokenizer,
    retry: RetryPolicy,
    opts: SummarizeOptions,
}

impl ChunkedSummarizer {
    pub fn new(config: LlmConfig, opts: SummarizeOptions) -> DigestResult<Self> {
        Ok(Self {
            backend: Box::new(OpenAiClient::new(config)),
            tokenizer: Tokenizer::new()?,
            retry: RetryPolicy::default(),
            opts,
        })
    }

    /// Assemble from parts. Used by tests with a scripted backend and a
    /// zero-delay retry policy.
    pub fn with_backend(
        backend: Box<dyn LlmBackend>,
        tokenizer: Tokenizer,
        retry: RetryPolicy,
        opts: SummarizeOptions,
    ) -> Self {
        Self { backend, tokenizer, retry, opts }
    }

    /// Run the full pipeline on one document.
    ///
    /// Fails only on empty input; every downstream failure degrades into
    /// placeholder or fallback text inside the returned summary.
    pub fn summarize_document(&self, text: &str) -> DigestResult<FinalSummary> {
        if text.trim().is_empty() {
            return Err(DigestError::InvalidInput("document is empty".into()));
        }

        let chunk_texts = self
            .tokenizer
            .split_into_chunks(text, self.opts.max_chunk_tokens);

        if chunk_texts.len() == 1 {
            // Small input: one call targeting the final word budget directly,
            // no merge step.
            return Ok(self.direct_summarize(text));
        }

        let total = chunk_texts.len();
        tracing::info!(chunks = total, "Processing document in chunks");

        let mut partials = Vec::with_capacity(total);
        for (index, chunk_text) in chunk_texts.into_iter().enumerate() {
            tracing::info!(chunk = index + 1, total, "Summarizing chunk");
            let chunk = Chunk { text: chunk_text, index, total };
            partials.push(self.summarize_chunk(&chunk));
        }

        tracing::info!("Merging partial summaries");
        Ok(self.merge_summaries(&partials))
    }

    /// Summarize one chunk. Transient failures retry per the policy;
    /// exhaustion or a permanent failure yields a placeholder summary
    /// embedding the error and chunk position. Never fails.
    pub fn summarize_chunk(&self, chunk: &Chunk) -> PartialSummary {
        let request = CompletionRequest {
            system_prompt: CHUNK_SYSTEM_PROMPT.to_string(),
            user_prompt: chunk_prompt(chunk),
            temperature: CHUNK_TEMPERATURE,
            max_output_tokens: CALL_MAX_OUTPUT_TOKENS,
        };

        let text = match self.call_with_retry(&request, "chunk") {
            Ok(summary) => {
                tracing::info!(chunk = chunk.index + 1, total = chunk.total, "Chunk summarized");
                summary
            }
            Err(e) => {
                tracing::error!(
                    chunk = chunk.index + 1,
                    total = chunk.total,
                    error = %e,
                    "Chunk summarization failed, emitting placeholder"
                );
                placeholder_summary(chunk.index, &e)
            }
        };

        PartialSummary {
            text,
            chunk_index: chunk.index,
            total_chunks: chunk.total,
        }
    }

    /// Reconcile partial summaries into the final digest.
    ///
    /// Empty list → fixed "no content" summary. A single partial is
    /// forwarded to formatting unchanged. Multiple partials go through one
    /// merge call; if it fails past retries the partials are concatenated
    /// as-is rather than lost.
    pub fn merge_summaries(&self, partials: &[PartialSummary]) -> FinalSummary {
        if partials.is_empty() {
            return self.format_final(NO_CONTENT_BODY);
        }
        if partials.len() == 1 {
            return self.format_final(&partials[0].text);
        }

        let combined = partials
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = CompletionRequest {
            system_prompt: SYNTHESIS_SYSTEM_PROMPT.to_string(),
            user_prompt: merge_prompt(partials.len(), &combined),
            temperature: MERGE_TEMPERATURE,
            max_output_tokens: CALL_MAX_OUTPUT_TOKENS,
        };

        match self.call_with_retry(&request, "merge") {
            Ok(merged) => self.format_final(&merged),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Merge failed, falling back to concatenated partial summaries"
                );
                self.format_final(&combined)
            }
        }
    }

    /// Pre-flight cost projection for this summarizer's chunk budget.
    pub fn estimate_cost(&self, text: &str) -> CostEstimate {
        estimate_cost(&self.tokenizer, text, self.opts.max_chunk_tokens)
    }

    fn direct_summarize(&self, text: &str) -> FinalSummary {
        let request = CompletionRequest {
            system_prompt: SYNTHESIS_SYSTEM_PROMPT.to_string(),
            user_prompt: direct_prompt(text, self.opts.max_final_words),
            temperature: MERGE_TEMPERATURE,
            max_output_tokens: CALL_MAX_OUTPUT_TOKENS,
        };

        match self.call_with_retry(&request, "direct") {
            Ok(summary) => self.format_final(&summary),
            Err(e) => {
                tracing::error!(error = %e, "Direct summarization failed");
                self.format_final(&format!("*Summary generation failed: {e}*"))
            }
        }
    }

    fn call_with_retry(&self, request: &CompletionRequest, stage: &str) -> Result<String, LlmCallError> {
        let mut attempt = 0;
        loop {
            match self.backend.complete(request) {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.backoff_delay(attempt);
                    tracing::warn!(
                        stage,
                        attempt = attempt + 1,
                        max = self.retry.max_attempts,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "LLM call failed, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::error!(stage, max = self.retry.max_attempts, "Retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }

    fn format_final(&self, body: &str) -> FinalSummary {
        let body = body.trim().to_string();
        let word_count = body.split_whitespace().count();
        let token_count = self.tokenizer.count_tokens(&body);
        FinalSummary { body, word_count, token_count }
    }
}

/// Cost projection as a pure function of the text and chunk budget.
/// Chunk-output volume is assumed to compress to a fixed fraction of the
/// input; the merge step re-reads that output and emits a fixed budget.
pub fn estimate_cost(tokenizer: &Tokenizer, text: &str, max_chunk_tokens: usize) -> CostEstimate {
    let total_tokens = tokenizer.count_tokens(text);
    let chunks = tokenizer.split_into_chunks(text, max_chunk_tokens);

    let input_tokens: usize = chunks.iter().map(|c| tokenizer.count_tokens(c)).sum();
    let chunk_output_tokens = (input_tokens as f64 * OUTPUT_COMPRESSION_RATIO) as usize;
    let merge_input_tokens = chunk_output_tokens;
    let merge_output_tokens = MERGE_OUTPUT_TOKEN_BUDGET;

    let estimated_input_tokens = input_tokens + merge_input_tokens;
    let estimated_output_tokens = chunk_output_tokens + merge_output_tokens;

    let input_cost = estimated_input_tokens as f64 * INPUT_COST_PER_1K / 1000.0;
    let output_cost = estimated_output_tokens as f64 * OUTPUT_COST_PER_1K / 1000.0;

    CostEstimate {
        total_tokens,
        chunks: chunks.len(),
        estimated_input_tokens,
        estimated_output_tokens,
        total_cost: input_cost + output_cost,
        input_cost,
        output_cost,
    }
}

fn placeholder_summary(index: usize, error: &LlmCallError) -> String {
    format!(
        "## Chunk {} summary\n\n*Summary generation failed: {error}*",
        index + 1
    )
}

fn chunk_prompt(chunk: &Chunk) -> String {
    format!(
        "Analyze the following content (part {} of {}) and create a brief summary:\n\n\
         {}\n\n\
         Write a short, engaging summary that reads like a brief update. Focus on:\n\n\
         1. **What was accomplished** - Key changes, improvements, and technical enhancements\n\
         2. **Business impact** - How this affects users, operations, and system performance\n\
         3. **Notable highlights** - Most important points including technical achievements\n\
         4. **Technical details** - Relevant performance improvements, API changes, or system optimizations\n\n\
         Keep it simple, readable, and concise (under {} words), business-focused with \
         technical precision.\n\n\
         When issue-tracker references are present, use them for context and include the \
         relevant issue identifiers.",
        chunk.index + 1,
        chunk.total,
        chunk.text,
        CHUNK_SUMMARY_WORD_LIMIT
    )
}

fn merge_prompt(partial_count: usize, combined: &str) -> String {
    format!(
        "Create a brief, engaging summary from {partial_count} partial analyses.\n\n\
         Raw content from all sections:\n{combined}\n\n\
         Write this as a short article or update, not a detailed report. Structure:\n\n\
         1. **Brief overview** (2-3 sentences) - What was accomplished overall\n\
         2. **Key highlights** (3-4 bullet points) - Most important changes\n\n\
         Keep it under {MERGE_WORD_LIMIT} words total, conversational and article-style, \
         focused on business impact, user benefits, and technical achievements. Include \
         issue-tracker references where helpful."
    )
}

fn direct_prompt(text: &str, max_words: usize) -> String {
    format!(
        "Create a brief, engaging summary of the following content:\n\n\
         {text}\n\n\
         Write this as a short article or update, not a detailed report. Structure:\n\n\
         1. **Brief overview** (2-3 sentences) - What was accomplished overall\n\
         2. **Key highlights** (3-4 bullet points) - Most important changes\n\n\
         Keep it under {max_words} words total, conversational and article-style, focused \
         on business impact, user benefits, and technical achievements. Include \
         issue-tracker references where helpful."
    )
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;

    /// Backend that replays a fixed script of responses and records every
    /// request it sees.
    #[derive(Default)]
    struct ScriptState {
        responses: RefCell<VecDeque<Result<String, LlmCallError>>>,
        requests: RefCell<Vec<CompletionRequest>>,
    }

    struct ScriptedBackend {
        state: Rc<ScriptState>,
    }

    impl LlmBackend for ScriptedBackend {
        fn complete(&self, request: &CompletionRequest) -> Result<String, LlmCallError> {
            self.state.requests.borrow_mut().push(request.clone());
            self.state
                .responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(LlmCallError::Connection("script exhausted".into())))
        }
    }

    fn scripted(
        responses: Vec<Result<String, LlmCallError>>,
        opts: SummarizeOptions,
    ) -> (ChunkedSummarizer, Rc<ScriptState>) {
        let state = Rc::new(ScriptState {
            responses: RefCell::new(responses.into()),
            requests: RefCell::new(Vec::new()),
        });
        let backend = ScriptedBackend { state: Rc::clone(&state) };
        let summarizer = ChunkedSummarizer::with_backend(
            Box::new(backend),
            Tokenizer::new().expect("embedded encoding"),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
            },
            opts,
        );
        (summarizer, state)
    }

    fn rate_limited() -> Result<String, LlmCallError> {
        Err(LlmCallError::RateLimited("try later".into()))
    }

    // ── Per-chunk retry behavior ──

    #[test]
    fn test_retry_exhaustion_yields_placeholder() {
        let (s, state) = scripted(
            vec![rate_limited(), rate_limited(), rate_limited()],
            SummarizeOptions::default(),
        );
        let chunk = Chunk { text: "content".into(), index: 1, total: 3 };
        let partial = s.summarize_chunk(&chunk);

        assert_eq!(state.requests.borrow().len(), 3);
        assert!(partial.text.contains("Chunk 2"));
        assert!(partial.text.contains("Summary generation failed"));
        assert_eq!(partial.chunk_index, 1);
        assert_eq!(partial.total_chunks, 3);
    }

    #[test]
    fn test_permanent_failure_skips_retries() {
        let (s, state) = scripted(
            vec![Err(LlmCallError::Malformed("no choices".into()))],
            SummarizeOptions::default(),
        );
        let chunk = Chunk { text: "content".into(), index: 0, total: 1 };
        let partial = s.summarize_chunk(&chunk);

        assert_eq!(state.requests.borrow().len(), 1);
        assert!(partial.text.contains("Summary generation failed"));
    }

    #[test]
    fn test_transient_failure_then_success() {
        let (s, state) = scripted(
            vec![rate_limited(), Ok("recovered summary".into())],
            SummarizeOptions::default(),
        );
        let chunk = Chunk { text: "content".into(), index: 0, total: 2 };
        let partial = s.summarize_chunk(&chunk);

        assert_eq!(state.requests.borrow().len(), 2);
        assert_eq!(partial.text, "recovered summary");
    }

    // ── Merge ──

    #[test]
    fn test_merge_empty_returns_no_content_summary() {
        let (s, state) = scripted(vec![], SummarizeOptions::default());
        let summary = s.merge_summaries(&[]);

        assert_eq!(state.requests.borrow().len(), 0);
        assert_eq!(summary.body, NO_CONTENT_BODY);
        assert!(summary.render().starts_with("# Executive Summary\n\n"));
    }

    #[test]
    fn test_merge_single_forwards_unchanged() {
        let (s, state) = scripted(vec![], SummarizeOptions::default());
        let partial = PartialSummary {
            text: "lone chunk summary".into(),
            chunk_index: 0,
            total_chunks: 1,
        };
        let summary = s.merge_summaries(&[partial]);

        assert_eq!(state.requests.borrow().len(), 0);
        assert_eq!(summary.body, "lone chunk summary");
    }

    #[test]
    fn test_merge_multi_issues_one_call() {
        let (s, state) = scripted(vec![Ok("merged narrative".into())], SummarizeOptions::default());
        let partials = vec![
            PartialSummary { text: "part one".into(), chunk_index: 0, total_chunks: 2 },
            PartialSummary { text: "part two".into(), chunk_index: 1, total_chunks: 2 },
        ];
        let summary = s.merge_summaries(&partials);

        let requests = state.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].user_prompt.contains("2 partial analyses"));
        assert!((requests[0].temperature - MERGE_TEMPERATURE).abs() < f32::EPSILON);
        assert_eq!(summary.body, "merged narrative");
    }

    #[test]
    fn test_merge_exhaustion_falls_back_to_concatenation() {
        let (s, _state) = scripted(
            vec![rate_limited(), rate_limited(), rate_limited()],
            SummarizeOptions::default(),
        );
        let partials = vec![
            PartialSummary { text: "alpha findings".into(), chunk_index: 0, total_chunks: 2 },
            PartialSummary { text: "beta findings".into(), chunk_index: 1, total_chunks: 2 },
        ];
        let summary = s.merge_summaries(&partials);

        assert!(summary.body.contains("alpha findings"));
        assert!(summary.body.contains("beta findings"));
    }

    // ── End-to-end pipeline ──

    fn multi_chunk_text() -> String {
        "The ingestion service gained backpressure handling this cycle. \
         Query planning now caches prepared statements across sessions. \
         A long-standing race in the scheduler was finally diagnosed and fixed. \
         Operators can now drain a node without dropping in-flight work. "
            .repeat(10)
    }

    #[test]
    fn test_end_to_end_multi_chunk_pipeline() {
        let opts = SummarizeOptions { max_chunk_tokens: 120, max_final_words: 300 };
        let tokenizer = Tokenizer::new().expect("embedded encoding");
        let text = multi_chunk_text();
        let chunk_count = tokenizer.split_into_chunks(&text, opts.max_chunk_tokens).len();
        assert!(chunk_count > 1, "fixture must force the chunked path");

        let mut responses: Vec<Result<String, LlmCallError>> = (0..chunk_count)
            .map(|i| Ok(format!("summary of part {}", i + 1)))
            .collect();
        responses.push(Ok("the merged weekly digest".into()));

        let (s, state) = scripted(responses, opts);
        let summary = s.summarize_document(&text).expect("pipeline completes");

        let requests = state.requests.borrow();
        // One call per chunk, then exactly one merge call.
        assert_eq!(requests.len(), chunk_count + 1);
        assert!(requests[0]
            .user_prompt
            .contains(&format!("part 1 of {chunk_count}")));
        assert!(requests[chunk_count]
            .user_prompt
            .contains(&format!("{chunk_count} partial analyses")));

        let rendered = summary.render();
        assert!(rendered.starts_with("# Executive Summary\n\n"));
        assert!(rendered.contains("the merged weekly digest"));
        let trailer = Regex::new(r"\*Generated from \d+ words \((\d{1,3},)*\d{1,3} tokens\)\*")
            .expect("valid regex");
        assert!(trailer.is_match(&rendered), "bad trailer: {rendered}");
    }

    #[test]
    fn test_end_to_end_single_chunk_takes_direct_path() {
        let (s, state) = scripted(
            vec![Ok("a compact direct summary".into())],
            SummarizeOptions::default(),
        );
        let summary = s
            .summarize_document("A small change landed. Nothing else happened this week.")
            .expect("pipeline completes");

        let requests = state.requests.borrow();
        assert_eq!(requests.len(), 1, "no per-chunk or merge calls");
        assert!(requests[0].user_prompt.contains("under 300 words"));
        assert_eq!(summary.body, "a compact direct summary");
    }

    #[test]
    fn test_direct_path_failure_degrades_to_annotated_text() {
        let (s, _state) = scripted(
            vec![Err(LlmCallError::Malformed("empty completion".into()))],
            SummarizeOptions::default(),
        );
        let summary = s.summarize_document("One tiny sentence.").expect("still produces text");
        assert!(summary.body.contains("Summary generation failed"));
        assert!(summary.render().starts_with("# Executive Summary"));
    }

    #[test]
    fn test_empty_input_rejected_before_any_call() {
        let (s, state) = scripted(vec![], SummarizeOptions::default());
        let err = s.summarize_document("   \n  ").unwrap_err();
        assert!(matches!(err, DigestError::InvalidInput(_)));
        assert_eq!(state.requests.borrow().len(), 0);
    }

    // ── Cost estimation ──

    #[test]
    fn test_estimate_cost_is_monotone_in_document_size() {
        let tokenizer = Tokenizer::new().expect("embedded encoding");
        let base = multi_chunk_text();
        let doubled = format!("{base}{base}");

        let small = estimate_cost(&tokenizer, &base, 120);
        let large = estimate_cost(&tokenizer, &doubled, 120);

        assert!(large.total_tokens > small.total_tokens);
        assert!(large.total_cost >= small.total_cost);
        assert!(large.estimated_input_tokens >= small.estimated_input_tokens);
    }

    #[test]
    fn test_estimate_cost_shape_for_small_document() {
        let tokenizer = Tokenizer::new().expect("embedded encoding");
        let estimate = estimate_cost(&tokenizer, "Tiny document.", 10_000);

        assert_eq!(estimate.chunks, 1);
        assert!(estimate.total_tokens > 0);
        assert!(estimate.total_cost > 0.0);
        assert!((estimate.total_cost - (estimate.input_cost + estimate.output_cost)).abs() < 1e-12);
        // Merge constant dominates tiny inputs.
        assert!(estimate.estimated_output_tokens >= MERGE_OUTPUT_TOKEN_BUDGET);
    }

    // ── Formatting ──

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(25_431), "25,431");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_final_summary_counts_reflect_body() {
        let (s, _state) = scripted(vec![], SummarizeOptions::default());
        let summary = s.format_final("  five words are in here  ");
        assert_eq!(summary.body, "five words are in here");
        assert_eq!(summary.word_count, 5);
        assert!(summary.token_count > 0);
    }
}
