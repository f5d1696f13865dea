//! Token counting and sentence-aligned chunk splitting.
//!
//! Counting uses the `cl100k_base` BPE encoding via `tiktoken-rs`, so the
//! numbers match what the target model is actually billed for — word-count
//! approximations would mis-gate both chunking and cost estimation.

use regex::Regex;
use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::error::{DigestError, DigestResult};

pub struct Tokenizer {
    bpe: CoreBPE,
}

impl Tokenizer {
    pub fn new() -> DigestResult<Self> {
        let bpe = cl100k_base().map_err(|e| DigestError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }

    /// Exact token count under `cl100k_base`.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Split `text` into chunks of at most `max_tokens` tokens, aligned to
    /// sentence boundaries.
    ///
    /// Text that already fits is returned as a single chunk. Otherwise
    /// sentences are accumulated greedily: when the next sentence would push
    /// the running chunk over budget, the chunk is sealed and a new one
    /// starts with that sentence. A single sentence that alone exceeds
    /// `max_tokens` becomes its own over-budget chunk — it is never split
    /// further and never dropped.
    ///
    /// Pure function of `(text, max_tokens)`: repeated calls yield identical
    /// output. Sentence order is preserved and no chunk is empty.
    pub fn split_into_chunks(&self, text: &str, max_tokens: usize) -> Vec<String> {
        if self.count_tokens(text) <= max_tokens {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();

        for sentence in split_sentences(text) {
            let mut candidate = current.clone();
            candidate.push_str(sentence);
            candidate.push_str("\n\n");

            if self.count_tokens(&candidate) <= max_tokens {
                current = candidate;
            } else {
                if !current.is_empty() {
                    chunks.push(current.trim().to_string());
                }
                current = format!("{sentence}\n\n");
            }
        }

        if !current.is_empty() {
            chunks.push(current.trim().to_string());
        }

        chunks
    }
}

/// Split text into sentences. A boundary is whitespace following `.`, `!`
/// or `?` — a heuristic that mis-splits abbreviations ("Dr. Smith"), which
/// is an accepted limitation: chunk edges land slightly off, content is
/// never lost.
fn split_sentences(text: &str) -> Vec<&str> {
    let boundary = Regex::new(r"[.!?]\s+").unwrap();

    let mut sentences = Vec::new();
    let mut start = 0;
    for m in boundary.find_iter(text) {
        // Keep the terminator (one ASCII byte), drop the whitespace.
        let end = m.start() + 1;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new().expect("cl100k_base is embedded")
    }

    // ── Sentence splitting ──

    #[test]
    fn test_split_sentences_basic() {
        let sentences = split_sentences("First one. Second one! Third one? Tail without end");
        assert_eq!(
            sentences,
            vec!["First one.", "Second one!", "Third one?", "Tail without end"]
        );
    }

    #[test]
    fn test_split_sentences_multiline_whitespace() {
        let sentences = split_sentences("Alpha.\n\nBeta.   Gamma.");
        assert_eq!(sentences, vec!["Alpha.", "Beta.", "Gamma."]);
    }

    #[test]
    fn test_split_sentences_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n  ").is_empty());
    }

    #[test]
    fn test_split_sentences_abbreviation_limitation() {
        // Known heuristic limitation: "Dr." ends a sentence.
        let sentences = split_sentences("Dr. Smith agreed.");
        assert_eq!(sentences, vec!["Dr.", "Smith agreed."]);
    }

    // ── Chunking ──

    #[test]
    fn test_small_text_single_chunk_identity() {
        let t = tokenizer();
        let text = "A short note. Nothing to split here.";
        assert_eq!(t.split_into_chunks(text, 10_000), vec![text.to_string()]);
    }

    #[test]
    fn test_chunks_respect_token_budget() {
        let t = tokenizer();
        let text = "The deploy pipeline was rebuilt this week. \
                    Cache invalidation now happens per tenant. \
                    Latency dropped by forty percent on the hot path. \
                    Two regressions were found and fixed before release. \
                    Documentation was updated to match the new flow. "
            .repeat(4);
        let max = 60;
        let chunks = t.split_into_chunks(&text, max);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(t.count_tokens(chunk) <= max, "chunk over budget: {chunk}");
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn test_chunks_preserve_all_sentences_in_order() {
        let t = tokenizer();
        let text = "One ends here. Two ends here. Three ends here. \
                    Four ends here. Five ends here. Six ends here. "
            .repeat(6);
        let chunks = t.split_into_chunks(&text, 40);
        assert!(chunks.len() > 1);

        let original: Vec<&str> = split_sentences(&text);
        let rejoined = chunks.join("\n\n");
        let recovered: Vec<&str> = split_sentences(&rejoined);
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_oversized_sentence_becomes_own_chunk() {
        let t = tokenizer();
        let giant = format!("{} and then some.", "endless clause, ".repeat(40));
        let text = format!("Short lead-in. {giant} Short tail.");
        let max = 20;
        assert!(t.count_tokens(&giant) > max);

        let chunks = t.split_into_chunks(&text, max);
        // The giant sentence survives intact as one over-budget chunk.
        assert!(chunks.iter().any(|c| c.contains("and then some.")));
        let giant_chunk = chunks
            .iter()
            .find(|c| c.contains("and then some."))
            .expect("oversized sentence kept");
        assert!(t.count_tokens(giant_chunk) > max);
        // Everything else stays within budget.
        for chunk in chunks.iter().filter(|c| !c.contains("and then some.")) {
            assert!(t.count_tokens(chunk) <= max);
        }
    }

    #[test]
    fn test_split_is_idempotent() {
        let t = tokenizer();
        let text = "Same in, same out. Every single time. No hidden state. \
                    The splitter is pure. "
            .repeat(8);
        let a = t.split_into_chunks(&text, 30);
        let b = t.split_into_chunks(&text, 30);
        assert_eq!(a, b);
    }

    #[test]
    fn test_count_tokens_nonzero_for_text() {
        let t = tokenizer();
        assert_eq!(t.count_tokens(""), 0);
        assert!(t.count_tokens("hello world") >= 2);
    }
}
