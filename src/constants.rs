// === Chunking ===
pub const MAX_CHUNK_TOKENS: usize = 10_000;
pub const MAX_FINAL_WORDS: usize = 300;
pub const CHUNK_SUMMARY_WORD_LIMIT: usize = 100;
pub const MERGE_WORD_LIMIT: usize = 250;

// === LLM calls ===
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const CHUNK_TEMPERATURE: f32 = 0.3;
pub const MERGE_TEMPERATURE: f32 = 0.2;
pub const CALL_MAX_OUTPUT_TOKENS: u32 = 1_000;
pub const LLM_TIMEOUT_SECS: u64 = 120;

// === Retry ===
pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_BASE_DELAY_SECS: u64 = 2; // doubles each retry: 2s, 4s, 8s

// === Cost model (gpt-4o-mini, per 1K tokens) ===
pub const INPUT_COST_PER_1K: f64 = 0.000_15;
pub const OUTPUT_COST_PER_1K: f64 = 0.000_6;
pub const OUTPUT_COMPRESSION_RATIO: f64 = 0.2; // expected summary/input token ratio
pub const MERGE_OUTPUT_TOKEN_BUDGET: usize = 800;
pub const COST_CONFIRM_THRESHOLD_USD: f64 = 1.0;

// === GitHub ===
pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const GITHUB_PER_PAGE: u32 = 100;
pub const GITHUB_TIMEOUT_SECS: u64 = 30;
pub const PR_BODY_EXCERPT_CHARS: usize = 500;

// === Slack ===
pub const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";
pub const SLACK_SECTION_LIMIT: usize = 3_000; // Block Kit section text cap
pub const SLACK_TIMEOUT_SECS: u64 = 15;
