use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    /// Missing or unusable credentials / configuration. Fail-fast: reported
    /// before any chunking or network work starts.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Non-success response from the GitHub REST API.
    #[error("GitHub API error ({status}): {message}")]
    GithubApi { status: u16, message: String },

    /// Transport-level failure talking to a remote API.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Slack delivery error: {0}")]
    Slack(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Date parse errors from chrono
    #[error("Date parse error: {0}")]
    DateParse(#[from] chrono::ParseError),
}

pub type DigestResult<T> = Result<T, DigestError>;
