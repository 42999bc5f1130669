//! Error types for the feedback service
//!
//! Library code returns [`FeedbackError`] through the [`Result`] alias; the
//! binary wraps it with anyhow context, and the HTTP layer maps each variant to
//! a status code in [`crate::api::error`].

use thiserror::Error;

/// Main error type for feedback operations
#[derive(Error, Debug)]
pub enum FeedbackError {
    /// Malformed request body or document content
    #[error("Validation error: {0}")]
    Validation(String),

    /// Native identity token is not well formed
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// No document matched
    #[error("Not found: {0}")]
    NotFound(String),

    /// Insert or update violated a uniqueness constraint
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Database operation failed
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Remote sentiment scoring failed
    #[error("Sentiment analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    /// Stored document or aggregation result has an unexpected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for feedback operations
pub type Result<T> = std::result::Result<T, FeedbackError>;

impl FeedbackError {
    /// Whether this error is a uniqueness conflict that bulk paths tolerate
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, FeedbackError::DuplicateKey(_))
    }
}

/// SQLite reports uniqueness violations as constraint failures on the index
impl From<libsql::Error> for FeedbackError {
    fn from(err: libsql::Error) -> Self {
        let message = err.to_string();
        if message.contains("UNIQUE constraint failed") {
            FeedbackError::DuplicateKey(message)
        } else {
            FeedbackError::StoreUnavailable(message)
        }
    }
}
