//! Error types for rate fetches.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching a rate.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("non-200 status code: {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),

    #[error("fetch task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::Decode(err.to_string())
        } else {
            FeedError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for FeedError {
    fn from(err: url::ParseError) -> Self {
        FeedError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Decode(err.to_string())
    }
}

impl FeedError {
    /// Returns true if this error is transient and likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Transport(_) | FeedError::Timeout(_) => true,
            FeedError::Status(code) => *code == 429 || (500..600).contains(code),
            FeedError::Remote { .. }
            | FeedError::Decode(_)
            | FeedError::InvalidUrl(_)
            | FeedError::Task(_) => false,
        }
    }

    /// Returns a suggested retry delay for this error type, if applicable.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            FeedError::Status(429) => Some(Duration::from_secs(5)),
            e if e.is_transient() => Some(Duration::from_millis(500)),
            _ => None,
        }
    }
}

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;
