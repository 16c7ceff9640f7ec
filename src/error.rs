//! Error types for the poem pipeline, configuration, and chat delivery.
//!
//! Pipeline failures are split by cause so the dispatcher can log them at the
//! right severity, but all of them end in the same apology message for the
//! user:
//!
//! | Variant | Cause | Log level |
//! |---------|-------|-----------|
//! | [`PipelineError::Network`] | connection failure, non-2xx status | `warn` |
//! | [`PipelineError::Timeout`] | no response within the fetch timeout | `warn` |
//! | [`PipelineError::Extraction`] | expected node or field missing | `error` |
//! | [`PipelineError::EmptyBody`] | normalization produced no lines | `warn` |

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching, extracting, or normalizing a poem.
///
/// The type is `Clone` because a failed fetch is cached for the rest of the
/// day and handed to every caller that asks for that date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Connection failure or non-success HTTP status
    #[error("network error: {0}")]
    Network(String),

    /// Upstream did not answer within the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Expected structural node or field is absent from the document
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Normalization left nothing to deliver
    #[error("poem body is empty after normalization")]
    EmptyBody,
}

impl PipelineError {
    /// Classify a reqwest error.
    ///
    /// `timeout` is the configured limit, reported back in the
    /// [`PipelineError::Timeout`] message.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            PipelineError::Timeout(timeout)
        } else {
            PipelineError::Network(err.to_string())
        }
    }

    /// True for failures that point at a change in the upstream page format.
    pub fn is_structural(&self) -> bool {
        matches!(self, PipelineError::Extraction(_))
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid CSS selector for `{field}`: {reason}")]
    Selector { field: &'static str, reason: String },

    #[error("invalid pattern for `{field}`")]
    Pattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("invalid JSON pointer for `{field}`: {value}")]
    Pointer { field: &'static str, value: String },

    #[error("unknown timezone: {0}")]
    Timezone(String),

    #[error("invalid job time `{0}`: expected HH:MM")]
    JobTime(String),

    #[error("invalid cron expression `{expr}`: {reason}")]
    Cron { expr: String, reason: String },

    #[error("scheduled job needs either `at` or `cron`")]
    JobWithoutTime,

    #[error("invalid endpoint URL: {0}")]
    Endpoint(String),

    #[error("failed to create HTTP client")]
    Client(#[source] reqwest::Error),
}

/// Errors raised by a chat transport while sending one message.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("no webhook configured for destination `{0}`")]
    UnknownDestination(String),

    #[error("chat endpoint rejected message with status {0}")]
    Rejected(u16),

    #[error("failed to reach chat endpoint")]
    Transport(#[source] reqwest::Error),

    #[error("failed to write message")]
    Io(#[from] std::io::Error),
}
