//! Slack Web API access
//!
//! The fetcher only talks to Slack through [`SlackApi`], so it can be driven
//! by [`SlackClient`] in production and by an in-memory stub in tests.

pub mod client;
pub mod format;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::Retryable;

pub use client::SlackClient;
pub use types::{HistoryPage, HistoryRequest, RawMessage, SlackUser};

/// Slack error codes that mean the token itself is unusable.
const AUTH_ERRORS: &[&str] = &[
    "not_authed",
    "invalid_auth",
    "account_inactive",
    "token_revoked",
    "token_expired",
    "no_permission",
    "missing_scope",
];

/// Slack error codes worth another attempt.
const TRANSIENT_ERRORS: &[&str] = &[
    "internal_error",
    "fatal_error",
    "service_unavailable",
    "request_timeout",
];

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited by slack")]
    RateLimited { retry_after: Option<Duration> },

    #[error("slack returned server error {0}")]
    Server(u16),

    #[error("slack is temporarily failing: {0}")]
    Transient(String),

    #[error("slack api error: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SlackError {
    /// Map the `error` field of a `{"ok": false}` envelope.
    pub fn from_code(code: &str) -> Self {
        if code == "ratelimited" || code == "rate_limited" {
            SlackError::RateLimited { retry_after: None }
        } else if AUTH_ERRORS.contains(&code) {
            SlackError::Auth(code.to_string())
        } else if TRANSIENT_ERRORS.contains(&code) {
            SlackError::Transient(code.to_string())
        } else {
            SlackError::Api(code.to_string())
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, SlackError::Auth(_))
    }
}

impl Retryable for SlackError {
    fn is_retryable(&self) -> bool {
        match self {
            SlackError::RateLimited { .. } | SlackError::Server(_) | SlackError::Transient(_) => true,
            SlackError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SlackError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// The three Web API methods the dashboard reads from.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// `conversations.history`: one page of channel messages, newest first.
    async fn conversations_history(&self, request: &HistoryRequest) -> Result<HistoryPage, SlackError>;

    /// `conversations.replies`: the parent message followed by its replies.
    async fn conversations_replies(&self, channel: &str, ts: &str) -> Result<Vec<Value>, SlackError>;

    /// `users.info`
    async fn users_info(&self, user_id: &str) -> Result<SlackUser, SlackError>;
}
