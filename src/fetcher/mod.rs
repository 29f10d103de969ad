//! Message Fetcher
//!
//! Walks a channel's history page by page, newest first, and keeps the
//! messages that mention the keyword inside a `[since, until]` window.
//!
//! - Paging stops at the first page that reaches past `since`, when Slack
//!   reports no more pages, or when the scan limit is hit.
//! - Malformed messages are skipped, not fatal.
//! - Authors are resolved once per sender per call.
//! - Rate limits and transient failures are retried with [`RetryPolicy`].

pub mod threads;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{with_retry, RetryPolicy, Retryable};
use crate::model::{parse_slack_ts, to_slack_ts, Message};
use crate::slack::format::contains_keyword;
use crate::slack::{HistoryRequest, RawMessage, SlackApi, SlackError};

pub use threads::ThreadStats;

/// Slack's maximum `conversations.history` page size.
pub const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid lookback window: {since} is after {until}")]
    InvalidWindow {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },

    #[error("slack rejected the bot token ({0}); check SLACK_BOT_TOKEN")]
    Auth(String),

    #[error("slack is temporarily unavailable after {attempts} attempts: {source}")]
    Unavailable {
        attempts: u32,
        #[source]
        source: SlackError,
    },

    #[error("slack api error: {0}")]
    Api(#[source] SlackError),
}

impl FetchError {
    /// Configuration problems the dashboard cannot recover from by retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Auth(_))
    }

    fn from_slack(error: SlackError, policy: &RetryPolicy) -> Self {
        match error {
            SlackError::Auth(code) => FetchError::Auth(code),
            e if e.is_retryable() => FetchError::Unavailable {
                attempts: policy.max_attempts.max(1),
                source: e,
            },
            e => FetchError::Api(e),
        }
    }
}

pub struct MessageFetcher {
    api: Arc<dyn SlackApi>,
    retry: RetryPolicy,
    page_size: usize,
    scan_limit: usize,
}

impl MessageFetcher {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self {
            api,
            retry: RetryPolicy::default(),
            page_size: MAX_PAGE_SIZE,
            scan_limit: 1000,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Cap on the number of history messages examined per fetch
    pub fn with_scan_limit(mut self, scan_limit: usize) -> Self {
        self.scan_limit = scan_limit.max(1);
        self
    }

    /// Fetch the messages in `channel_id` posted within `[since, until]`
    /// whose text contains `keyword` (case-insensitive), newest first.
    pub async fn fetch_messages(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        keyword: &str,
    ) -> Result<Vec<Message>, FetchError> {
        if since > until {
            return Err(FetchError::InvalidWindow { since, until });
        }

        let mut authors = AuthorCache::default();
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut scanned = 0usize;
        let mut pages = 0usize;
        let mut skipped = 0usize;

        loop {
            let request = HistoryRequest {
                channel: channel_id.to_string(),
                cursor: cursor.take(),
                oldest: Some(to_slack_ts(since)),
                latest: Some(to_slack_ts(until)),
                limit: self.page_size.min(self.scan_limit - scanned),
            };

            let page = with_retry(&self.retry, "conversations.history", || {
                self.api.conversations_history(&request)
            })
            .await
            .map_err(|e| FetchError::from_slack(e, &self.retry))?;
            pages += 1;

            let mut crossed_window = false;

            for value in page.messages {
                scanned += 1;

                let Some(raw) = RawMessage::decode(value) else {
                    skipped += 1;
                    debug!(channel = channel_id, "skipping malformed message");
                    continue;
                };
                let Some(timestamp) = parse_slack_ts(&raw.ts) else {
                    skipped += 1;
                    debug!(channel = channel_id, ts = %raw.ts, "skipping message with bad ts");
                    continue;
                };

                if timestamp < since {
                    crossed_window = true;
                    continue;
                }
                if timestamp > until || !contains_keyword(&raw.text, keyword) {
                    continue;
                }
                // Bot posts and channel events carry no user
                let Some(user_id) = raw.user else {
                    continue;
                };

                let author = authors.resolve(self, &user_id).await;
                records.push(Message {
                    ts: raw.ts,
                    timestamp,
                    user_id,
                    author,
                    text: raw.text,
                    matched_keyword: true,
                });
            }

            if crossed_window || !page.has_more || scanned >= self.scan_limit {
                break;
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        info!(
            channel = channel_id,
            pages,
            scanned,
            skipped,
            matched = records.len(),
            lookups = authors.lookups,
            "fetched channel history"
        );

        Ok(records)
    }

    /// Reply statistics for the threads started by `messages`.
    pub async fn thread_stats(&self, channel_id: &str, messages: &[Message]) -> ThreadStats {
        threads::collect(self, channel_id, messages).await
    }

    /// Display name for `user_id`, falling back to the id itself.
    async fn lookup_author(&self, user_id: &str) -> String {
        match with_retry(&self.retry, "users.info", || self.api.users_info(user_id)).await {
            Ok(user) => user.display_name(),
            Err(e) => {
                debug!(user = user_id, error = %e, "author lookup failed, using raw id");
                user_id.to_string()
            }
        }
    }
}

/// Per-call memo of `users.info` results.
#[derive(Default)]
pub(crate) struct AuthorCache {
    names: HashMap<String, String>,
    lookups: usize,
}

impl AuthorCache {
    pub(crate) async fn resolve(&mut self, fetcher: &MessageFetcher, user_id: &str) -> String {
        if let Some(name) = self.names.get(user_id) {
            return name.clone();
        }

        self.lookups += 1;
        let name = fetcher.lookup_author(user_id).await;
        self.names.insert(user_id.to_string(), name.clone());
        name
    }
}
