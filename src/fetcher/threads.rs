//! Thread reply statistics: who answered, how fast, and which answers were
//! marked as resolving the request.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use super::{AuthorCache, MessageFetcher};
use crate::error::with_retry;
use crate::model::{parse_slack_ts, Message};
use crate::slack::RawMessage;

/// Reaction that marks a reply as the accepted answer.
pub const RESOLVED_REACTION: &str = "white_check_mark";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreadStats {
    pub total_threads: usize,
    pub threads_with_replies: usize,
    pub threads_with_resolution: usize,

    /// Minutes from parent to first reply, positive values only
    pub response_times: Vec<f64>,

    /// Replies per responder
    pub responders: BTreeMap<String, usize>,

    /// Replies carrying the resolved reaction, per author, best first
    pub top_performers: Vec<(String, usize)>,
}

impl ThreadStats {
    pub fn response_rate(&self) -> f64 {
        percentage(self.threads_with_replies, self.total_threads)
    }

    pub fn resolution_rate(&self) -> f64 {
        percentage(self.threads_with_resolution, self.total_threads)
    }

    pub fn average_response_minutes(&self) -> Option<f64> {
        if self.response_times.is_empty() {
            return None;
        }
        Some(self.response_times.iter().sum::<f64>() / self.response_times.len() as f64)
    }

    /// Upper median, matching how the figure has always been reported.
    pub fn median_response_minutes(&self) -> Option<f64> {
        if self.response_times.is_empty() {
            return None;
        }
        let mut sorted = self.response_times.clone();
        sorted.sort_by(f64::total_cmp);
        Some(sorted[sorted.len() / 2])
    }

    pub fn active_responders(&self) -> usize {
        self.responders.len()
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub(super) async fn collect(fetcher: &MessageFetcher, channel_id: &str, messages: &[Message]) -> ThreadStats {
    let mut stats = ThreadStats {
        total_threads: messages.len(),
        ..Default::default()
    };
    let mut authors = AuthorCache::default();
    let mut scores: BTreeMap<String, usize> = BTreeMap::new();

    for parent in messages {
        let replies = match with_retry(&fetcher.retry, "conversations.replies", || {
            fetcher.api.conversations_replies(channel_id, &parent.ts)
        })
        .await
        {
            Ok(replies) => replies,
            Err(e) => {
                debug!(ts = %parent.ts, error = %e, "skipping thread");
                continue;
            }
        };

        // First entry is the parent itself
        let replies: Vec<RawMessage> = replies
            .into_iter()
            .skip(1)
            .filter_map(RawMessage::decode)
            .collect();

        if replies.is_empty() {
            continue;
        }
        stats.threads_with_replies += 1;

        if let Some(first) = parse_slack_ts(&replies[0].ts) {
            let minutes = (first - parent.timestamp).num_milliseconds() as f64 / 60_000.0;
            if minutes > 0.0 {
                stats.response_times.push(minutes);
            }
        }

        let mut resolved = false;
        for reply in &replies {
            let accepted = reply.has_reaction(RESOLVED_REACTION);
            resolved |= accepted;

            // bot and workflow replies resolve a thread but have nobody to credit
            let Some(user_id) = reply.user.as_deref() else {
                continue;
            };
            let name = authors.resolve(fetcher, user_id).await;
            *stats.responders.entry(name.clone()).or_default() += 1;

            if accepted {
                *scores.entry(name).or_default() += 1;
            }
        }
        if resolved {
            stats.threads_with_resolution += 1;
        }
    }

    let mut top: Vec<(String, usize)> = scores.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    stats.top_performers = top;

    info!(
        channel = channel_id,
        threads = stats.total_threads,
        answered = stats.threads_with_replies,
        resolved = stats.threads_with_resolution,
        "collected thread stats"
    );

    stats
}
