#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use acq_dash::slack::{HistoryPage, HistoryRequest, SlackApi, SlackError, SlackUser};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

pub fn slack_msg(at: DateTime<Utc>, user: &str, text: &str) -> Value {
    json!({
        "type": "message",
        "ts": format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros()),
        "user": user,
        "text": text,
    })
}

pub fn page(messages: Vec<Value>, next_cursor: Option<&str>) -> HistoryPage {
    HistoryPage {
        messages,
        has_more: next_cursor.is_some(),
        next_cursor: next_cursor.map(str::to_string),
    }
}

/// Blocks the next `conversations.history` call until released, so tests
/// can hold a fetch open. Later calls pass straight through.
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// In-memory Slack serving scripted history pages keyed by cursor.
#[derive(Default)]
pub struct StubSlack {
    pages: HashMap<Option<String>, HistoryPage>,
    users: HashMap<String, String>,
    replies: HashMap<String, Vec<Value>>,
    history_errors: Mutex<VecDeque<SlackError>>,
    always_fail: Mutex<Option<fn() -> SlackError>>,
    full_scan_fail: Mutex<Option<fn() -> SlackError>>,
    gate: Mutex<Option<Arc<Gate>>>,

    pub history_calls: AtomicUsize,
    pub requests: Mutex<Vec<HistoryRequest>>,
    pub user_lookups: Mutex<Vec<String>>,
}

impl StubSlack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page served for `cursor` (`None` is the first page)
    pub fn with_page(mut self, cursor: Option<&str>, page: HistoryPage) -> Self {
        self.pages.insert(cursor.map(str::to_string), page);
        self
    }

    pub fn with_user(mut self, id: &str, real_name: &str) -> Self {
        self.users.insert(id.to_string(), real_name.to_string());
        self
    }

    pub fn with_replies(mut self, ts: &str, replies: Vec<Value>) -> Self {
        self.replies.insert(ts.to_string(), replies);
        self
    }

    /// Fail the next history calls with these errors, in order
    pub fn failing_with(self, errors: Vec<SlackError>) -> Self {
        *self.history_errors.lock() = errors.into();
        self
    }

    pub fn with_gate(self, gate: Arc<Gate>) -> Self {
        *self.gate.lock() = Some(gate);
        self
    }

    /// Make every subsequent history call fail
    pub fn fail_always(&self, error: fn() -> SlackError) {
        *self.always_fail.lock() = Some(error);
    }

    /// Fail history calls that start at the epoch, leaving bounded windows alone
    pub fn fail_full_scans(&self, error: fn() -> SlackError) {
        *self.full_scan_fail.lock() = Some(error);
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn cursors_requested(&self) -> Vec<Option<String>> {
        self.requests.lock().iter().map(|r| r.cursor.clone()).collect()
    }
}

#[async_trait]
impl SlackApi for StubSlack {
    async fn conversations_history(&self, request: &HistoryRequest) -> Result<HistoryPage, SlackError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let always = *self.always_fail.lock();
        if let Some(make) = always {
            return Err(make());
        }
        let full_scan = *self.full_scan_fail.lock();
        if let Some(make) = full_scan.filter(|_| request.oldest.as_deref() == Some("0.000000")) {
            return Err(make());
        }
        let scripted = self.history_errors.lock().pop_front();
        if let Some(error) = scripted {
            return Err(error);
        }

        self.pages
            .get(&request.cursor)
            .cloned()
            .ok_or_else(|| SlackError::Api(format!("unexpected cursor {:?}", request.cursor)))
    }

    async fn conversations_replies(&self, _channel: &str, ts: &str) -> Result<Vec<Value>, SlackError> {
        Ok(self.replies.get(ts).cloned().unwrap_or_default())
    }

    async fn users_info(&self, user_id: &str) -> Result<SlackUser, SlackError> {
        self.user_lookups.lock().push(user_id.to_string());

        match self.users.get(user_id) {
            Some(name) => Ok(SlackUser {
                id: user_id.to_string(),
                real_name: Some(name.clone()),
                ..Default::default()
            }),
            None => Err(SlackError::Api("user_not_found".to_string())),
        }
    }
}
