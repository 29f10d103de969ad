/// Slack Web API client
///
/// Thin reqwest wrapper: bearer auth, HTTP status mapping, and the
/// `{"ok": false, "error": ...}` envelope turned into [`SlackError`].
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::types::{HistoryResponse, RepliesResponse, UserResponse};
use super::{HistoryPage, HistoryRequest, SlackApi, SlackError, SlackUser};

/// Slack caps `conversations.replies` pages at 1000.
const REPLIES_LIMIT: usize = 1000;

/// Slack Web API client
pub struct SlackClient {
    base_url: Url,
    token: String,
    client: Client,
}

impl SlackClient {
    /// Create new client against `base_url` (normally `https://slack.com/api`)
    pub fn new(base_url: Url, token: impl Into<String>) -> Result<Self, SlackError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("acq-dash/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            token: token.into(),
            client,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, SlackError> {
        let response = self
            .client
            .get(self.endpoint(method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(SlackError::RateLimited { retry_after });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SlackError::Auth(status.to_string()));
        }

        if status.is_server_error() {
            return Err(SlackError::Server(status.as_u16()));
        }

        if !status.is_success() {
            return Err(SlackError::Api(format!("{} returned {}", method, status)));
        }

        let body: Value = response.json().await?;
        check_envelope(&body)?;

        serde_json::from_value(body).map_err(|e| SlackError::Malformed(format!("{}: {}", method, e)))
    }
}

/// Slack answers HTTP 200 for most failures and reports them in the body.
fn check_envelope(body: &Value) -> Result<(), SlackError> {
    if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(());
    }

    let code = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");

    Err(SlackError::from_code(code))
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn conversations_history(&self, request: &HistoryRequest) -> Result<HistoryPage, SlackError> {
        let mut query = vec![
            ("channel", request.channel.clone()),
            ("limit", request.limit.to_string()),
            ("inclusive", "true".to_string()),
        ];
        if let Some(cursor) = &request.cursor {
            query.push(("cursor", cursor.clone()));
        }
        if let Some(oldest) = &request.oldest {
            query.push(("oldest", oldest.clone()));
        }
        if let Some(latest) = &request.latest {
            query.push(("latest", latest.clone()));
        }

        let response: HistoryResponse = self.call("conversations.history", &query).await?;
        Ok(response.into())
    }

    async fn conversations_replies(&self, channel: &str, ts: &str) -> Result<Vec<Value>, SlackError> {
        let query = [
            ("channel", channel.to_string()),
            ("ts", ts.to_string()),
            ("limit", REPLIES_LIMIT.to_string()),
        ];

        let response: RepliesResponse = self.call("conversations.replies", &query).await?;
        Ok(response.messages)
    }

    async fn users_info(&self, user_id: &str) -> Result<SlackUser, SlackError> {
        let query = [("user", user_id.to_string())];

        let response: UserResponse = self.call("users.info", &query).await?;
        Ok(response.user)
    }
}
