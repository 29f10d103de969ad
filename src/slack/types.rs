use serde::Deserialize;
use serde_json::Value;

/// One request against `conversations.history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub channel: String,
    pub cursor: Option<String>,
    /// Lower bound hint, Slack `ts` format
    pub oldest: Option<String>,
    /// Upper bound hint, Slack `ts` format
    pub latest: Option<String>,
    pub limit: usize,
}

/// A page of channel history, newest message first. Messages stay as raw
/// JSON so one malformed entry cannot spoil the whole page.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<Value>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    pub response_metadata: Option<ResponseMetadata>,
}

impl From<HistoryResponse> for HistoryPage {
    fn from(response: HistoryResponse) -> Self {
        Self {
            messages: response.messages,
            has_more: response.has_more,
            next_cursor: response
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMetadata {
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepliesResponse {
    #[serde(default)]
    pub messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    pub user: SlackUser,
}

/// Subset of a `users.info` user object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
}

impl SlackUser {
    /// Best human-readable name: real name, then profile names, then handle,
    /// then the raw id.
    pub fn display_name(&self) -> String {
        let profile = self.profile.as_ref();
        [
            self.real_name.as_deref(),
            profile.and_then(|p| p.real_name.as_deref()),
            profile.and_then(|p| p.display_name.as_deref()),
            self.name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or(self.id.as_str())
        .to_string()
    }
}

/// A channel message or thread reply as Slack sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub ts: String,
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl RawMessage {
    /// Decode a single message, `None` when required fields are missing.
    pub fn decode(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    pub fn has_reaction(&self, name: &str) -> bool {
        self.reactions.iter().any(|r| r.name == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reaction {
    pub name: String,
}
