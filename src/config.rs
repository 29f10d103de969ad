//! Startup configuration
//!
//! Everything is read once from the environment (a `.env` file is honoured)
//! and is immutable afterwards. Missing Slack credentials are fatal.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;
use url::Url;

use crate::error::RetryPolicy;

/// Matched against raw message text. Slack delivers a user-group mention as
/// `<!subteam^ID>`, so to catch those set `SLACK_KEYWORD` to `<!subteam^ID`.
pub const DEFAULT_KEYWORD: &str = "ai_acq";
pub const DEFAULT_GROUP_LABEL: &str = "@AI_Acquisition";
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";
pub const DEFAULT_TITLE: &str = "AI Acquisition Dashboard";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set (add it to the environment or .env)")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Config {
    /// Slack bot token (`xoxb-...`)
    pub slack_bot_token: String,

    /// Channel to monitor
    pub channel_id: String,

    /// Case-insensitive trigger phrase
    pub keyword: String,

    /// Replacement text for user-group mentions when rendering
    pub group_label: String,

    pub api_base: Url,

    /// Upper bound on history messages examined per fetch
    pub history_limit: usize,

    pub org_name: String,
    pub timezone: Tz,
    pub title: String,

    pub host: String,
    pub port: u16,
    pub refresh_interval: Duration,
    pub export_dir: PathBuf,

    /// Walk thread replies for response and resolution metrics
    pub thread_stats: bool,

    pub retry: RetryPolicy,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("slack_bot_token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("keyword", &self.keyword)
            .field("api_base", &self.api_base.as_str())
            .field("history_limit", &self.history_limit)
            .field("org_name", &self.org_name)
            .field("timezone", &self.timezone)
            .field("title", &self.title)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("refresh_interval", &self.refresh_interval)
            .field("export_dir", &self.export_dir)
            .field("thread_stats", &self.thread_stats)
            .field("retry", &self.retry)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let slack_bot_token = get("SLACK_BOT_TOKEN").ok_or(ConfigError::Missing("SLACK_BOT_TOKEN"))?;
        let channel_id = get("SLACK_CHANNEL_ID").ok_or(ConfigError::Missing("SLACK_CHANNEL_ID"))?;

        let api_base = get("SLACK_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = Url::parse(&api_base).map_err(|e| ConfigError::Invalid {
            var: "SLACK_API_BASE",
            value: api_base.clone(),
            reason: e.to_string(),
        })?;

        let timezone = get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = Tz::from_str(&timezone).map_err(|e| ConfigError::Invalid {
            var: "TIMEZONE",
            value: timezone.clone(),
            reason: e.to_string(),
        })?;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&get, "RETRY_MAX_ATTEMPTS", defaults.max_attempts)?.max(1),
            initial_delay: Duration::from_millis(parse_or(
                &get,
                "RETRY_INITIAL_DELAY_MS",
                defaults.initial_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(parse_or(
                &get,
                "RETRY_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )?),
            ..defaults
        };

        Ok(Self {
            slack_bot_token,
            channel_id,
            keyword: get("SLACK_KEYWORD").unwrap_or_else(|| DEFAULT_KEYWORD.to_string()),
            group_label: get("SLACK_GROUP_LABEL").unwrap_or_else(|| DEFAULT_GROUP_LABEL.to_string()),
            api_base,
            history_limit: parse_or(&get, "SLACK_HISTORY_LIMIT", 1000usize)?.max(1),
            org_name: get("ORG_NAME").unwrap_or_else(|| "Acquisition".to_string()),
            timezone,
            title: get("DASHBOARD_TITLE").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            host: get("DASHBOARD_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&get, "DASHBOARD_PORT", 8501u16)?,
            refresh_interval: Duration::from_secs(parse_or(&get, "REFRESH_INTERVAL_SECS", 300u64)?.max(1)),
            export_dir: get("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("exports")),
            thread_stats: parse_or(&get, "THREAD_STATS", true)?,
            retry,
        })
    }

    /// Socket address the dashboard binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
