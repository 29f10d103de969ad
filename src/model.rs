use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// A keyword-matching channel message, normalized for display and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Slack message id (`"1700000000.000100"`), also the thread key
    pub ts: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    /// Resolved display name, or `user_id` when the lookup failed
    pub author: String,
    pub text: String,
    pub matched_keyword: bool,
}

impl Message {
    pub fn local_time(&self, tz: Tz) -> DateTime<Tz> {
        self.timestamp.with_timezone(&tz)
    }
}

/// Parse a Slack `ts` (`"<seconds>.<micros>"`) into a UTC timestamp.
pub fn parse_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = ts.trim().split_once('.').unwrap_or((ts.trim(), ""));
    let secs: i64 = secs.parse().ok()?;

    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let micros: u32 = if frac.is_empty() {
        0
    } else {
        let digits: String = frac.chars().chain(std::iter::repeat('0')).take(6).collect();
        digits.parse().ok()?
    };

    Utc.timestamp_opt(secs, micros * 1_000).single()
}

/// Format a timestamp the way Slack expects `oldest`/`latest` bounds.
pub fn to_slack_ts(timestamp: DateTime<Utc>) -> String {
    format!("{}.{:06}", timestamp.timestamp(), timestamp.timestamp_subsec_micros())
}
