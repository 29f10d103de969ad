//! Dashboard Presenter state
//!
//! Holds the last successful fetch for the selected range and refreshes it
//! on demand or on a timer. Fetches never overlap: a refresh requested while
//! another one is running is ignored.

pub mod insights;
pub mod range;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::export::{self, ExportError};
use crate::fetcher::{MessageFetcher, ThreadStats};
use crate::model::Message;
use crate::slack::SlackApi;

pub use insights::Insights;
pub use range::{FiscalQuarter, RangeError, TimeRange};

/// Records from one successful fetch.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub range: TimeRange,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub records: Vec<Message>,
    /// Every matching message the channel scan reached, regardless of range
    pub history: Vec<Message>,
    /// Matches in the range's comparison window, when it has one
    pub previous_total: Option<usize>,
    pub stats: Option<ThreadStats>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Figures for the displayed records. Quarterly counts cover the whole
    /// history so a narrow range still shows the quarter-over-quarter trend.
    pub fn insights(&self, tz: Tz) -> Insights {
        let mut figures = Insights::compute(&self.records, tz);
        figures.quarters = insights::quarter_counts(&self.history, tz);
        figures.total_change_pct = self
            .previous_total
            .filter(|_| !self.records.is_empty())
            .and_then(|previous| insights::percent_change(self.records.len(), previous));
        figures
    }
}

#[derive(Debug, Clone)]
pub struct RefreshError {
    pub message: String,
    /// The token or channel is wrong; retrying will not help
    pub fatal: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { records: usize },
    /// Another fetch was already running
    InFlight,
    Failed { message: String, fatal: bool },
}

/// What the page renders: the selected range, the last good snapshot and
/// the error of the last failed refresh, if any.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub range: TimeRange,
    pub snapshot: Option<Snapshot>,
    pub last_error: Option<RefreshError>,
    pub refreshing: bool,
}

#[derive(Debug, Default)]
struct State {
    range: TimeRange,
    snapshot: Option<Snapshot>,
    last_error: Option<RefreshError>,
}

pub struct Dashboard {
    config: Arc<Config>,
    fetcher: MessageFetcher,
    state: RwLock<State>,
    in_flight: Mutex<()>,
    refreshing: AtomicBool,
}

impl Dashboard {
    pub fn new(config: Arc<Config>, api: Arc<dyn SlackApi>) -> Self {
        let fetcher = MessageFetcher::new(api)
            .with_retry_policy(config.retry.clone())
            .with_scan_limit(config.history_limit);

        Self {
            config,
            fetcher,
            state: RwLock::new(State::default()),
            in_flight: Mutex::new(()),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn selected_range(&self) -> TimeRange {
        self.state.read().range
    }

    /// True when the current snapshot was not fetched for `range`.
    pub fn needs_refresh(&self, range: TimeRange) -> bool {
        self.state
            .read()
            .snapshot
            .as_ref()
            .map_or(true, |snapshot| snapshot.range != range)
    }

    pub fn view(&self) -> DashboardView {
        let refreshing = self.refreshing.load(Ordering::Acquire);
        let state = self.state.read();
        DashboardView {
            range: state.range,
            snapshot: state.snapshot.clone(),
            last_error: state.last_error.clone(),
            refreshing,
        }
    }

    /// Fetch `range` and replace the snapshot. On failure the previous
    /// snapshot is kept and the error is recorded for display.
    pub async fn refresh(&self, range: TimeRange) -> RefreshOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!(range = %range.key(), "refresh already in flight, ignoring");
            return RefreshOutcome::InFlight;
        };

        self.state.write().range = range;
        let _refreshing = RefreshingFlag::raise(&self.refreshing);
        self.fetch_into_snapshot(range).await
    }

    async fn fetch_into_snapshot(&self, range: TimeRange) -> RefreshOutcome {
        let now = Utc::now();
        let (since, until) = range.bounds(now, self.config.timezone);
        let channel = self.config.channel_id.as_str();

        let result = self
            .fetcher
            .fetch_messages(channel, since, until, &self.config.keyword)
            .await;

        match result {
            Ok(records) => {
                let history = if range == TimeRange::AllTime {
                    records.clone()
                } else {
                    self.load_history(now, &records).await
                };
                let previous_total = range
                    .comparison_bounds(now, self.config.timezone)
                    .map(|(from, to)| {
                        history
                            .iter()
                            .filter(|m| m.timestamp >= from && m.timestamp <= to)
                            .count()
                    });

                let stats = if self.config.thread_stats && !records.is_empty() {
                    Some(self.fetcher.thread_stats(channel, &records).await)
                } else {
                    None
                };

                let count = records.len();
                let mut state = self.state.write();
                state.snapshot = Some(Snapshot {
                    range,
                    since,
                    until,
                    records,
                    history,
                    previous_total,
                    stats,
                    fetched_at: Utc::now(),
                });
                state.last_error = None;

                info!(range = %range.key(), records = count, "dashboard refreshed");
                RefreshOutcome::Updated { records: count }
            }
            Err(e) => {
                let fatal = e.is_fatal();
                let message = e.to_string();
                warn!(range = %range.key(), fatal, error = %message, "refresh failed, keeping previous data");

                self.state.write().last_error = Some(RefreshError {
                    message: message.clone(),
                    fatal,
                    at: Utc::now(),
                });
                RefreshOutcome::Failed { message, fatal }
            }
        }
    }

    /// All matching messages up to `now`, bounded by the scan limit. Falls
    /// back to the range's own records when the scan fails.
    async fn load_history(&self, now: DateTime<Utc>, records: &[Message]) -> Vec<Message> {
        let result = self
            .fetcher
            .fetch_messages(&self.config.channel_id, DateTime::<Utc>::UNIX_EPOCH, now, &self.config.keyword)
            .await;

        match result {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "history scan failed, quarterly figures limited to the selected range");
                records.to_vec()
            }
        }
    }

    pub async fn refresh_current(&self) -> RefreshOutcome {
        let range = self.selected_range();
        self.refresh(range).await
    }

    /// Records currently on display, newest first.
    pub fn records(&self) -> Vec<Message> {
        self.state
            .read()
            .snapshot
            .as_ref()
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    pub fn csv_bytes(&self) -> Result<Vec<u8>, ExportError> {
        export::to_csv_bytes(&self.records(), self.config.timezone)
    }

    /// Save the displayed records under the configured export directory.
    pub async fn export(&self) -> Result<PathBuf, ExportError> {
        let records = self.records();
        export::export_to_dir(&self.config.export_dir, &records, self.config.timezone, Utc::now()).await
    }
}

/// Raised while a fetch runs; lowered on drop so a cancelled refresh does
/// not leave it set.
struct RefreshingFlag<'a>(&'a AtomicBool);

impl<'a> RefreshingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Re-fetch the selected range every `config.refresh_interval`.
pub fn spawn_auto_refresh(dashboard: Arc<Dashboard>) -> JoinHandle<()> {
    let period = dashboard.config.refresh_interval;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately; startup already fetched.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match dashboard.refresh_current().await {
                RefreshOutcome::Updated { records } => debug!(records, "auto refresh"),
                RefreshOutcome::InFlight => debug!("auto refresh skipped, fetch in flight"),
                RefreshOutcome::Failed { .. } => {}
            }
        }
    })
}
