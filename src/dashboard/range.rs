//! Time-range selection and the February-based fiscal calendar.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("unknown time range {0:?}")]
    Unknown(String),

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    BadDate(String),

    #[error("custom range needs both a start and an end date")]
    IncompleteCustom,

    #[error("custom range starts after it ends")]
    Inverted,
}

/// Fiscal quarter; the fiscal year starts in February and is named after the
/// calendar year in which it ends.
///
/// - Q1: Feb, Mar, Apr
/// - Q2: May, Jun, Jul
/// - Q3: Aug, Sep, Oct
/// - Q4: Nov, Dec, Jan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiscalQuarter {
    pub year: i32,
    pub quarter: u8,
}

impl FiscalQuarter {
    pub fn new(year: i32, quarter: u8) -> Self {
        debug_assert!((1..=4).contains(&quarter));
        Self { year, quarter }
    }

    pub fn of(date: impl Datelike) -> Self {
        let (month, year) = (date.month(), date.year());
        match month {
            2..=4 => Self::new(year + 1, 1),
            5..=7 => Self::new(year + 1, 2),
            8..=10 => Self::new(year + 1, 3),
            11 | 12 => Self::new(year + 1, 4),
            _ => Self::new(year, 4),
        }
    }

    pub fn previous(self) -> Self {
        if self.quarter == 1 {
            Self::new(self.year - 1, 4)
        } else {
            Self::new(self.year, self.quarter - 1)
        }
    }

    pub fn next(self) -> Self {
        if self.quarter == 4 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.quarter + 1)
        }
    }

    /// `self` followed by the `n - 1` quarters before it
    pub fn trailing(self, n: usize) -> Vec<Self> {
        std::iter::successors(Some(self), |q| Some(q.previous()))
            .take(n)
            .collect()
    }

    /// First calendar day of the quarter
    pub fn start(self) -> NaiveDate {
        let month = 2 + (u32::from(self.quarter) - 1) * 3;
        NaiveDate::from_ymd_opt(self.year - 1, month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Parse `FY25 Q3` / `FY25Q3`
    pub fn parse(value: &str) -> Option<Self> {
        let compact: String = value.split_whitespace().collect();
        let rest = compact.strip_prefix("FY").or_else(|| compact.strip_prefix("fy"))?;
        let (year, quarter) = rest.split_once(['Q', 'q'])?;
        let year: i32 = year.parse().ok()?;
        let quarter: u8 = quarter.parse().ok()?;
        if !(1..=4).contains(&quarter) || !(0..100).contains(&year) {
            return None;
        }
        Some(Self::new(2000 + year, quarter))
    }

    pub fn key(&self) -> String {
        format!("FY{:02}Q{}", self.year.rem_euclid(100), self.quarter)
    }
}

impl fmt::Display for FiscalQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FY{:02} Q{}", self.year.rem_euclid(100), self.quarter)
    }
}

/// The lookback window picked in the dashboard's range control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    LastDay,
    LastWeek,
    Last30Days,
    /// Current fiscal quarter and the ones before it
    TrailingQuarters(u8),
    Quarter(FiscalQuarter),
    AllTime,
    /// Inclusive calendar days in the display timezone
    Custom { since: NaiveDate, until: NaiveDate },
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::TrailingQuarters(4)
    }
}

impl TimeRange {
    /// Parse the range control's form values.
    pub fn parse(key: &str, since: Option<&str>, until: Option<&str>) -> Result<Self, RangeError> {
        let key = key.trim();
        match key {
            "day" => Ok(TimeRange::LastDay),
            "week" => Ok(TimeRange::LastWeek),
            "30d" => Ok(TimeRange::Last30Days),
            "all" => Ok(TimeRange::AllTime),
            "custom" => {
                let (Some(since), Some(until)) = (non_blank(since), non_blank(until)) else {
                    return Err(RangeError::IncompleteCustom);
                };
                let since = parse_date(since)?;
                let until = parse_date(until)?;
                if since > until {
                    return Err(RangeError::Inverted);
                }
                Ok(TimeRange::Custom { since, until })
            }
            _ => {
                if let Some(n) = key.strip_prefix("trailing") {
                    return match n.parse::<u8>() {
                        Ok(n @ 1..=12) => Ok(TimeRange::TrailingQuarters(n)),
                        _ => Err(RangeError::Unknown(key.to_string())),
                    };
                }
                FiscalQuarter::parse(key)
                    .map(TimeRange::Quarter)
                    .ok_or_else(|| RangeError::Unknown(key.to_string()))
            }
        }
    }

    /// Form value identifying this range
    pub fn key(&self) -> String {
        match self {
            TimeRange::LastDay => "day".into(),
            TimeRange::LastWeek => "week".into(),
            TimeRange::Last30Days => "30d".into(),
            TimeRange::TrailingQuarters(n) => format!("trailing{}", n),
            TimeRange::Quarter(q) => q.key(),
            TimeRange::AllTime => "all".into(),
            TimeRange::Custom { .. } => "custom".into(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            TimeRange::LastDay => "Last 24 Hours".into(),
            TimeRange::LastWeek => "Last 7 Days".into(),
            TimeRange::Last30Days => "Last 30 Days".into(),
            TimeRange::TrailingQuarters(n) => format!("Trailing {} Quarters", n),
            TimeRange::Quarter(q) => q.to_string(),
            TimeRange::AllTime => "All Time".into(),
            TimeRange::Custom { since, until } => format!("{} to {}", since, until),
        }
    }

    /// Concrete `[since, until]` window for this range at `now`.
    pub fn bounds(&self, now: DateTime<Utc>, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        match *self {
            TimeRange::LastDay => (now - Duration::days(1), now),
            TimeRange::LastWeek => (now - Duration::days(7), now),
            TimeRange::Last30Days => (now - Duration::days(30), now),
            TimeRange::TrailingQuarters(n) => {
                let current = FiscalQuarter::of(now.with_timezone(&tz).date_naive());
                let oldest = current
                    .trailing(usize::from(n.max(1)))
                    .last()
                    .copied()
                    .unwrap_or(current);
                (local_midnight(oldest.start(), tz), now)
            }
            TimeRange::Quarter(q) => {
                let since = local_midnight(q.start(), tz);
                let until = local_midnight(q.next().start(), tz) - Duration::microseconds(1);
                (since, until)
            }
            TimeRange::AllTime => (DateTime::<Utc>::UNIX_EPOCH, now),
            TimeRange::Custom { since, until } => {
                let end = until.succ_opt().unwrap_or(until);
                (
                    local_midnight(since, tz),
                    local_midnight(end, tz) - Duration::microseconds(1),
                )
            }
        }
    }

    /// Window that the range's total is compared against: the `n` quarters
    /// before a trailing window, or the same quarter one fiscal year back.
    /// Other ranges have no comparison.
    pub fn comparison_bounds(&self, now: DateTime<Utc>, tz: Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match *self {
            TimeRange::TrailingQuarters(n) => {
                let n = usize::from(n.max(1));
                let current = FiscalQuarter::of(now.with_timezone(&tz).date_naive());
                let quarters = current.trailing(2 * n);
                let oldest = quarters.last().copied()?;
                let window_start = quarters.get(n - 1).copied()?;
                Some((
                    local_midnight(oldest.start(), tz),
                    local_midnight(window_start.start(), tz) - Duration::microseconds(1),
                ))
            }
            TimeRange::Quarter(q) => {
                Some(TimeRange::Quarter(FiscalQuarter::new(q.year - 1, q.quarter)).bounds(now, tz))
            }
            _ => None,
        }
    }

    /// Choices offered by the range control: the presets, then the last
    /// eight fiscal quarters.
    pub fn options(now: DateTime<Utc>, tz: Tz) -> Vec<TimeRange> {
        let current = FiscalQuarter::of(now.with_timezone(&tz).date_naive());
        let mut options = vec![
            TimeRange::TrailingQuarters(4),
            TimeRange::AllTime,
            TimeRange::LastDay,
            TimeRange::LastWeek,
            TimeRange::Last30Days,
        ];
        options.extend(current.trailing(8).into_iter().map(TimeRange::Quarter));
        options
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(value: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| RangeError::BadDate(value.to_string()))
}

/// Start of `date` in `tz`, skipping forward over a DST gap.
fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    (0..3)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::default())))
}
