//! Summary figures computed from the displayed records.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, Timelike};
use chrono_tz::Tz;
use serde::Serialize;

use super::range::FiscalQuarter;
use crate::model::Message;

pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterCount {
    pub label: String,
    pub count: usize,
    /// Change against the quarter listed after this one
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub total: usize,
    /// Change of `total` against the range's comparison window
    pub total_change_pct: Option<f64>,
    pub unique_requesters: usize,
    /// Monday first
    pub by_weekday: Vec<usize>,
    /// Hour of day in the display timezone
    pub by_hour: Vec<usize>,
    pub top_requesters: Vec<(String, usize)>,
    /// Most recent quarter first
    pub quarters: Vec<QuarterCount>,
}

impl Insights {
    pub fn compute(records: &[Message], tz: Tz) -> Self {
        let mut by_weekday = vec![0; 7];
        let mut by_hour = vec![0; 24];
        let mut per_author: HashMap<&str, usize> = HashMap::new();

        for record in records {
            let local = record.local_time(tz);
            by_weekday[local.weekday().num_days_from_monday() as usize] += 1;
            by_hour[local.hour() as usize] += 1;
            *per_author.entry(record.author.as_str()).or_default() += 1;
        }

        let unique_requesters = records
            .iter()
            .map(|r| r.author.as_str())
            .collect::<HashSet<_>>()
            .len();

        let mut top_requesters: Vec<(String, usize)> = per_author
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        top_requesters.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_requesters.truncate(10);

        Self {
            total: records.len(),
            total_change_pct: None,
            unique_requesters,
            by_weekday,
            by_hour,
            top_requesters,
            quarters: quarter_counts(records, tz),
        }
    }
}

/// Requests per fiscal quarter, newest first, each compared with the quarter
/// listed after it.
pub fn quarter_counts(records: &[Message], tz: Tz) -> Vec<QuarterCount> {
    let mut per_quarter: BTreeMap<FiscalQuarter, usize> = BTreeMap::new();
    for record in records {
        *per_quarter
            .entry(FiscalQuarter::of(record.local_time(tz).date_naive()))
            .or_default() += 1;
    }

    let ordered: Vec<(FiscalQuarter, usize)> = per_quarter.into_iter().rev().collect();
    ordered
        .iter()
        .enumerate()
        .map(|(idx, (quarter, count))| QuarterCount {
            label: quarter.to_string(),
            count: *count,
            change_pct: ordered
                .get(idx + 1)
                .and_then(|(_, previous)| percent_change(*count, *previous)),
        })
        .collect()
}

/// Period-over-period change, `None` when there is no baseline.
pub fn percent_change(current: usize, previous: usize) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    Some((current as f64 - previous as f64) / previous as f64 * 100.0)
}

/// `45m`, `2.5h`, `1.2d`
pub fn format_response_time(minutes: f64) -> String {
    if minutes < 60.0 {
        format!("{:.0}m", minutes)
    } else if minutes < 1440.0 {
        format!("{:.1}h", minutes / 60.0)
    } else {
        format!("{:.1}d", minutes / 1440.0)
    }
}
