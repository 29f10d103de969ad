//! Server-rendered dashboard page.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::dashboard::insights::{format_response_time, Insights, WEEKDAYS};
use crate::dashboard::{DashboardView, TimeRange};
use crate::export::format_timestamp;
use crate::slack::format::clean_text;

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; margin: 0; background: #f8f9fa; color: #1e293b; }
header { background: linear-gradient(135deg, #1e3a5f 0%, #2d5a87 100%); color: white; padding: 20px 32px; }
header h1 { margin: 0; font-size: 1.6em; }
header p { margin: 4px 0 0; opacity: 0.85; }
main { padding: 24px 32px; }
section { margin-bottom: 28px; }
h2 { font-size: 1.15em; border-bottom: 1px solid #dee2e6; padding-bottom: 6px; }
.controls { display: flex; gap: 12px; flex-wrap: wrap; align-items: end; }
.controls label { display: flex; flex-direction: column; font-size: 0.85em; gap: 4px; }
.metrics { display: grid; grid-template-columns: repeat(auto-fit, minmax(170px, 1fr)); gap: 12px; }
.metric { background: white; border-radius: 8px; padding: 12px 16px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
.metric .value { font-size: 1.8em; font-weight: bold; color: #1e3a5f; }
.metric .name { font-size: 0.85em; color: #64748b; }
.metric .delta { font-size: 0.8em; color: #2d5a87; }
.banner { padding: 12px 16px; border-radius: 8px; margin-bottom: 16px; }
.banner.error { background: #fdecea; color: #8a1c1c; }
.banner.info { background: #e8f1fb; color: #1e3a5f; }
.columns { display: grid; grid-template-columns: repeat(auto-fit, minmax(320px, 1fr)); gap: 24px; }
.bar { display: flex; align-items: center; gap: 8px; font-size: 0.85em; margin: 2px 0; }
.bar .label { width: 120px; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; }
.bar .fill { background: #2d5a87; height: 12px; border-radius: 3px; }
table { width: 100%; border-collapse: collapse; background: white; }
th, td { text-align: left; padding: 8px 10px; border-bottom: 1px solid #e2e8f0; vertical-align: top; font-size: 0.9em; }
th { background: #f1f5f9; }
td.text { white-space: pre-wrap; }
footer { padding: 12px 32px; color: #64748b; font-size: 0.8em; }
"#;

/// Minimal HTML escaping for text and attribute values.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_page(config: &Config, view: &DashboardView, now: DateTime<Utc>, notice: Option<&str>) -> String {
    let mut page = String::new();

    let _ = write!(
        page,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh}">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
<header><h1>{title}</h1><p>{org} | messages mentioning <code>{keyword}</code></p></header>
<main>
"#,
        refresh = config.refresh_interval.as_secs(),
        title = escape(&config.title),
        style = STYLE,
        org = escape(&config.org_name),
        keyword = escape(&config.keyword),
    );

    if let Some(notice) = notice {
        let _ = write!(page, r#"<div class="banner info">{}</div>"#, escape(notice));
    }
    if let Some(error) = &view.last_error {
        let text = if error.fatal {
            format!("Configuration error: {}", error.message)
        } else {
            format!("Data unavailable, try again. ({})", error.message)
        };
        let _ = write!(page, r#"<div class="banner error">{}</div>"#, escape(&text));
    }
    if view.refreshing {
        page.push_str(r#"<div class="banner info">A refresh is in progress; showing the last loaded data.</div>"#);
    }

    render_controls(&mut page, config, view.range, now);

    match &view.snapshot {
        Some(snapshot) => {
            let insights = snapshot.insights(config.timezone);
            render_metrics(&mut page, view, &insights);
            render_breakdowns(&mut page, view, &insights);
            render_table(&mut page, config, view);
            let _ = write!(
                page,
                "</main><footer>Last updated: {} | Data: {}</footer></body></html>",
                snapshot
                    .fetched_at
                    .with_timezone(&config.timezone)
                    .format("%Y-%m-%d %H:%M:%S %Z"),
                escape(&snapshot.range.label()),
            );
        }
        None => {
            page.push_str(r#"<div class="banner info">No data loaded yet.</div></main></body></html>"#);
        }
    }

    page
}

fn render_controls(page: &mut String, config: &Config, selected: TimeRange, now: DateTime<Utc>) {
    let (custom_since, custom_until) = match selected {
        TimeRange::Custom { since, until } => (since.to_string(), until.to_string()),
        _ => (String::new(), String::new()),
    };

    page.push_str(r#"<section><form class="controls" method="get" action="/"><label>Time Range<select name="range">"#);
    let mut options = TimeRange::options(now, config.timezone);
    if !options.contains(&selected) && !matches!(selected, TimeRange::Custom { .. }) {
        options.push(selected);
    }
    for option in options {
        let _ = write!(
            page,
            r#"<option value="{}"{}>{}</option>"#,
            escape(&option.key()),
            if option == selected { " selected" } else { "" },
            escape(&option.label()),
        );
    }
    let _ = write!(
        page,
        r#"<option value="custom"{}>Custom</option></select></label>
<label>From<input type="date" name="since" value="{}"></label>
<label>To<input type="date" name="until" value="{}"></label>
<button type="submit">Apply</button></form>
<form class="controls" method="post" action="/refresh">
<input type="hidden" name="range" value="{}">
<input type="hidden" name="since" value="{}">
<input type="hidden" name="until" value="{}">
<button type="submit">Refresh Data</button>
<a href="/export.csv">Download CSV</a>
<button type="submit" formaction="/export">Save CSV on server</button>
</form></section>
"#,
        if matches!(selected, TimeRange::Custom { .. }) { " selected" } else { "" },
        custom_since,
        custom_until,
        escape(&selected.key()),
        custom_since,
        custom_until,
    );
}

fn metric(page: &mut String, name: &str, value: &str, delta: Option<&str>) {
    let _ = write!(
        page,
        r#"<div class="metric"><div class="value">{}</div><div class="name">{}</div>{}</div>"#,
        escape(value),
        escape(name),
        delta
            .map(|d| format!(r#"<div class="delta">{}</div>"#, escape(d)))
            .unwrap_or_default(),
    );
}

fn render_metrics(page: &mut String, view: &DashboardView, insights: &Insights) {
    page.push_str(r#"<section><h2>Executive Summary</h2><div class="metrics">"#);
    let trend = insights
        .total_change_pct
        .map(|pct| format!("{:+.1}% vs prior period", pct));
    metric(page, "Total Requests", &insights.total.to_string(), trend.as_deref());
    metric(page, "Unique Requesters", &insights.unique_requesters.to_string(), None);

    if let Some(stats) = view.snapshot.as_ref().and_then(|s| s.stats.as_ref()) {
        metric(page, "Response Rate", &format!("{:.1}%", stats.response_rate()), None);
        metric(page, "Resolution Rate", &format!("{:.1}%", stats.resolution_rate()), None);
        metric(
            page,
            "Avg Response Time",
            &stats
                .average_response_minutes()
                .map_or_else(|| "-".to_string(), format_response_time),
            None,
        );
        metric(
            page,
            "Median Response",
            &stats
                .median_response_minutes()
                .map_or_else(|| "-".to_string(), format_response_time),
            None,
        );
        metric(page, "Active Responders", &stats.active_responders().to_string(), None);
    }
    page.push_str("</div></section>");

    if !insights.quarters.is_empty() {
        page.push_str(r#"<section><h2>Quarterly Performance</h2><div class="metrics">"#);
        for quarter in insights.quarters.iter().take(4) {
            let delta = quarter.change_pct.map(|pct| format!("{:+.0}% vs prior quarter", pct));
            metric(page, &quarter.label, &quarter.count.to_string(), delta.as_deref());
        }
        page.push_str("</div></section>");
    }
}

fn bars<'a>(page: &mut String, title: &str, rows: impl Iterator<Item = (&'a str, usize)> + Clone) {
    let max = rows.clone().map(|(_, n)| n).max().unwrap_or(0).max(1);
    let _ = write!(page, "<div><h2>{}</h2>", escape(title));
    for (label, count) in rows {
        let _ = write!(
            page,
            r#"<div class="bar"><span class="label">{}</span><span class="fill" style="width:{}px"></span><span>{}</span></div>"#,
            escape(label),
            count * 200 / max,
            count,
        );
    }
    page.push_str("</div>");
}

fn render_breakdowns(page: &mut String, view: &DashboardView, insights: &Insights) {
    let hours: Vec<String> = (0..24).map(|h| format!("{:02}:00", h)).collect();

    page.push_str(r#"<section class="columns">"#);
    bars(
        page,
        "Requests by Day of Week",
        WEEKDAYS.iter().copied().zip(insights.by_weekday.iter().copied()),
    );
    bars(
        page,
        "Requests by Hour of Day",
        hours.iter().map(String::as_str).zip(insights.by_hour.iter().copied()),
    );
    bars(
        page,
        "Top 10 Requesters",
        insights.top_requesters.iter().map(|(name, n)| (name.as_str(), *n)),
    );
    if let Some(stats) = view.snapshot.as_ref().and_then(|s| s.stats.as_ref()) {
        if stats.top_performers.is_empty() {
            page.push_str("<div><h2>Top Performers</h2><p>No verified answers found.</p></div>");
        } else {
            bars(
                page,
                "Top Performers (answers with a check mark)",
                stats.top_performers.iter().take(10).map(|(name, n)| (name.as_str(), *n)),
            );
        }
    }
    page.push_str("</section>");
}

fn render_table(page: &mut String, config: &Config, view: &DashboardView) {
    let Some(snapshot) = &view.snapshot else {
        return;
    };

    if snapshot.records.is_empty() {
        let _ = write!(
            page,
            r#"<div class="banner info">No messages found in {}.</div>"#,
            escape(&snapshot.range.label())
        );
        return;
    }

    let _ = write!(
        page,
        "<section><h2>Messages ({} total)</h2><table><thead><tr><th>Timestamp</th><th>Author</th><th>Message</th></tr></thead><tbody>",
        snapshot.records.len()
    );
    for record in &snapshot.records {
        let _ = write!(
            page,
            r#"<tr><td>{}</td><td>{}</td><td class="text">{}</td></tr>"#,
            escape(&format_timestamp(record, config.timezone)),
            escape(&record.author),
            escape(&clean_text(&record.text, &config.group_label)),
        );
    }
    page.push_str("</tbody></table></section>");
}
