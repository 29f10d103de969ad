use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use colored::*;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::view;
use crate::dashboard::{Dashboard, Insights, RangeError, TimeRange};
use crate::export;
use crate::fetcher::ThreadStats;
use crate::model::Message;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Dashboard>,
}

/// Range control values, from the query string or the refresh form.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    range: Option<String>,
    since: Option<String>,
    until: Option<String>,
}

impl RangeQuery {
    fn to_range(&self) -> Result<Option<TimeRange>, RangeError> {
        match self.range.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(key) => TimeRange::parse(key, self.since.as_deref(), self.until.as_deref()).map(Some),
        }
    }

    fn location(range: TimeRange) -> String {
        match range {
            TimeRange::Custom { since, until } => format!("/?range=custom&since={}&until={}", since, until),
            other => format!("/?range={}", other.key()),
        }
    }
}

pub fn router(dashboard: Arc<Dashboard>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/refresh", post(refresh))
        .route("/export.csv", get(export_download))
        .route("/export", post(export_save))
        .route("/api/messages", get(api_messages))
        .route("/api/stats", get(api_stats))
        .route("/health", get(|| async { Json("OK") }))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { dashboard })
}

pub async fn serve(dashboard: Arc<Dashboard>) -> Result<()> {
    let addr = dashboard.config().bind_addr();
    let app = router(dashboard);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!(
        "{} Dashboard running at {}",
        "✓".green(),
        format!("http://{}", addr).bright_blue()
    );
    info!(%addr, "dashboard listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn index(State(state): State<AppState>, Query(query): Query<RangeQuery>) -> Response {
    let dashboard = &state.dashboard;

    let (range, notice) = match query.to_range() {
        Ok(Some(range)) => (range, None),
        Ok(None) => (dashboard.selected_range(), None),
        Err(e) => (dashboard.selected_range(), Some(e.to_string())),
    };

    if dashboard.needs_refresh(range) {
        dashboard.refresh(range).await;
    }

    let page = view::render_page(dashboard.config(), &dashboard.view(), Utc::now(), notice.as_deref());
    let status = if notice.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    (status, Html(page)).into_response()
}

async fn refresh(State(state): State<AppState>, Form(query): Form<RangeQuery>) -> Response {
    let range = match query.to_range() {
        Ok(range) => range.unwrap_or_else(|| state.dashboard.selected_range()),
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    state.dashboard.refresh(range).await;
    Redirect::to(&RangeQuery::location(range)).into_response()
}

async fn export_download(State(state): State<AppState>) -> Response {
    let config = state.dashboard.config();

    match state.dashboard.csv_bytes() {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!(
                        "attachment; filename=\"{}\"",
                        export::file_name(Utc::now(), config.timezone)
                    ),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "csv export failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Export failed: {}", e)).into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportResult {
    ok: bool,
    path: Option<String>,
    error: Option<String>,
}

async fn export_save(State(state): State<AppState>) -> (StatusCode, Json<ExportResult>) {
    match state.dashboard.export().await {
        Ok(path) => (
            StatusCode::OK,
            Json(ExportResult {
                ok: true,
                path: Some(path.display().to_string()),
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "csv export failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ExportResult {
                    ok: false,
                    path: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesResponse {
    range: String,
    label: String,
    since: Option<String>,
    until: Option<String>,
    fetched_at: Option<String>,
    error: Option<String>,
    messages: Vec<Message>,
}

async fn api_messages(State(state): State<AppState>) -> Json<MessagesResponse> {
    let view = state.dashboard.view();
    let snapshot = view.snapshot.as_ref();

    Json(MessagesResponse {
        range: view.range.key(),
        label: view.range.label(),
        since: snapshot.map(|s| s.since.to_rfc3339()),
        until: snapshot.map(|s| s.until.to_rfc3339()),
        fetched_at: snapshot.map(|s| s.fetched_at.to_rfc3339()),
        error: view.last_error.as_ref().map(|e| e.message.clone()),
        messages: snapshot.map(|s| s.records.clone()).unwrap_or_default(),
    })
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    insights: Insights,
    threads: Option<ThreadStats>,
}

async fn api_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let view = state.dashboard.view();
    let tz = state.dashboard.config().timezone;
    let insights = view
        .snapshot
        .as_ref()
        .map(|s| s.insights(tz))
        .unwrap_or_else(|| Insights::compute(&[], tz));

    Json(StatsResponse {
        insights,
        threads: view.snapshot.as_ref().and_then(|s| s.stats.clone()),
    })
}
