use std::str::FromStr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::store::TimeWindow;
use crate::telemetry::events::EventStatistics;
use crate::telemetry::faults::ErrorStats;
use crate::telemetry::navigation::NavigationStats;
use crate::telemetry::WeeklyReport;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tracked_clients: usize,
}

/// Window selector shared by the telemetry read endpoints, e.g. `?window=1h`.
/// Defaults to the trailing day.
#[derive(Deserialize)]
pub struct WindowQuery {
    pub window: Option<String>,
}

fn parse_window(query: &WindowQuery) -> Result<TimeWindow, StatusCode> {
    match &query.window {
        None => Ok(TimeWindow::DAY),
        Some(raw) => TimeWindow::from_str(raw).map_err(|_| StatusCode::BAD_REQUEST),
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tracked_clients: state.rate_limiter.tracked_keys(),
    })
}

pub async fn get_errors(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ErrorStats>, StatusCode> {
    let window = parse_window(&query)?;
    Ok(Json(state.telemetry.faults.get_error_stats(window)))
}

pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<EventStatistics>, StatusCode> {
    let window = parse_window(&query)?;
    Ok(Json(state.telemetry.events.get_statistics(window)))
}

pub async fn get_navigation(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<NavigationStats>, StatusCode> {
    let window = parse_window(&query)?;
    Ok(Json(state.telemetry.navigation.get_statistics(window)))
}

pub async fn get_report(State(state): State<AppState>) -> Json<WeeklyReport> {
    Json(state.telemetry.generate_weekly_report())
}

pub async fn get_export(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.telemetry.export_snapshot())
}

pub async fn delete_telemetry(State(state): State<AppState>) -> StatusCode {
    state.telemetry.clear_all();
    tracing::info!("Telemetry cleared via admin surface");
    StatusCode::NO_CONTENT
}
