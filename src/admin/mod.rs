//! Admin surface: status, telemetry reads, report, export and reset.
//!
//! Sits outside the defense chain with its own Bearer API-key gate.

pub mod auth;
pub mod handlers;

use axum::routing::{delete, get};
use axum::{middleware, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/telemetry/errors", get(get_errors))
        .route("/admin/telemetry/events", get(get_events))
        .route("/admin/telemetry/navigation", get(get_navigation))
        .route("/admin/telemetry/report", get(get_report))
        .route("/admin/telemetry/export", get(get_export))
        .route("/admin/telemetry", delete(delete_telemetry))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
