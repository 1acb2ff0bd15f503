//! Origin allow-list check.
//!
//! Browsers send an `Origin` header on cross-site requests; anything not on
//! the configured allow-list is rejected. An empty allow-list disables the
//! check, and requests without an `Origin` header (curl, server-to-server)
//! pass through.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::Rejection;
use crate::http::server::AppState;
use crate::observability::metrics;

pub async fn origin_check_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let allowed = &state.config.security.allowed_origins;
    if allowed.is_empty() {
        return next.run(request).await;
    }

    if let Some(origin) = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
    {
        if !allowed.iter().any(|candidate| candidate == origin) {
            tracing::warn!(origin = %origin, "rejected disallowed origin");
            metrics::record_rejection("origin");
            return Rejection::OriginDenied.into_response();
        }
    }

    next.run(request).await
}
