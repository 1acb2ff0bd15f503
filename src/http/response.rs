//! Response shaping for pipeline rejections.
//!
//! # Responsibilities
//! - Map each rejection to its status code and JSON body
//! - Keep rejection bodies structured so clients can react programmatically
//!
//! # Design Decisions
//! - Rate-limit rejections carry `retryAfter` in the body and a `Retry-After`
//!   header so both browsers and API clients can back off
//! - Validation rejections return every failed field, not just the first
//! - Forbidden rejections disclose required vs actual role for auditability

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::Rejection;

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Rejection::RateLimited { retry_after_secs } => {
                let body = Json(json!({
                    "error": "Too many requests",
                    "retryAfter": retry_after_secs,
                }));
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after_secs.to_string())],
                    body,
                )
                    .into_response()
            }
            Rejection::Validation { details } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Validation failed",
                    "details": details,
                })),
            )
                .into_response(),
            Rejection::Unauthorized { reason } => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": format!("Authentication required: {reason}") })),
            )
                .into_response(),
            Rejection::Forbidden { required, actual } => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Insufficient permissions",
                    "required": required,
                    "actual": actual,
                })),
            )
                .into_response(),
            Rejection::Blocked => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Access temporarily blocked" })),
            )
                .into_response(),
            Rejection::OriginDenied => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Origin not allowed" })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_sets_retry_after_header_and_body() {
        let response = Rejection::RateLimited {
            retry_after_secs: 30,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
    }

    #[test]
    fn statuses_match_rejection_kinds() {
        assert_eq!(
            Rejection::Validation { details: vec![] }
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Rejection::Unauthorized {
                reason: "missing bearer credential".to_string()
            }
            .into_response()
            .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Rejection::Forbidden {
                required: vec!["admin".to_string()],
                actual: "tenant".to_string()
            }
            .into_response()
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Rejection::Blocked.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Rejection::OriginDenied.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
