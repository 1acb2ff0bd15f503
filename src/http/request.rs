//! Request identification and response hardening.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Echo the ID on the response for correlation
//! - Stamp baseline security headers on every response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A client-supplied `x-request-id` is kept, not replaced

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::security::headers::apply_security_headers;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Outermost middleware: correlation ID in, correlation ID and security
/// headers out.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = match request.headers().get(X_REQUEST_ID) {
        Some(existing) => existing.clone(),
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            request
                .headers_mut()
                .insert(X_REQUEST_ID, generated.clone());
            generated
        }
    };

    let mut response = next.run(request).await;
    response.headers_mut().insert(X_REQUEST_ID, id);
    apply_security_headers(response.headers_mut());
    response
}
