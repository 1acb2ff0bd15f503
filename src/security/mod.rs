//! Request defense subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → block_list.rs (cheapest rejection: is the identity blocked?)
//!     → origin.rs (Origin allow-list)
//!     → rate_limit.rs (fixed-window counter per client)
//!     → validate.rs (per-endpoint schema, full error list)
//!     → sanitize.rs (recursive string scrubbing, idempotent)
//!     → Pass to auth / handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: any check failure rejects before the handler runs
//! - All counters are explicit per-instance state, never globals; under
//!   horizontal scaling they are best-effort, not cluster-wide
//! - Stale entries are swept periodically; nothing grows without bound

pub mod block_list;
pub mod headers;
pub mod origin;
pub mod rate_limit;
pub mod sanitize;
pub mod validate;

use std::net::SocketAddr;

use axum::extract::Request;

/// Resolve the client identity a request is keyed by: the first
/// `X-Forwarded-For` hop when present, otherwise the socket address.
pub fn client_key(request: &Request, addr: SocketAddr) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}
