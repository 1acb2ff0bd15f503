//! Fixed-window rate limiting middleware.
//!
//! One counter per client key, reset at fixed window boundaries. Bursts of up
//! to ~2x the limit are possible across a boundary; this is an accepted
//! property of the algorithm, not a defect.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::RateLimitConfig;
use crate::error::Rejection;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::client_key;
use crate::store::now_ms;

/// Per-key window state, created lazily on first request.
#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_start_ms: u64,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Rejected { retry_after_secs: u64 },
}

/// Fixed-window request counter keyed by client identity.
///
/// Constructed per pipeline instance and shared by `Arc`; limits are
/// per-instance, not cluster-wide.
pub struct RateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
    window_ms: u64,
    max: u32,
    refund_success: bool,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            window_ms: config.window_ms,
            max: config.max_requests,
            refund_success: config.refund_success,
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, now_ms())
    }

    pub fn check_at(&self, key: &str, now_ms: u64) -> RateDecision {
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");
        let entry = entries.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start_ms: now_ms,
        });

        if now_ms >= entry.window_start_ms + self.window_ms {
            entry.count = 0;
            entry.window_start_ms = now_ms;
        }
        entry.count += 1;

        if entry.count <= self.max {
            RateDecision::Allowed
        } else {
            let window_end = entry.window_start_ms + self.window_ms;
            let retry_after_secs = window_end.saturating_sub(now_ms).div_ceil(1000).max(1);
            RateDecision::Rejected { retry_after_secs }
        }
    }

    /// Post-hoc refund for a successful (2xx) response, when enabled.
    pub fn record_success(&self, key: &str) {
        if !self.refund_success {
            return;
        }
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");
        if let Some(entry) = entries.get_mut(key) {
            entry.count = entry.count.saturating_sub(1);
        }
    }

    /// Evict entries whose window lapsed more than one full window ago.
    pub fn sweep(&self) {
        self.sweep_at(now_ms());
    }

    pub fn sweep_at(&self, now_ms: u64) {
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");
        let window_ms = self.window_ms;
        entries.retain(|_, entry| now_ms < entry.window_start_ms + 2 * window_ms);
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries
            .lock()
            .expect("rate limiter mutex poisoned")
            .len()
    }
}

/// Middleware enforcing the fixed-window limit per client key.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.rate_limit.enabled {
        return next.run(request).await;
    }

    let key = client_key(&request, addr);
    match state.rate_limiter.check(&key) {
        RateDecision::Allowed => {
            let response = next.run(request).await;
            if response.status().is_success() {
                state.rate_limiter.record_success(&key);
            }
            response
        }
        RateDecision::Rejected { retry_after_secs } => {
            tracing::warn!(client = %key, retry_after = retry_after_secs, "rate limit exceeded");
            metrics::record_rejection("rate_limit");
            Rejection::RateLimited { retry_after_secs }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_ms: u64, max: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            window_ms,
            max_requests: max,
            refund_success: false,
        })
    }

    #[test]
    fn rejects_after_max_within_window() {
        let limiter = limiter(60_000, 3);
        // t = 0s, 10s, 20s: allowed; t = 30s: rejected with retryAfter ~ 30.
        assert_eq!(limiter.check_at("10.0.0.1", 0), RateDecision::Allowed);
        assert_eq!(limiter.check_at("10.0.0.1", 10_000), RateDecision::Allowed);
        assert_eq!(limiter.check_at("10.0.0.1", 20_000), RateDecision::Allowed);
        assert_eq!(
            limiter.check_at("10.0.0.1", 30_000),
            RateDecision::Rejected {
                retry_after_secs: 30
            }
        );
    }

    #[test]
    fn allows_again_once_window_lapses() {
        let limiter = limiter(60_000, 2);
        assert_eq!(limiter.check_at("k", 0), RateDecision::Allowed);
        assert_eq!(limiter.check_at("k", 1), RateDecision::Allowed);
        assert!(matches!(
            limiter.check_at("k", 2),
            RateDecision::Rejected { .. }
        ));
        // Window resets at exactly windowStart + windowMs.
        assert_eq!(limiter.check_at("k", 60_000), RateDecision::Allowed);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(60_000, 1);
        assert_eq!(limiter.check_at("a", 0), RateDecision::Allowed);
        assert!(matches!(
            limiter.check_at("a", 1),
            RateDecision::Rejected { .. }
        ));
        assert_eq!(limiter.check_at("b", 1), RateDecision::Allowed);
    }

    #[test]
    fn refund_releases_a_slot() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: true,
            window_ms: 60_000,
            max_requests: 1,
            refund_success: true,
        });
        assert_eq!(limiter.check_at("k", 0), RateDecision::Allowed);
        limiter.record_success("k");
        assert_eq!(limiter.check_at("k", 1), RateDecision::Allowed);
    }

    #[test]
    fn sweep_evicts_stale_entries() {
        let limiter = limiter(60_000, 3);
        limiter.check_at("old", 0);
        limiter.check_at("fresh", 110_000);
        assert_eq!(limiter.tracked_keys(), 2);
        limiter.sweep_at(130_000);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
