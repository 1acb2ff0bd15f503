//! Failed-auth tracking and the temporary identity block list.
//!
//! Repeated credential failures inside a rolling window escalate into a
//! block. The block check runs first in the pipeline because it is the
//! cheapest possible rejection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::FailedAuthConfig;
use crate::error::Rejection;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::client_key;
use crate::store::now_ms;

#[derive(Debug, Clone, Copy)]
struct FailedAuthEntry {
    count: u32,
    window_start_ms: u64,
}

/// Windowed failure counter plus the derived block set.
pub struct FailedAuthTracker {
    failures: Mutex<HashMap<String, FailedAuthEntry>>,
    /// id -> blocked-at timestamp. Blocks are lifted only by an explicit
    /// clear or by the TTL sweep.
    blocked: Mutex<HashMap<String, u64>>,
    window_ms: u64,
    max_failures: u32,
    block_ttl_ms: u64,
}

impl FailedAuthTracker {
    pub fn new(config: &FailedAuthConfig) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            blocked: Mutex::new(HashMap::new()),
            window_ms: config.window_ms,
            max_failures: config.max_failures,
            block_ttl_ms: config.block_ttl_secs * 1000,
        }
    }

    /// Record one failure. Returns true when this failure pushed the identity
    /// over the threshold and onto the block list.
    pub fn track_failure(&self, id: &str) -> bool {
        self.track_failure_at(id, now_ms())
    }

    pub fn track_failure_at(&self, id: &str, now_ms: u64) -> bool {
        let mut failures = self.failures.lock().expect("failed-auth mutex poisoned");
        let entry = failures.entry(id.to_string()).or_insert(FailedAuthEntry {
            count: 0,
            window_start_ms: now_ms,
        });
        if now_ms >= entry.window_start_ms + self.window_ms {
            entry.count = 0;
            entry.window_start_ms = now_ms;
        }
        entry.count += 1;

        if entry.count > self.max_failures {
            drop(failures);
            self.blocked
                .lock()
                .expect("block list mutex poisoned")
                .insert(id.to_string(), now_ms);
            tracing::warn!(id = %id, "identity blocked after repeated auth failures");
            metrics::record_identity_blocked();
            true
        } else {
            false
        }
    }

    pub fn is_blocked(&self, id: &str) -> bool {
        self.is_blocked_at(id, now_ms())
    }

    pub fn is_blocked_at(&self, id: &str, now_ms: u64) -> bool {
        let mut blocked = self.blocked.lock().expect("block list mutex poisoned");
        match blocked.get(id) {
            Some(&blocked_at) if now_ms < blocked_at + self.block_ttl_ms => true,
            Some(_) => {
                blocked.remove(id);
                false
            }
            None => false,
        }
    }

    /// Reset the failure counter after a successful authentication.
    pub fn clear_failures(&self, id: &str) {
        self.failures
            .lock()
            .expect("failed-auth mutex poisoned")
            .remove(id);
    }

    /// Explicitly lift a block.
    pub fn clear_block(&self, id: &str) {
        self.blocked
            .lock()
            .expect("block list mutex poisoned")
            .remove(id);
    }

    /// Evict lapsed failure counters and expired blocks.
    pub fn sweep(&self) {
        self.sweep_at(now_ms());
    }

    pub fn sweep_at(&self, now_ms: u64) {
        let window_ms = self.window_ms;
        self.failures
            .lock()
            .expect("failed-auth mutex poisoned")
            .retain(|_, entry| now_ms < entry.window_start_ms + window_ms);
        let ttl_ms = self.block_ttl_ms;
        self.blocked
            .lock()
            .expect("block list mutex poisoned")
            .retain(|_, &mut blocked_at| now_ms < blocked_at + ttl_ms);
    }
}

/// First middleware in the chain: reject blocked identities outright.
pub async fn block_check_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request, addr);
    if state.auth_tracker.is_blocked(&key) {
        tracing::warn!(client = %key, "rejected blocked identity");
        metrics::record_rejection("blocked");
        return Rejection::Blocked.into_response();
    }
    next.run(request).await
}
