//! Fault capture, fingerprinting and alert-threshold evaluation.
//!
//! Captured faults are grouped by fingerprint (truncated message plus first
//! stack line) and evaluated against two alert rules over the trailing
//! five-minute window. Alerts are recorded through the same capture path at
//! [`FaultLevel::Alert`], which skips rule evaluation so an alert can never
//! re-trigger itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::TelemetryConfig;
use crate::observability::metrics;
use crate::store::persistence::KeyValueStore;
use crate::store::{now_ms, BoundedEventStore, StoreEvent, TimeWindow};
use crate::telemetry::redact::redact;

/// Fingerprints are truncated to this many characters.
pub const FINGERPRINT_LEN: usize = 100;

/// Window both alert rules evaluate over.
pub const ALERT_WINDOW: TimeWindow = TimeWindow::FIVE_MINUTES;

const AUTH_SPIKE_THRESHOLD: usize = 10;
const API_VOLUME_THRESHOLD: usize = 100;
const API_ERROR_RATIO_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultLevel {
    Warning,
    Error,
    Critical,
    /// Derived from aggregate statistics; never re-evaluates alert rules.
    Alert,
}

impl FaultLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultLevel::Warning => "warning",
            FaultLevel::Error => "error",
            FaultLevel::Critical => "critical",
            FaultLevel::Alert => "alert",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultEvent {
    pub id: String,
    pub timestamp_ms: u64,
    pub level: FaultLevel,
    pub message: String,
    pub stack: Option<String>,
    pub context: Value,
    pub fingerprint: String,
}

impl StoreEvent for FaultEvent {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

/// One tracked API call, kept for the error-rate alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiCallRecord {
    timestamp_ms: u64,
    status: u16,
}

impl StoreEvent for ApiCallRecord {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

/// Equivalent faults map to the same fingerprint: the first 100 characters of
/// the message joined with the first stack line.
pub fn fingerprint(message: &str, stack: Option<&str>) -> String {
    let first_line = stack
        .and_then(|s| s.lines().next())
        .map(str::trim)
        .unwrap_or("");
    format!("{message}{first_line}")
        .chars()
        .take(FINGERPRINT_LEN)
        .collect()
}

fn is_auth_related(message: &str) -> bool {
    let lowered = message.to_lowercase();
    ["auth", "login", "credential", "token", "unauthorized"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

#[derive(Debug, Clone, Serialize)]
pub struct FingerprintCount {
    pub fingerprint: String,
    pub count: usize,
    pub sample_message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorStats {
    pub total: usize,
    pub by_level: HashMap<String, usize>,
    pub top_fingerprints: Vec<FingerprintCount>,
    pub recent: Vec<FaultEvent>,
}

pub struct FaultMonitor {
    store: Mutex<BoundedEventStore<FaultEvent>>,
    api_calls: Mutex<BoundedEventStore<ApiCallRecord>>,
    /// rule name -> last fire timestamp; suppresses repeat alerts within the
    /// evaluation window.
    last_alerts: Mutex<HashMap<&'static str, u64>>,
}

impl FaultMonitor {
    pub fn new(config: &TelemetryConfig, sink: Option<Arc<dyn KeyValueStore>>) -> Self {
        let mut store = BoundedEventStore::new(config.capacity);
        let mut api_calls = BoundedEventStore::new(config.capacity);
        if let Some(sink) = sink {
            store = store.with_snapshot(sink.clone(), "telemetry:faults", config.snapshot_cap);
            api_calls = api_calls.with_snapshot(sink, "telemetry:api_calls", config.snapshot_cap);
            store.load_snapshot();
            api_calls.load_snapshot();
        }
        Self {
            store: Mutex::new(store),
            api_calls: Mutex::new(api_calls),
            last_alerts: Mutex::new(HashMap::new()),
        }
    }

    /// Capture a fault: redact its context, fingerprint it, store it, then
    /// evaluate the alert rules (unless this capture is itself an alert).
    pub fn capture_error(
        &self,
        message: &str,
        stack: Option<&str>,
        context: &Value,
        level: FaultLevel,
    ) -> FaultEvent {
        self.capture_error_at(message, stack, context, level, now_ms())
    }

    pub fn capture_error_at(
        &self,
        message: &str,
        stack: Option<&str>,
        context: &Value,
        level: FaultLevel,
        now_ms: u64,
    ) -> FaultEvent {
        let event = FaultEvent {
            id: Uuid::new_v4().to_string(),
            timestamp_ms: now_ms,
            level,
            message: message.to_string(),
            stack: stack.map(str::to_string),
            context: redact(context),
            fingerprint: fingerprint(message, stack),
        };
        {
            let mut store = self.store.lock().expect("fault store mutex poisoned");
            store.insert(event.clone());
        }
        tracing::debug!(level = level.as_str(), fingerprint = %event.fingerprint, "fault captured");
        metrics::record_fault(level.as_str());

        if level != FaultLevel::Alert {
            self.evaluate_alerts(now_ms);
        }
        event
    }

    /// Convenience capture for a std error.
    pub fn capture(&self, err: &(dyn std::error::Error + 'static), context: &Value, level: FaultLevel) -> FaultEvent {
        self.capture_error(&err.to_string(), None, context, level)
    }

    /// Track one API call outcome for the error-rate rule.
    pub fn record_api_call(&self, status: u16) {
        self.record_api_call_at(status, now_ms());
    }

    pub fn record_api_call_at(&self, status: u16, now_ms: u64) {
        let mut api_calls = self.api_calls.lock().expect("api call store mutex poisoned");
        api_calls.insert(ApiCallRecord {
            timestamp_ms: now_ms,
            status,
        });
    }

    fn evaluate_alerts(&self, now_ms: u64) {
        let range = ALERT_WINDOW.range_ending(now_ms);

        let auth_faults = {
            let store = self.store.lock().expect("fault store mutex poisoned");
            store
                .query(range)
                .filter(|event| event.level != FaultLevel::Alert && is_auth_related(&event.message))
                .count()
        };
        if auth_faults > AUTH_SPIKE_THRESHOLD && self.cooldown_elapsed("auth_failure_spike", now_ms)
        {
            self.raise_alert(
                "auth_failure_spike",
                json!({ "authFaults": auth_faults, "windowMs": ALERT_WINDOW.as_ms() }),
                now_ms,
            );
        }

        let (total, server_errors) = {
            let api_calls = self.api_calls.lock().expect("api call store mutex poisoned");
            api_calls.query(range).fold((0usize, 0usize), |(total, errors), call| {
                (total + 1, errors + usize::from(call.status >= 500))
            })
        };
        if total > API_VOLUME_THRESHOLD {
            let ratio = server_errors as f64 / total as f64;
            if ratio > API_ERROR_RATIO_THRESHOLD && self.cooldown_elapsed("api_error_rate_high", now_ms) {
                self.raise_alert(
                    "api_error_rate_high",
                    json!({
                        "trackedCalls": total,
                        "serverErrors": server_errors,
                        "errorRatio": ratio,
                    }),
                    now_ms,
                );
            }
        }
    }

    fn cooldown_elapsed(&self, rule: &'static str, now_ms: u64) -> bool {
        let last_alerts = self.last_alerts.lock().expect("alert mutex poisoned");
        last_alerts
            .get(rule)
            .map(|&last| now_ms.saturating_sub(last) >= ALERT_WINDOW.as_ms())
            .unwrap_or(true)
    }

    fn raise_alert(&self, rule: &'static str, details: Value, now_ms: u64) {
        self.last_alerts
            .lock()
            .expect("alert mutex poisoned")
            .insert(rule, now_ms);
        tracing::warn!(rule = rule, "alert condition met");
        metrics::record_alert(rule);
        self.capture_error_at(rule, None, &details, FaultLevel::Alert, now_ms);
    }

    pub fn get_error_stats(&self, window: TimeWindow) -> ErrorStats {
        self.get_error_stats_at(window, now_ms())
    }

    pub fn get_error_stats_at(&self, window: TimeWindow, now_ms: u64) -> ErrorStats {
        let range = window.range_ending(now_ms);
        let store = self.store.lock().expect("fault store mutex poisoned");

        let mut total = 0;
        let mut by_level: HashMap<String, usize> = HashMap::new();
        let mut by_fingerprint: HashMap<String, (usize, String)> = HashMap::new();
        let mut recent = Vec::new();
        for event in store.query(range) {
            total += 1;
            *by_level.entry(event.level.as_str().to_string()).or_insert(0) += 1;
            let slot = by_fingerprint
                .entry(event.fingerprint.clone())
                .or_insert_with(|| (0, event.message.clone()));
            slot.0 += 1;
            if recent.len() < 20 {
                recent.push(event.clone());
            }
        }

        let mut top_fingerprints: Vec<FingerprintCount> = by_fingerprint
            .into_iter()
            .map(|(fingerprint, (count, sample_message))| FingerprintCount {
                fingerprint,
                count,
                sample_message,
            })
            .collect();
        top_fingerprints.sort_by(|a, b| b.count.cmp(&a.count).then(a.fingerprint.cmp(&b.fingerprint)));
        top_fingerprints.truncate(10);

        ErrorStats {
            total,
            by_level,
            top_fingerprints,
            recent,
        }
    }

    /// Newest-first slice of captured faults for export.
    pub fn snapshot_events(&self, limit: usize) -> Vec<FaultEvent> {
        let store = self.store.lock().expect("fault store mutex poisoned");
        store.iter().take(limit).cloned().collect()
    }

    pub fn clear_errors(&self) {
        self.store
            .lock()
            .expect("fault store mutex poisoned")
            .clear();
        self.api_calls
            .lock()
            .expect("api call store mutex poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> FaultMonitor {
        FaultMonitor::new(
            &TelemetryConfig {
                capacity: 1000,
                snapshot_cap: 200,
                persist_dir: None,
            },
            None,
        )
    }

    #[test]
    fn fingerprint_matches_iff_message_and_first_frame_match() {
        let stack_a = "at login (auth.rs:42)\nat main (main.rs:10)";
        let stack_b = "at login (auth.rs:42)\nat worker (jobs.rs:7)";
        let stack_c = "at logout (auth.rs:99)\nat main (main.rs:10)";

        assert_eq!(
            fingerprint("boom", Some(stack_a)),
            fingerprint("boom", Some(stack_b)),
            "same message + same first line → same fingerprint"
        );
        assert_ne!(fingerprint("boom", Some(stack_a)), fingerprint("boom", Some(stack_c)));
        assert_ne!(fingerprint("boom", Some(stack_a)), fingerprint("bang", Some(stack_a)));
        assert!(fingerprint(&"x".repeat(500), None).chars().count() <= FINGERPRINT_LEN);
    }

    #[test]
    fn capture_redacts_context() {
        let monitor = monitor();
        let event = monitor.capture_error(
            "payment failed",
            None,
            &json!({ "creditCard": "4111", "amount": 12 }),
            FaultLevel::Error,
        );
        assert_eq!(event.context["creditCard"], "[REDACTED]");
        assert_eq!(event.context["amount"], 12);
    }

    #[test]
    fn auth_fault_spike_raises_one_alert() {
        let monitor = monitor();
        for i in 0..11 {
            monitor.capture_error_at(
                "auth failure for tenant portal",
                None,
                &json!({}),
                FaultLevel::Error,
                1_000 + i,
            );
        }
        let stats = monitor.get_error_stats_at(TimeWindow::FIVE_MINUTES, 2_000);
        assert_eq!(stats.by_level.get("alert"), Some(&1));
        // The alert itself does not count as an auth fault, and the cooldown
        // suppresses an immediate repeat.
        monitor.capture_error_at(
            "auth failure for tenant portal",
            None,
            &json!({}),
            FaultLevel::Error,
            2_500,
        );
        let stats = monitor.get_error_stats_at(TimeWindow::FIVE_MINUTES, 3_000);
        assert_eq!(stats.by_level.get("alert"), Some(&1));
    }

    #[test]
    fn high_error_ratio_raises_alert_only_past_volume_threshold() {
        let monitor = monitor();
        // 99 calls: under the volume threshold, no alert regardless of ratio.
        for i in 0..99 {
            monitor.record_api_call_at(500, i);
        }
        monitor.capture_error_at("server error", None, &json!({}), FaultLevel::Error, 100);
        let stats = monitor.get_error_stats_at(TimeWindow::FIVE_MINUTES, 200);
        assert_eq!(stats.by_level.get("alert"), None);

        // Push past 100 tracked calls with >1% server errors.
        for i in 100..110 {
            monitor.record_api_call_at(200, i);
        }
        monitor.capture_error_at("server error", None, &json!({}), FaultLevel::Error, 200);
        let stats = monitor.get_error_stats_at(TimeWindow::FIVE_MINUTES, 300);
        assert_eq!(stats.by_level.get("alert"), Some(&1));
    }

    #[test]
    fn error_stats_group_by_fingerprint() {
        let monitor = monitor();
        for _ in 0..3 {
            monitor.capture_error("db timeout", Some("at query (db.rs:1)"), &json!({}), FaultLevel::Error);
        }
        monitor.capture_error("cache miss storm", None, &json!({}), FaultLevel::Warning);

        let stats = monitor.get_error_stats(TimeWindow::DAY);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_level["error"], 3);
        assert_eq!(stats.by_level["warning"], 1);
        assert_eq!(stats.top_fingerprints[0].count, 3);
        assert_eq!(stats.top_fingerprints[0].sample_message, "db timeout");
    }

    #[test]
    fn clear_errors_empties_both_stores() {
        let monitor = monitor();
        monitor.capture_error("boom", None, &json!({}), FaultLevel::Error);
        monitor.record_api_call(200);
        monitor.clear_errors();
        let stats = monitor.get_error_stats(TimeWindow::DAY);
        assert_eq!(stats.total, 0);
    }
}
