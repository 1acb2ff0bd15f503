//! Critical business-event logging.
//!
//! Typed events for the actions an auditor cares about: authentication,
//! payments, RBAC denials, CRUD on core entities. Metadata is redacted before
//! storage and failures are mirrored into the fault monitor.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::gate::Principal;
use crate::auth::rbac::Role;
use crate::config::TelemetryConfig;
use crate::observability::metrics;
use crate::store::persistence::KeyValueStore;
use crate::store::{now_ms, BoundedEventStore, StoreEvent, TimeWindow};
use crate::telemetry::faults::{FaultLevel, FaultMonitor};
use crate::telemetry::redact::redact;
use crate::auth::session::SessionStore;

/// Closed set of critical event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalEventKind {
    AuthLoginSuccess,
    AuthLoginFailure,
    AuthLogout,
    RbacDenied,
    PaymentInitiated,
    PaymentCompleted,
    PaymentFailed,
    PropertyCreated,
    PropertyUpdated,
    PropertyDeleted,
    MaintenanceRequested,
    MaintenanceResolved,
    UserCreated,
    UserUpdated,
    UserDeleted,
    DataExport,
    SettingsChanged,
    ApiKeyCreated,
    ApiKeyRevoked,
}

impl CriticalEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriticalEventKind::AuthLoginSuccess => "auth_login_success",
            CriticalEventKind::AuthLoginFailure => "auth_login_failure",
            CriticalEventKind::AuthLogout => "auth_logout",
            CriticalEventKind::RbacDenied => "rbac_denied",
            CriticalEventKind::PaymentInitiated => "payment_initiated",
            CriticalEventKind::PaymentCompleted => "payment_completed",
            CriticalEventKind::PaymentFailed => "payment_failed",
            CriticalEventKind::PropertyCreated => "property_created",
            CriticalEventKind::PropertyUpdated => "property_updated",
            CriticalEventKind::PropertyDeleted => "property_deleted",
            CriticalEventKind::MaintenanceRequested => "maintenance_requested",
            CriticalEventKind::MaintenanceResolved => "maintenance_resolved",
            CriticalEventKind::UserCreated => "user_created",
            CriticalEventKind::UserUpdated => "user_updated",
            CriticalEventKind::UserDeleted => "user_deleted",
            CriticalEventKind::DataExport => "data_export",
            CriticalEventKind::SettingsChanged => "settings_changed",
            CriticalEventKind::ApiKeyCreated => "api_key_created",
            CriticalEventKind::ApiKeyRevoked => "api_key_revoked",
        }
    }

    fn is_auth_login(&self) -> bool {
        matches!(
            self,
            CriticalEventKind::AuthLoginSuccess | CriticalEventKind::AuthLoginFailure
        )
    }
}

impl fmt::Display for CriticalEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalEvent {
    pub id: String,
    pub timestamp_ms: u64,
    pub kind: CriticalEventKind,
    pub user_id: Option<String>,
    pub user_role: Option<Role>,
    pub metadata: Value,
    pub success: bool,
    pub error: Option<String>,
}

impl StoreEvent for CriticalEvent {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthStats {
    pub logins: usize,
    pub failures: usize,
    /// Failed logins as a percentage of all login attempts.
    pub failure_rate_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventStatistics {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub by_kind: HashMap<String, usize>,
    pub auth: AuthStats,
    pub rbac_denials: usize,
}

pub struct CriticalEventLogger {
    store: Mutex<BoundedEventStore<CriticalEvent>>,
    sessions: Arc<SessionStore>,
    faults: Arc<FaultMonitor>,
}

impl CriticalEventLogger {
    pub fn new(
        config: &TelemetryConfig,
        sink: Option<Arc<dyn KeyValueStore>>,
        sessions: Arc<SessionStore>,
        faults: Arc<FaultMonitor>,
    ) -> Self {
        let mut store = BoundedEventStore::new(config.capacity);
        if let Some(sink) = sink {
            store = store.with_snapshot(sink, "telemetry:critical_events", config.snapshot_cap);
            store.load_snapshot();
        }
        Self {
            store: Mutex::new(store),
            sessions,
            faults,
        }
    }

    /// Log one critical event. The acting user comes from `principal` when
    /// supplied, otherwise from the persisted session.
    pub fn log(
        &self,
        kind: CriticalEventKind,
        principal: Option<&Principal>,
        metadata: Value,
        success: bool,
        error: Option<String>,
    ) -> CriticalEvent {
        self.log_at(kind, principal, metadata, success, error, now_ms())
    }

    pub fn log_at(
        &self,
        kind: CriticalEventKind,
        principal: Option<&Principal>,
        metadata: Value,
        success: bool,
        error: Option<String>,
        now_ms: u64,
    ) -> CriticalEvent {
        let resolved = principal.cloned().or_else(|| self.sessions.current());
        let event = CriticalEvent {
            id: Uuid::new_v4().to_string(),
            timestamp_ms: now_ms,
            kind,
            user_id: resolved.as_ref().map(|p| p.id.clone()),
            user_role: resolved.as_ref().map(|p| p.role),
            metadata: redact(&metadata),
            success,
            error: error.clone(),
        };
        {
            let mut store = self.store.lock().expect("event store mutex poisoned");
            store.insert(event.clone());
        }
        tracing::info!(kind = %kind, success, "critical event");
        metrics::record_critical_event(kind.as_str());

        if !success {
            self.faults.capture_error(
                &format!("critical event failed: {kind}"),
                None,
                &json!({ "kind": kind.as_str(), "error": error }),
                FaultLevel::Error,
            );
        }
        event
    }

    /// Thin wrapper shaping an authentication event.
    pub fn log_auth(
        &self,
        kind: CriticalEventKind,
        principal: Option<&Principal>,
        success: bool,
        error: Option<String>,
    ) -> CriticalEvent {
        self.log(kind, principal, json!({ "category": "auth" }), success, error)
    }

    /// Thin wrapper shaping an RBAC denial.
    pub fn log_rbac_denial(&self, principal: &Principal, resource: &str) -> CriticalEvent {
        self.log(
            CriticalEventKind::RbacDenied,
            Some(principal),
            json!({ "resource": resource }),
            false,
            None,
        )
    }

    /// Thin wrapper shaping a payment event.
    pub fn log_payment(
        &self,
        kind: CriticalEventKind,
        principal: Option<&Principal>,
        metadata: Value,
        success: bool,
        error: Option<String>,
    ) -> CriticalEvent {
        self.log(kind, principal, metadata, success, error)
    }

    pub fn get_statistics(&self, window: TimeWindow) -> EventStatistics {
        self.get_statistics_at(window, now_ms())
    }

    pub fn get_statistics_at(&self, window: TimeWindow, now_ms: u64) -> EventStatistics {
        let range = window.range_ending(now_ms);
        let store = self.store.lock().expect("event store mutex poisoned");

        let mut total = 0;
        let mut success_count = 0;
        let mut failure_count = 0;
        let mut by_kind: HashMap<String, usize> = HashMap::new();
        let mut logins = 0;
        let mut login_failures = 0;
        let mut rbac_denials = 0;

        for event in store.query(range) {
            total += 1;
            if event.success {
                success_count += 1;
            } else {
                failure_count += 1;
            }
            *by_kind.entry(event.kind.as_str().to_string()).or_insert(0) += 1;
            if event.kind.is_auth_login() {
                logins += 1;
                if event.kind == CriticalEventKind::AuthLoginFailure {
                    login_failures += 1;
                }
            }
            if event.kind == CriticalEventKind::RbacDenied {
                rbac_denials += 1;
            }
        }

        let failure_rate_pct = if logins > 0 {
            login_failures as f64 / logins as f64 * 100.0
        } else {
            0.0
        };

        EventStatistics {
            total,
            success_count,
            failure_count,
            by_kind,
            auth: AuthStats {
                logins,
                failures: login_failures,
                failure_rate_pct,
            },
            rbac_denials,
        }
    }

    /// Newest-first slice for export.
    pub fn snapshot_events(&self, limit: usize) -> Vec<CriticalEvent> {
        let store = self.store.lock().expect("event store mutex poisoned");
        store.iter().take(limit).cloned().collect()
    }

    pub fn clear(&self) {
        self.store
            .lock()
            .expect("event store mutex poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TimeWindow;

    fn logger() -> (CriticalEventLogger, Arc<FaultMonitor>) {
        let config = TelemetryConfig {
            capacity: 1000,
            snapshot_cap: 200,
            persist_dir: None,
        };
        let faults = Arc::new(FaultMonitor::new(&config, None));
        let sessions = Arc::new(SessionStore::new(None));
        (
            CriticalEventLogger::new(&config, None, sessions, faults.clone()),
            faults,
        )
    }

    #[test]
    fn auth_failure_rate_over_24h() {
        let (logger, _) = logger();
        for _ in 0..10 {
            logger.log_auth(CriticalEventKind::AuthLoginSuccess, None, true, None);
        }
        for _ in 0..2 {
            logger.log_auth(
                CriticalEventKind::AuthLoginFailure,
                None,
                false,
                Some("bad password".to_string()),
            );
        }
        let stats = logger.get_statistics(TimeWindow::DAY);
        assert_eq!(stats.auth.logins, 12);
        assert_eq!(stats.auth.failures, 2);
        assert!((stats.auth.failure_rate_pct - 16.7).abs() < 0.1);
    }

    #[test]
    fn histogram_and_denial_counts() {
        let (logger, _) = logger();
        let manager = Principal {
            id: "user-1".to_string(),
            role: Role::PropertyManager,
        };
        logger.log(
            CriticalEventKind::PropertyCreated,
            Some(&manager),
            json!({ "name": "Sunset Apartments" }),
            true,
            None,
        );
        logger.log_rbac_denial(&manager, "/api/admin/users");
        logger.log_rbac_denial(&manager, "/api/settings");

        let stats = logger.get_statistics(TimeWindow::DAY);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_kind["property_created"], 1);
        assert_eq!(stats.by_kind["rbac_denied"], 2);
        assert_eq!(stats.rbac_denials, 2);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.failure_count, 2);
    }

    #[test]
    fn metadata_is_redacted_and_failures_mirror_to_faults() {
        let (logger, faults) = logger();
        let event = logger.log(
            CriticalEventKind::PaymentFailed,
            None,
            json!({ "creditCard": "4111", "amount": 950 }),
            false,
            Some("card declined".to_string()),
        );
        assert_eq!(event.metadata["creditCard"], "[REDACTED]");
        assert_eq!(event.metadata["amount"], 950);

        let fault_stats = faults.get_error_stats(TimeWindow::DAY);
        assert_eq!(fault_stats.total, 1);
        assert!(fault_stats.recent[0].message.contains("payment_failed"));
    }

    #[test]
    fn principal_falls_back_to_session_state() {
        let config = TelemetryConfig {
            capacity: 10,
            snapshot_cap: 5,
            persist_dir: None,
        };
        let faults = Arc::new(FaultMonitor::new(&config, None));
        let sessions = Arc::new(SessionStore::new(None));
        sessions.set_current(Principal {
            id: "session-user".to_string(),
            role: Role::Tenant,
        });
        let logger = CriticalEventLogger::new(&config, None, sessions, faults);

        let event = logger.log(
            CriticalEventKind::DataExport,
            None,
            json!({}),
            true,
            None,
        );
        assert_eq!(event.user_id.as_deref(), Some("session-user"));
        assert_eq!(event.user_role, Some(Role::Tenant));
    }
}
