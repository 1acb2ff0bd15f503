//! Client and server telemetry monitors.
//!
//! # Responsibilities
//! - Fault capture with fingerprint grouping and alert rules (`faults`)
//! - Audit trail of security-significant events (`events`)
//! - Route transitions and page dwell tracking (`navigation`)
//! - Sensitive-value redaction applied before anything is stored (`redact`)
//! - Cross-monitor weekly reporting and export (`report`)
//!
//! # Data Flow
//! Each monitor owns its bounded stores; nothing is shared between them
//! except the optional snapshot sink and the fault monitor, which the event
//! logger mirrors storage failures into. The `Telemetry` hub wires the three
//! together and is what request handlers and the admin surface see.

pub mod events;
pub mod faults;
pub mod navigation;
pub mod redact;
pub mod report;

use std::sync::Arc;

use crate::auth::session::SessionStore;
use crate::config::TelemetryConfig;
use crate::store::persistence::KeyValueStore;

pub use events::{CriticalEvent, CriticalEventKind, CriticalEventLogger, EventStatistics};
pub use faults::{FaultEvent, FaultLevel, FaultMonitor};
pub use navigation::{ExitMethod, NavigationMethod, NavigationTracker};
pub use report::WeeklyReport;

/// The three monitors behind one handle.
pub struct Telemetry {
    pub faults: Arc<FaultMonitor>,
    pub events: Arc<CriticalEventLogger>,
    pub navigation: Arc<NavigationTracker>,
}

impl Telemetry {
    pub fn new(
        config: &TelemetryConfig,
        sink: Option<Arc<dyn KeyValueStore>>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let faults = Arc::new(FaultMonitor::new(config, sink.clone()));
        let events = Arc::new(CriticalEventLogger::new(
            config,
            sink.clone(),
            sessions,
            faults.clone(),
        ));
        let navigation = Arc::new(NavigationTracker::new(config, sink));
        Self {
            faults,
            events,
            navigation,
        }
    }

    /// Wipe every monitor. Used by the admin surface.
    pub fn clear_all(&self) {
        self.faults.clear_errors();
        self.events.clear();
        self.navigation.clear_metrics();
    }
}
