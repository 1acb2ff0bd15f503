//! Aggregated reporting and export.

use serde::Serialize;
use serde_json::{json, Value};

use crate::store::{now_ms, TimeWindow, SNAPSHOT_CAP};
use crate::telemetry::events::EventStatistics;
use crate::telemetry::faults::ErrorStats;
use crate::telemetry::navigation::NavigationStats;
use crate::telemetry::Telemetry;

/// Seven-day aggregation across all three monitors.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub generated_at_ms: u64,
    pub errors: ErrorStats,
    pub events: EventStatistics,
    pub navigation: NavigationStats,
}

impl Telemetry {
    pub fn generate_weekly_report(&self) -> WeeklyReport {
        self.generate_weekly_report_at(now_ms())
    }

    pub fn generate_weekly_report_at(&self, now_ms: u64) -> WeeklyReport {
        WeeklyReport {
            generated_at_ms: now_ms,
            errors: self.faults.get_error_stats_at(TimeWindow::WEEK, now_ms),
            events: self.events.get_statistics_at(TimeWindow::WEEK, now_ms),
            navigation: self.navigation.get_statistics_at(TimeWindow::WEEK, now_ms),
        }
    }

    /// One downloadable JSON document with every monitor's capped event list.
    pub fn export_snapshot(&self) -> Value {
        json!({
            "exportedAtMs": now_ms(),
            "faults": self.faults.snapshot_events(SNAPSHOT_CAP),
            "criticalEvents": self.events.snapshot_events(SNAPSHOT_CAP),
            "pageViews": self.navigation.snapshot_views(SNAPSHOT_CAP),
            "navigations": self.navigation.snapshot_navigations(SNAPSHOT_CAP),
        })
    }
}
