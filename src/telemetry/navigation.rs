//! Route transition and dwell-time tracking.
//!
//! Each route change closes the outgoing page view (computing dwell time and
//! exit reason) and opens a view for the destination. Statistics derive the
//! top visited paths, average dwell and bounce rate from closed views.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::TelemetryConfig;
use crate::observability::metrics;
use crate::store::persistence::KeyValueStore;
use crate::store::{now_ms, percentile, BoundedEventStore, StoreEvent, TimeWindow};

/// Views shorter than this count as bounces.
pub const BOUNCE_THRESHOLD_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMethod {
    Push,
    Replace,
    Pop,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitMethod {
    Navigation,
    Close,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub from: String,
    pub to: String,
    pub method: NavigationMethod,
    pub timestamp_ms: u64,
}

impl StoreEvent for NavigationEvent {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageView {
    pub path: String,
    pub title: Option<String>,
    pub timestamp_ms: u64,
    pub time_on_page_ms: Option<u64>,
    pub exit_method: Option<ExitMethod>,
}

impl StoreEvent for PageView {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PathCount {
    pub path: String,
    pub views: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigationStats {
    pub total_views: usize,
    pub top_paths: Vec<PathCount>,
    pub avg_time_on_page_ms: f64,
    pub p95_time_on_page_ms: f64,
    /// Fraction of closed views shorter than the bounce threshold, as a
    /// percentage.
    pub bounce_rate_pct: f64,
}

pub struct NavigationTracker {
    navigations: Mutex<BoundedEventStore<NavigationEvent>>,
    views: Mutex<BoundedEventStore<PageView>>,
    current: Mutex<Option<PageView>>,
}

impl NavigationTracker {
    pub fn new(config: &TelemetryConfig, sink: Option<Arc<dyn KeyValueStore>>) -> Self {
        let mut navigations = BoundedEventStore::new(config.capacity);
        let mut views = BoundedEventStore::new(config.capacity);
        if let Some(sink) = sink {
            navigations =
                navigations.with_snapshot(sink.clone(), "telemetry:navigations", config.snapshot_cap);
            views = views.with_snapshot(sink, "telemetry:page_views", config.snapshot_cap);
            navigations.load_snapshot();
            views.load_snapshot();
        }
        Self {
            navigations: Mutex::new(navigations),
            views: Mutex::new(views),
            current: Mutex::new(None),
        }
    }

    /// Record a route transition: close the outgoing view, open the new one.
    pub fn record_route_change(
        &self,
        from: &str,
        to: &str,
        method: NavigationMethod,
        title: Option<&str>,
    ) {
        self.record_route_change_at(from, to, method, title, now_ms());
    }

    pub fn record_route_change_at(
        &self,
        from: &str,
        to: &str,
        method: NavigationMethod,
        title: Option<&str>,
        now_ms: u64,
    ) {
        self.close_current_at(ExitMethod::Navigation, now_ms);
        {
            let mut navigations = self.navigations.lock().expect("navigation mutex poisoned");
            navigations.insert(NavigationEvent {
                from: from.to_string(),
                to: to.to_string(),
                method,
                timestamp_ms: now_ms,
            });
        }
        *self.current.lock().expect("page view mutex poisoned") = Some(PageView {
            path: to.to_string(),
            title: title.map(str::to_string),
            timestamp_ms: now_ms,
            time_on_page_ms: None,
            exit_method: None,
        });
        metrics::record_navigation();
    }

    /// Close the open view when the session ends (tab close or refresh).
    pub fn end_session(&self, exit: ExitMethod) {
        self.end_session_at(exit, now_ms());
    }

    pub fn end_session_at(&self, exit: ExitMethod, now_ms: u64) {
        self.close_current_at(exit, now_ms);
    }

    fn close_current_at(&self, exit: ExitMethod, now_ms: u64) {
        let Some(mut view) = self.current.lock().expect("page view mutex poisoned").take() else {
            return;
        };
        view.time_on_page_ms = Some(now_ms.saturating_sub(view.timestamp_ms));
        view.exit_method = Some(exit);
        self.views
            .lock()
            .expect("page view mutex poisoned")
            .insert(view);
    }

    pub fn get_statistics(&self, window: TimeWindow) -> NavigationStats {
        self.get_statistics_at(window, now_ms())
    }

    pub fn get_statistics_at(&self, window: TimeWindow, now_ms: u64) -> NavigationStats {
        let range = window.range_ending(now_ms);
        let views = self.views.lock().expect("page view mutex poisoned");

        let mut total_views = 0;
        let mut path_counts: HashMap<String, usize> = HashMap::new();
        let mut dwells: Vec<f64> = Vec::new();
        let mut dwell_total: u64 = 0;
        let mut bounces = 0;
        for view in views.query(range) {
            total_views += 1;
            *path_counts.entry(view.path.clone()).or_insert(0) += 1;
            if let Some(dwell) = view.time_on_page_ms {
                dwells.push(dwell as f64);
                dwell_total += dwell;
                if dwell < BOUNCE_THRESHOLD_MS {
                    bounces += 1;
                }
            }
        }
        let closed = dwells.len();

        let mut top_paths: Vec<PathCount> = path_counts
            .into_iter()
            .map(|(path, views)| PathCount { path, views })
            .collect();
        top_paths.sort_by(|a, b| b.views.cmp(&a.views).then(a.path.cmp(&b.path)));
        top_paths.truncate(10);

        NavigationStats {
            total_views,
            top_paths,
            avg_time_on_page_ms: if closed > 0 {
                dwell_total as f64 / closed as f64
            } else {
                0.0
            },
            p95_time_on_page_ms: percentile(&dwells, 95.0).unwrap_or(0.0),
            bounce_rate_pct: if closed > 0 {
                bounces as f64 / closed as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Newest-first slices for export.
    pub fn snapshot_views(&self, limit: usize) -> Vec<PageView> {
        let views = self.views.lock().expect("page view mutex poisoned");
        views.iter().take(limit).cloned().collect()
    }

    pub fn snapshot_navigations(&self, limit: usize) -> Vec<NavigationEvent> {
        let navigations = self.navigations.lock().expect("navigation mutex poisoned");
        navigations.iter().take(limit).cloned().collect()
    }

    pub fn clear_metrics(&self) {
        self.navigations
            .lock()
            .expect("navigation mutex poisoned")
            .clear();
        self.views.lock().expect("page view mutex poisoned").clear();
        *self.current.lock().expect("page view mutex poisoned") = None;
    }
}
