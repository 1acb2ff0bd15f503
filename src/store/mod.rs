//! Bounded, time-windowed event storage.
//!
//! # Data Flow
//! ```text
//! monitor.capture(...)
//!     → bounded.rs (insert, evict oldest past capacity)
//!     → persistence.rs (capped JSON snapshot, fire-and-forget)
//!     → observer.rs (listeners in registration order, failures isolated)
//!
//! stats query:
//!     → bounded.rs query(range) (lazy, restartable iterator)
//!     → group_by / percentile
//! ```
//!
//! # Design Decisions
//! - Stores are single-owner; monitors wrap them in a `Mutex` themselves
//! - Snapshot cap is one constant shared by every monitor
//! - A persistence failure never aborts the insert that triggered it

pub mod bounded;
pub mod observer;
pub mod persistence;

pub use bounded::{percentile, BoundedEventStore, StoreEvent};
pub use observer::{ObserverError, StoreObserver};
pub use persistence::{JsonFileStore, KeyValueStore, MemoryStore};

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot cap applied uniformly to every monitor's persisted slice.
pub const SNAPSHOT_CAP: usize = 200;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Inclusive time range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimeRange {
    /// Range covering the trailing `window_ms` up to `now_ms`.
    pub fn last(window_ms: u64, now_ms: u64) -> Self {
        Self {
            start_ms: now_ms.saturating_sub(window_ms),
            end_ms: now_ms,
        }
    }

    pub fn contains(&self, timestamp_ms: u64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms <= self.end_ms
    }
}

/// A human-readable trailing window such as `"5m"`, `"24h"` or `"7d"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow(pub u64);

impl TimeWindow {
    pub const FIVE_MINUTES: TimeWindow = TimeWindow(5 * 60 * 1000);
    pub const DAY: TimeWindow = TimeWindow(24 * 60 * 60 * 1000);
    pub const WEEK: TimeWindow = TimeWindow(7 * 24 * 60 * 60 * 1000);

    pub fn as_ms(&self) -> u64 {
        self.0
    }

    pub fn range_ending(&self, now_ms: u64) -> TimeRange {
        TimeRange::last(self.0, now_ms)
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("window '{s}' is missing a unit (s/m/h/d)"))?;
        let (digits, unit) = s.split_at(split);
        let amount: u64 = digits
            .parse()
            .map_err(|_| format!("window '{s}' has an invalid amount"))?;
        let unit_ms = match unit {
            "s" => 1000,
            "m" => 60 * 1000,
            "h" => 60 * 60 * 1000,
            "d" => 24 * 60 * 60 * 1000,
            other => return Err(format!("unknown window unit '{other}'")),
        };
        Ok(TimeWindow(amount * unit_ms))
    }
}
