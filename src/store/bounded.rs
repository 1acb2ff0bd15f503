//! The bounded event store shared by every telemetry monitor.
//!
//! A capped, most-recent-first log. Inserts prepend; once the store exceeds
//! its capacity the oldest entries are evicted from the tail. Every insert
//! synchronously persists a capped snapshot (fire-and-forget) and then
//! notifies observers in registration order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::store::observer::StoreObserver;
use crate::store::persistence::KeyValueStore;
use crate::store::TimeRange;

/// Anything that can live in a [`BoundedEventStore`].
pub trait StoreEvent {
    fn timestamp_ms(&self) -> u64;
}

struct SnapshotSink {
    key: String,
    cap: usize,
    backend: Arc<dyn KeyValueStore>,
}

pub struct BoundedEventStore<T> {
    events: VecDeque<T>,
    capacity: usize,
    snapshot: Option<SnapshotSink>,
    observers: Vec<Box<dyn StoreObserver<T>>>,
}

impl<T> BoundedEventStore<T>
where
    T: StoreEvent + Serialize + DeserializeOwned,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            snapshot: None,
            observers: Vec::new(),
        }
    }

    /// Persist a capped snapshot under `key` on every mutation.
    pub fn with_snapshot(
        mut self,
        backend: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        cap: usize,
    ) -> Self {
        self.snapshot = Some(SnapshotSink {
            key: key.into(),
            cap,
            backend,
        });
        self
    }

    /// Register an observer. Observers are notified in registration order.
    pub fn subscribe(&mut self, observer: Box<dyn StoreObserver<T>>) {
        self.observers.push(observer);
    }

    /// Insert most-recent-first, evicting from the tail past capacity, then
    /// persist the snapshot and notify observers. An observer failure is
    /// logged and does not abort the insert or the remaining observers.
    pub fn insert(&mut self, event: T) {
        self.events.push_front(event);
        self.events.truncate(self.capacity);
        self.persist_snapshot();
        if let Some(event) = self.events.front() {
            for observer in &self.observers {
                if let Err(err) = observer.on_insert(event) {
                    tracing::warn!(
                        observer = observer.name(),
                        error = %err,
                        "store observer failed"
                    );
                }
            }
        }
    }

    /// Lazy, restartable iterator over events inside `range`. No cursor state
    /// is shared; calling `query` again restarts from the newest event.
    pub fn query(&self, range: TimeRange) -> impl Iterator<Item = &T> + '_ {
        self.events
            .iter()
            .filter(move |event| range.contains(event.timestamp_ms()))
    }

    /// Count events per key produced by `key_fn`.
    pub fn group_by<F>(&self, key_fn: F) -> HashMap<String, usize>
    where
        F: Fn(&T) -> String,
    {
        let mut counts = HashMap::new();
        for event in &self.events {
            *counts.entry(key_fn(event)).or_insert(0) += 1;
        }
        counts
    }

    /// Newest-first iterator over everything currently held.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.persist_snapshot();
    }

    /// Restore events from the persisted snapshot, newest first. Read or
    /// decode failures are logged and leave the store empty.
    pub fn load_snapshot(&mut self) {
        let Some(sink) = &self.snapshot else { return };
        match sink.backend.get(&sink.key) {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<T>>(&blob) {
                Ok(events) => {
                    self.events = events.into_iter().take(self.capacity).collect();
                }
                Err(err) => {
                    tracing::warn!(key = %sink.key, error = %err, "snapshot decode failed");
                }
            },
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(key = %sink.key, error = %err, "snapshot read failed");
            }
        }
    }

    fn persist_snapshot(&self) {
        let Some(sink) = &self.snapshot else { return };
        let slice: Vec<&T> = self.events.iter().take(sink.cap).collect();
        match serde_json::to_string(&slice) {
            Ok(blob) => {
                if let Err(err) = sink.backend.set(&sink.key, &blob) {
                    tracing::warn!(key = %sink.key, error = %err, "snapshot write failed");
                }
            }
            Err(err) => {
                tracing::warn!(key = %sink.key, error = %err, "snapshot encode failed");
            }
        }
    }
}

/// Nearest-rank percentile over an ascending sorted copy of `values`.
/// Index is `ceil(p/100 * n) - 1`. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let rank = ((p / 100.0) * n as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(n - 1);
    Some(sorted[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::persistence::MemoryStore;
    use crate::store::ObserverError;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestEvent {
        at: u64,
        tag: String,
    }

    impl StoreEvent for TestEvent {
        fn timestamp_ms(&self) -> u64 {
            self.at
        }
    }

    fn event(at: u64, tag: &str) -> TestEvent {
        TestEvent {
            at,
            tag: tag.to_string(),
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut store = BoundedEventStore::new(3);
        for i in 0..4 {
            store.insert(event(i, "e"));
        }
        assert_eq!(store.len(), 3);
        // Newest first; the oldest (at=0) was evicted.
        let timestamps: Vec<u64> = store.iter().map(|e| e.at).collect();
        assert_eq!(timestamps, vec![3, 2, 1]);
    }

    #[test]
    fn query_is_restartable_and_filters_by_range() {
        let mut store = BoundedEventStore::new(10);
        for i in [100u64, 200, 300, 400] {
            store.insert(event(i, "e"));
        }
        let range = TimeRange {
            start_ms: 200,
            end_ms: 300,
        };
        let first: Vec<u64> = store.query(range).map(|e| e.at).collect();
        let second: Vec<u64> = store.query(range).map(|e| e.at).collect();
        assert_eq!(first, vec![300, 200]);
        assert_eq!(first, second, "query must restart, not share a cursor");
    }

    #[test]
    fn group_by_counts_keys() {
        let mut store = BoundedEventStore::new(10);
        store.insert(event(1, "login"));
        store.insert(event(2, "login"));
        store.insert(event(3, "payment"));
        let counts = store.group_by(|e| e.tag.clone());
        assert_eq!(counts["login"], 2);
        assert_eq!(counts["payment"], 1);
    }

    #[test]
    fn percentile_uses_nearest_rank() {
        let values = [15.0, 20.0, 35.0, 40.0, 50.0];
        assert_eq!(percentile(&values, 30.0), Some(20.0));
        assert_eq!(percentile(&values, 40.0), Some(20.0));
        assert_eq!(percentile(&values, 50.0), Some(35.0));
        assert_eq!(percentile(&values, 100.0), Some(50.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    struct CountingObserver {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        fail: bool,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl StoreObserver<TestEvent> for CountingObserver {
        fn name(&self) -> &str {
            self.name
        }

        fn on_insert(&self, _event: &TestEvent) -> Result<(), ObserverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.order.lock().unwrap().push(self.name);
            if self.fail {
                Err("observer exploded".into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn failing_observer_does_not_abort_others() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));

        let mut store = BoundedEventStore::new(10);
        store.subscribe(Box::new(CountingObserver {
            name: "first",
            calls: first_calls.clone(),
            fail: true,
            order: order.clone(),
        }));
        store.subscribe(Box::new(CountingObserver {
            name: "second",
            calls: second_calls.clone(),
            fail: false,
            order: order.clone(),
        }));

        store.insert(event(1, "e"));
        assert_eq!(store.len(), 1, "failing observer must not abort the insert");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn snapshot_persists_capped_slice_and_reloads() {
        let backend = Arc::new(MemoryStore::new());
        let mut store = BoundedEventStore::new(10)
            .with_snapshot(backend.clone() as Arc<dyn KeyValueStore>, "test:events", 2);
        for i in 0..5 {
            store.insert(event(i, "e"));
        }

        let blob = backend.get("test:events").unwrap().unwrap();
        let persisted: Vec<TestEvent> = serde_json::from_str(&blob).unwrap();
        assert_eq!(persisted.len(), 2, "snapshot must be capped");
        assert_eq!(persisted[0].at, 4);

        let mut restored: BoundedEventStore<TestEvent> = BoundedEventStore::new(10)
            .with_snapshot(backend as Arc<dyn KeyValueStore>, "test:events", 2);
        restored.load_snapshot();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.iter().next().unwrap().at, 4);
    }
}
