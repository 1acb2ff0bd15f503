//! Store observers.
//!
//! Listeners are notified synchronously on every insert, in registration
//! order. A listener that fails is logged and skipped; it never aborts the
//! insert or the listeners after it.

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Observer interface for [`super::BoundedEventStore`] inserts.
pub trait StoreObserver<T>: Send {
    /// Stable name used when logging a failed notification.
    fn name(&self) -> &str;

    fn on_insert(&self, event: &T) -> Result<(), ObserverError>;
}
