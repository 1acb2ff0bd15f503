//! Persisted session lookup.
//!
//! Telemetry monitors resolve the acting user from here when no explicit
//! principal is supplied. The session is mirrored to persistence under a
//! fixed key as `{"user": {"id", "role"}}`; write failures are swallowed
//! with a warning.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::auth::gate::Principal;
use crate::auth::rbac::Role;
use crate::store::persistence::KeyValueStore;

const SESSION_KEY: &str = "session:current";

pub struct SessionStore {
    current: Mutex<Option<Principal>>,
    sink: Option<Arc<dyn KeyValueStore>>,
}

impl SessionStore {
    pub fn new(sink: Option<Arc<dyn KeyValueStore>>) -> Self {
        Self {
            current: Mutex::new(None),
            sink,
        }
    }

    pub fn set_current(&self, principal: Principal) {
        if let Some(sink) = &self.sink {
            let blob = json!({
                "user": { "id": principal.id, "role": principal.role }
            });
            if let Err(err) = sink.set(SESSION_KEY, &blob.to_string()) {
                tracing::warn!(error = %err, "session persist failed");
            }
        }
        *self.current.lock().expect("session mutex poisoned") = Some(principal);
    }

    pub fn clear(&self) {
        *self.current.lock().expect("session mutex poisoned") = None;
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.set(SESSION_KEY, "{}") {
                tracing::warn!(error = %err, "session persist failed");
            }
        }
    }

    pub fn current(&self) -> Option<Principal> {
        self.current.lock().expect("session mutex poisoned").clone()
    }

    /// Restore the session from persistence, if one was stored.
    pub fn load(&self) {
        let Some(sink) = &self.sink else { return };
        let blob = match sink.get(SESSION_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "session read failed");
                return;
            }
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&blob) else {
            return;
        };
        let user = &value["user"];
        let (Some(id), Some(role)) = (user["id"].as_str(), user["role"].as_str()) else {
            return;
        };
        if let Ok(role) = Role::from_str(role) {
            *self.current.lock().expect("session mutex poisoned") = Some(Principal {
                id: id.to_string(),
                role,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::persistence::MemoryStore;

    #[test]
    fn session_round_trips_through_persistence() {
        let backend = Arc::new(MemoryStore::new());
        let sessions = SessionStore::new(Some(backend.clone() as Arc<dyn KeyValueStore>));
        sessions.set_current(Principal {
            id: "user-3".to_string(),
            role: Role::PropertyManager,
        });

        let restored = SessionStore::new(Some(backend as Arc<dyn KeyValueStore>));
        assert_eq!(restored.current(), None);
        restored.load();
        let principal = restored.current().unwrap();
        assert_eq!(principal.id, "user-3");
        assert_eq!(principal.role, Role::PropertyManager);
    }

    #[test]
    fn clear_empties_current_and_persisted_state() {
        let backend = Arc::new(MemoryStore::new());
        let sessions = SessionStore::new(Some(backend.clone() as Arc<dyn KeyValueStore>));
        sessions.set_current(Principal {
            id: "user-3".to_string(),
            role: Role::Tenant,
        });
        sessions.clear();
        assert_eq!(sessions.current(), None);

        let restored = SessionStore::new(Some(backend as Arc<dyn KeyValueStore>));
        restored.load();
        assert_eq!(restored.current(), None);
    }
}
