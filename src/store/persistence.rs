//! Key-value snapshot persistence.
//!
//! Concrete storage is deliberately abstract: each store persists one
//! serialized blob under a fixed key through [`KeyValueStore`]. Two backends
//! are provided, an in-memory map and a one-file-per-key JSON directory.

use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use dashmap::DashMap;

use crate::error::PersistenceError;

/// Minimal persistence interface: `get(key)` / `set(key, value)`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// In-memory backend, used in tests and as a default.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed backend: one JSON file per key under a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys such as "telemetry:faults" become safe file names.
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = BufReader::new(File::open(path)?);
        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;
        Ok(Some(contents))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir)?;
        let mut writer = BufWriter::new(File::create(self.path_for(key))?);
        writer.write_all(value.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("telemetry:faults", "[1,2,3]").unwrap();
        assert_eq!(
            store.get("telemetry:faults").unwrap().as_deref(),
            Some("[1,2,3]")
        );
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        assert_eq!(store.get("telemetry:faults").unwrap(), None);
        store.set("telemetry:faults", r#"{"a":1}"#).unwrap();
        assert_eq!(
            store.get("telemetry:faults").unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );

        // Key sanitization keeps distinct keys distinct.
        store.set("telemetry:events", "x").unwrap();
        assert_eq!(store.get("telemetry:faults").unwrap().as_deref(), Some(r#"{"a":1}"#));
    }
}
