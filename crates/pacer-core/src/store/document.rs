//! The keyed JSON storage document.
//!
//! One `store.json` file holds every persisted store as a top-level key
//! (`"timerState"`, `"settingsState"`, ...). Each write is a
//! read-modify-write of the whole file under an internal lock, so
//! concurrent writers within a process cannot tear each other's blobs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Result, StoreError};

use super::data_dir;

/// File name of the document inside the data directory.
pub const DOCUMENT_FILE: &str = "store.json";

/// Handle to the storage document. Clones share the path and the write
/// lock.
#[derive(Debug, Clone)]
pub struct StoreDocument {
    inner: Arc<DocumentInner>,
}

#[derive(Debug)]
struct DocumentInner {
    path: PathBuf,
    // Serializes read-modify-write cycles across stores.
    lock: Mutex<()>,
}

impl StoreDocument {
    /// Use the document at an explicit path. The file (and its parent
    /// directory) is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    /// Use `store.json` inside the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::open(data_dir()?.join(DOCUMENT_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Read the blob stored under `name`, if any.
    ///
    /// # Errors
    /// Returns an error if the document exists but cannot be read or is
    /// not valid JSON. A missing document is `Ok(None)`.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        let _guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map()?;
        Ok(map.remove(name))
    }

    /// Overwrite the blob stored under `name`, keeping every other key.
    ///
    /// # Errors
    /// Returns an error if the document cannot be written. An unreadable
    /// existing document is logged and rebuilt from scratch.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let _guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map().unwrap_or_else(|e| {
            warn!("rebuilding store document: {e}");
            Map::new()
        });
        map.insert(name.to_string(), value);
        self.write_map(&map)
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        let path = &self.inner.path;
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StoreError::ReadFailed {
                    path: path.clone(),
                    source,
                })
            }
        };
        let value: Value = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        let path = &self.inner.path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::WriteFailed {
                    path: path.clone(),
                    source,
                })?;
            }
        }
        let content =
            serde_json::to_string_pretty(&Value::Object(map.clone())).map_err(|source| {
                StoreError::Serialize {
                    name: DOCUMENT_FILE.to_string(),
                    source,
                }
            })?;
        std::fs::write(path, content).map_err(|source| StoreError::WriteFailed {
            path: path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let doc = StoreDocument::open(dir.path().join("store.json"));
        doc.set("timerState", json!({ "timeLeft": 42 })).unwrap();
        let blob = doc.get("timerState").unwrap().unwrap();
        assert_eq!(blob["timeLeft"], 42);
    }

    #[test]
    fn missing_document_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let doc = StoreDocument::open(dir.path().join("store.json"));
        assert!(doc.get("timerState").unwrap().is_none());
    }

    #[test]
    fn stores_do_not_clobber_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let doc = StoreDocument::open(dir.path().join("store.json"));
        doc.set("timerState", json!({ "timeLeft": 1 })).unwrap();
        doc.set("settingsState", json!({ "theme": "zinc-light" }))
            .unwrap();
        assert_eq!(doc.get("timerState").unwrap().unwrap()["timeLeft"], 1);
        assert_eq!(
            doc.get("settingsState").unwrap().unwrap()["theme"],
            "zinc-light"
        );
    }

    #[test]
    fn corrupt_document_errors_on_get_but_set_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();
        let doc = StoreDocument::open(&path);
        assert!(matches!(
            doc.get("timerState"),
            Err(StoreError::Corrupt { .. })
        ));
        doc.set("timerState", json!({ "timeLeft": 7 })).unwrap();
        assert_eq!(doc.get("timerState").unwrap().unwrap()["timeLeft"], 7);
    }

    #[test]
    fn missing_parent_directory_is_created_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store.json");
        let doc = StoreDocument::open(&path);
        doc.set("settingsState", json!({ "theme": "x" })).unwrap();
        assert!(path.exists());
    }
}
