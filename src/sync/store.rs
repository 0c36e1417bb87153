//! Shared snapshot stores.
//!
//! Writes are last-writer-wins at the granularity of a whole snapshot.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{Error, Result};

/// Persists the latest full snapshot for every surface to read.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &Value) -> Result<()>;

    fn load(&self) -> Result<Option<Value>>;
}

/// Snapshot kept in a JSON file.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        // Write then rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| Error::Storage(format!("failed to write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Storage(format!("failed to replace {}: {}", self.path.display(), e)))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<Value>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Storage(format!("failed to read {}: {}", self.path.display(), e)))?;
        let value = serde_json::from_str(&json).map_err(|e| {
            log::warn!("Corrupted snapshot file {}: {}", self.path.display(), e);
            Error::Storage(format!("failed to parse {}: {}", self.path.display(), e))
        })?;
        Ok(Some(value))
    }
}

/// In-process store shared between surfaces by cloning.
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<Value>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail, as a full store would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &Value) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("snapshot store is full".to_string()));
        }
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::Storage("snapshot store lock poisoned".to_string()))?;
        *slot = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<Value>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| Error::Storage("snapshot store lock poisoned".to_string()))?;
        Ok(slot.clone())
    }
}
