//! Durable Storage Module
//!
//! The durable key-value medium behind cache persistence. One slot per
//! `storage_key` holds the serialized entry map plus counters. The format is
//! private to this subsystem and re-read only at startup; it is not a stable
//! cross-version wire format.
//!
//! All backends are best-effort: callers catch and log failures, and the
//! in-memory store stays authoritative for the session.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::Result;

// == Storage Backend Trait ==
/// A durable key-value slot store.
pub trait StorageBackend: Send + Sync {
    /// Reads a slot, `None` if it has never been written.
    fn read(&self, slot: &str) -> Result<Option<String>>;

    /// Writes a slot, replacing prior content.
    fn write(&self, slot: &str, payload: &str) -> Result<()>;

    /// Deletes a slot if present.
    fn remove(&self, slot: &str) -> Result<()>;

    /// Total bytes held across all slots, used by the registry's
    /// high-water-mark check.
    fn usage_bytes(&self) -> u64;
}

// == File Storage ==
/// Filesystem-backed storage: each slot is one JSON file under a base
/// directory.
#[derive(Debug)]
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// Creates the backend, creating the base directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        // Slot names become file names; anything path-like is flattened.
        let safe: String = slot
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{safe}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&self, slot: &str, payload: &str) -> Result<()> {
        fs::write(self.slot_path(slot), payload)?;
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<()> {
        let path = self.slot_path(slot);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn usage_bytes(&self) -> u64 {
        fs::read_dir(&self.base_dir)
            .map(|dir| {
                dir.filter_map(|e| e.ok())
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

// == Memory Storage ==
/// In-process storage backend, used by tests and as a fallback when no
/// durable medium is configured by the host.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.slots.lock().expect("storage lock poisoned").get(slot).cloned())
    }

    fn write(&self, slot: &str, payload: &str) -> Result<()> {
        self.slots
            .lock()
            .expect("storage lock poisoned")
            .insert(slot.to_string(), payload.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<()> {
        self.slots.lock().expect("storage lock poisoned").remove(slot);
        Ok(())
    }

    fn usage_bytes(&self) -> u64 {
        self.slots
            .lock()
            .expect("storage lock poisoned")
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}
