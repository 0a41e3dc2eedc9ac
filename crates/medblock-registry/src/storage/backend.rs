//! State backends: the durable substrate under the registry.
//!
//! A backend stores whole snapshots. The registry hands it a snapshot whose
//! `revision` is one past the revision it last loaded or persisted; the
//! backend refuses the write with `Conflict` if someone else got there
//! first.

use std::sync::Mutex;

use crate::error::{RegistryError, Result};

use super::snapshot::RegistrySnapshot;

/// Durable storage for registry snapshots.
pub trait StateBackend: Send + Sync {
    /// Load the latest snapshot, or `None` for a fresh registry.
    fn load(&self) -> Result<Option<RegistrySnapshot>>;

    /// Persist `snapshot`, replacing the stored one.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the stored revision is not
    /// `snapshot.revision - 1`.
    fn persist(&self, snapshot: &RegistrySnapshot) -> Result<()>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Check that `stored` is the revision directly before `incoming`.
pub fn check_revision(stored: u64, incoming: u64) -> Result<()> {
    if incoming != stored + 1 {
        return Err(RegistryError::Conflict(format!(
            "stored revision is {stored}, refusing to write revision {incoming}"
        )));
    }
    Ok(())
}

/// Backend that keeps the latest snapshot in memory. Nothing survives the
/// process; useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    latest: Mutex<Option<RegistrySnapshot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot.
    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        Self {
            latest: Mutex::new(Some(snapshot)),
        }
    }

    /// Clone of the stored snapshot.
    pub fn latest(&self) -> Option<RegistrySnapshot> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self) -> Result<Option<RegistrySnapshot>> {
        let guard = self
            .latest
            .lock()
            .map_err(|_| RegistryError::StorageError("memory backend lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn persist(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        let mut guard = self
            .latest
            .lock()
            .map_err(|_| RegistryError::StorageError("memory backend lock poisoned".into()))?;
        let stored = guard.as_ref().map_or(0, |s| s.revision);
        check_revision(stored, snapshot.revision)?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
