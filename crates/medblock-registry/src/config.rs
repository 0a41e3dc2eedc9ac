//! Registry configuration.
//!
//! Loaded from a JSON file; every field has a default so a partial (or
//! empty) object is valid:
//!
//! ```json
//! { "admin_enabled": false, "open_registration": true, "max_name_len": 256 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::identity::record::DEFAULT_MAX_NAME_LEN;

/// Policy and validation settings for a registry instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Honour `Principal::Admin` for grant management and doctor removal.
    pub admin_enabled: bool,
    /// Let any caller create identities. When off, only admins may.
    pub open_registration: bool,
    /// Upper bound on identity name length, in characters.
    pub max_name_len: usize,
    /// Re-verify the ledger hash chain when opening persisted state.
    pub verify_ledger_on_open: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            admin_enabled: false,
            open_registration: true,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            verify_ledger_on_open: true,
        }
    }
}

impl RegistryConfig {
    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `InvalidFileFormat` if it
    /// is not valid JSON for this type, or `InvalidInput` if a value is out
    /// of range.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config: RegistryConfig = serde_json::from_slice(&bytes).map_err(|e| {
            RegistryError::InvalidFileFormat(format!(
                "failed to parse config {}: {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_name_len == 0 {
            return Err(RegistryError::InvalidInput(
                "max_name_len must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
