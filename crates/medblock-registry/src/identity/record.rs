//! Identity records: patients and doctors.
//!
//! Ids are assigned by the registry and never reused. The id prefix
//! mirrors the identity kind (`pat_` or `doc_`) so that log lines and
//! CLI output are readable, but the stored `kind` is authoritative.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{RegistryError, Result};

/// Default upper bound on identity name length, in characters.
pub const DEFAULT_MAX_NAME_LEN: usize = 256;

/// Unique identifier for a patient or doctor.
///
/// Format: `pat_` / `doc_` + base58 of the first 16 bytes of
/// SHA-256(kind || sequence || 16 random bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityId(pub String);

impl IdentityId {
    /// Derive a candidate id for `kind` from a sequence number and entropy.
    pub(crate) fn derive(kind: IdentityKind, sequence: u64, entropy: &[u8; 16]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_tag().as_bytes());
        hasher.update(sequence.to_le_bytes());
        hasher.update(entropy);
        let hash = hasher.finalize();
        let encoded = bs58::encode(&hash[..16]).into_string();
        Self(format!("{}{encoded}", kind.id_prefix()))
    }

    /// The string form of this id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The two kinds of identity the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    Patient,
    Doctor,
}

impl IdentityKind {
    /// Stable tag used in hashes and persisted data.
    pub fn as_tag(&self) -> &'static str {
        match self {
            IdentityKind::Patient => "patient",
            IdentityKind::Doctor => "doctor",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            IdentityKind::Patient => "pat_",
            IdentityKind::Doctor => "doc_",
        }
    }
}

impl std::fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A registered patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: IdentityId,
    pub name: String,
    pub age: u32,
    /// Creation timestamp (microseconds since epoch).
    pub created_at: u64,
}

/// A registered doctor.
///
/// Doctors are never erased. Removal flips `active` and records when,
/// so the id stays reserved and historical ledger entries still resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub id: IdentityId,
    pub name: String,
    pub active: bool,
    pub created_at: u64,
    pub deactivated_at: Option<u64>,
}

/// A resolved identity, as returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    Patient(PatientRecord),
    Doctor(DoctorRecord),
}

impl Identity {
    pub fn id(&self) -> &IdentityId {
        match self {
            Identity::Patient(p) => &p.id,
            Identity::Doctor(d) => &d.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Identity::Patient(p) => &p.name,
            Identity::Doctor(d) => &d.name,
        }
    }

    pub fn kind(&self) -> IdentityKind {
        match self {
            Identity::Patient(_) => IdentityKind::Patient,
            Identity::Doctor(_) => IdentityKind::Doctor,
        }
    }
}

/// Validate and normalize an identity name.
///
/// Surrounding whitespace is trimmed; the result must be non-empty and at
/// most `max_len` characters.
pub fn validate_name(name: &str, max_len: usize) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::InvalidInput("name must not be empty".into()));
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(RegistryError::InvalidInput(format!(
            "name is {len} characters, limit is {max_len}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate a patient age. Negative ages and ages beyond `u32` are rejected.
pub fn validate_age(age: i64) -> Result<u32> {
    if age < 0 {
        return Err(RegistryError::InvalidInput(format!(
            "age must be non-negative, got {age}"
        )));
    }
    u32::try_from(age).map_err(|_| RegistryError::InvalidInput(format!("age {age} out of range")))
}
