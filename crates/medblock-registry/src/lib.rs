//! MedBlock registry: a permissioned medical-record registry.
//!
//! Patients and doctors are registered identities. A patient's record is
//! readable only by the patient and by doctors the patient has granted
//! access to; grants are revocable at any time and removing a doctor drops
//! every grant it held. All mutations go through [`RegistryService`], which
//! authorizes, applies, persists, and records each one atomically.

pub mod access;
pub mod authz;
pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod service;
pub mod storage;
pub mod time;

// Re-export primary types
pub use access::{AccessGrant, AccessLevel, RelationshipGraph};
pub use authz::{AccessController, Decision, Operation, Principal};
pub use config::RegistryConfig;
pub use error::{ErrorKind, RegistryError, Result};
pub use identity::{DoctorRecord, Identity, IdentityId, IdentityKind, IdentityStore, PatientRecord};
pub use ledger::{EventKind, EventLedger, RegistryEvent};
pub use service::{RegistryService, RegistryStats};
pub use storage::{FileBackend, MemoryBackend, RegistrySnapshot, StateBackend};
