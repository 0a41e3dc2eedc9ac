//! Patient and doctor identities.
//!
//! The identity module provides:
//! - Registry-assigned, never-reused identity ids
//! - Patient and doctor records with input validation
//! - A store with soft delete for doctors

pub mod record;
pub mod store;

pub use record::{DoctorRecord, Identity, IdentityId, IdentityKind, PatientRecord};
pub use store::IdentityStore;
