//! Registry snapshots: the persisted shape of registry state.
//!
//! Logical layout: an identities table (patients plus doctors with their
//! `active` flag), a grants table keyed by `(doctor_id, patient_id)`, and
//! the event ledger. Lists are sorted by id so that equal states
//! serialize to equal bytes.

use serde::{Deserialize, Serialize};

use crate::access::AccessGrant;
use crate::identity::{DoctorRecord, PatientRecord};
use crate::ledger::RegistryEvent;

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A complete, self-contained copy of registry state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Schema version.
    pub version: u32,
    /// Incremented on every committed mutation. Backends use it to detect
    /// writers working from stale state.
    pub revision: u64,
    /// Id allocation sequence.
    pub next_sequence: u64,
    pub patients: Vec<PatientRecord>,
    pub doctors: Vec<DoctorRecord>,
    pub grants: Vec<AccessGrant>,
    pub events: Vec<RegistryEvent>,
}

impl RegistrySnapshot {
    /// Snapshot of an empty registry at revision 0.
    pub fn empty() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            revision: 0,
            next_sequence: 0,
            patients: Vec::new(),
            doctors: Vec::new(),
            grants: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Sort every table into canonical order.
    pub fn normalize(&mut self) {
        self.patients.sort_by(|a, b| a.id.cmp(&b.id));
        self.doctors.sort_by(|a, b| a.id.cmp(&b.id));
        self.grants.sort_by(|a, b| {
            (&a.doctor_id, &a.patient_id).cmp(&(&b.doctor_id, &b.patient_id))
        });
        self.events.sort_by_key(|e| e.sequence);
    }
}
