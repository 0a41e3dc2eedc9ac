//! Registry events: one hash-chained entry per committed mutation.
//!
//! Events carry ids and levels only, never names or ages, so the ledger
//! can be shared for auditing without exposing record contents.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::access::AccessLevel;
use crate::authz::Principal;
use crate::identity::IdentityId;

/// What a committed mutation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    PatientAdded {
        patient: IdentityId,
    },
    DoctorAdded {
        doctor: IdentityId,
    },
    PatientUpdated {
        patient: IdentityId,
    },
    /// A grant was created or its level changed.
    AccessSet {
        doctor: IdentityId,
        patient: IdentityId,
        previous: AccessLevel,
        level: AccessLevel,
    },
    AccessRevoked {
        doctor: IdentityId,
        patient: IdentityId,
        previous: AccessLevel,
    },
    DoctorRemoved {
        doctor: IdentityId,
        dropped_grants: Vec<IdentityId>,
    },
}

impl EventKind {
    /// Stable tag for logs and filters.
    pub fn as_tag(&self) -> &'static str {
        match self {
            EventKind::PatientAdded { .. } => "patient_added",
            EventKind::DoctorAdded { .. } => "doctor_added",
            EventKind::PatientUpdated { .. } => "patient_updated",
            EventKind::AccessSet { .. } => "access_set",
            EventKind::AccessRevoked { .. } => "access_revoked",
            EventKind::DoctorRemoved { .. } => "doctor_removed",
        }
    }
}

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEvent {
    /// Position in the ledger, starting at 1.
    pub sequence: u64,
    pub kind: EventKind,
    /// Who performed the mutation.
    pub actor: Principal,
    /// Commit timestamp (microseconds since epoch).
    pub timestamp: u64,
    /// Hash of the preceding event, `None` for the first.
    pub previous_hash: Option<String>,
    /// SHA-256 over all fields above, hex encoded.
    pub event_hash: String,
}

impl RegistryEvent {
    /// Build an event and compute its hash.
    pub fn new(
        sequence: u64,
        kind: EventKind,
        actor: Principal,
        timestamp: u64,
        previous_hash: Option<String>,
    ) -> Self {
        let event_hash = compute_hash(sequence, &kind, &actor, timestamp, previous_hash.as_deref());
        Self {
            sequence,
            kind,
            actor,
            timestamp,
            previous_hash,
            event_hash,
        }
    }

    /// Recompute the hash from the fields and compare.
    pub fn hash_matches(&self) -> bool {
        compute_hash(
            self.sequence,
            &self.kind,
            &self.actor,
            self.timestamp,
            self.previous_hash.as_deref(),
        ) == self.event_hash
    }
}

fn compute_hash(
    sequence: u64,
    kind: &EventKind,
    actor: &Principal,
    timestamp: u64,
    previous_hash: Option<&str>,
) -> String {
    let hash_input = format!(
        "{}:{}:{}:{}:{}",
        sequence,
        serde_json::to_string(kind).unwrap_or_default(),
        actor,
        timestamp,
        previous_hash.unwrap_or(""),
    );
    hex::encode(Sha256::digest(hash_input.as_bytes()))
}
