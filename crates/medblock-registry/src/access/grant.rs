//! Access grants: one doctor→patient edge with a level.

use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;

use super::level::AccessLevel;

/// A stored access grant. At most one exists per (doctor, patient) pair,
/// and its level is never `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub doctor_id: IdentityId,
    pub patient_id: IdentityId,
    pub level: AccessLevel,
    /// When the pair was first granted (microseconds since epoch).
    pub granted_at: u64,
    /// When the level last changed.
    pub updated_at: u64,
}

impl AccessGrant {
    pub fn new(doctor_id: IdentityId, patient_id: IdentityId, level: AccessLevel) -> Self {
        let now = crate::time::now_micros();
        Self {
            doctor_id,
            patient_id,
            level,
            granted_at: now,
            updated_at: now,
        }
    }

    /// The (doctor, patient) key this grant is stored under.
    pub fn key(&self) -> (IdentityId, IdentityId) {
        (self.doctor_id.clone(), self.patient_id.clone())
    }
}
