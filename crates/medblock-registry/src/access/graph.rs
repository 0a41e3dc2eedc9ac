//! Relationship graph: the access grant set and its two inverted indexes.
//!
//! Grants are held once, keyed by `(doctor, patient)`, with a
//! doctor→patients index and a patient→doctors index beside them. Every
//! insert and removal touches all three in the same call, so the indexes
//! can never disagree with the grant set as long as mutation goes through
//! this type.

use std::collections::{BTreeSet, HashMap};

use crate::error::{RegistryError, Result};
use crate::identity::{IdentityId, IdentityKind, IdentityStore};

use super::grant::AccessGrant;
use super::level::AccessLevel;

/// In-memory grant set with lookups in both directions.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    /// Primary store: (doctor, patient) → grant.
    grants: HashMap<(IdentityId, IdentityId), AccessGrant>,
    /// Secondary index: doctor → patients with a grant.
    by_doctor: HashMap<IdentityId, BTreeSet<IdentityId>>,
    /// Secondary index: patient → doctors with a grant.
    by_patient: HashMap<IdentityId, BTreeSet<IdentityId>>,
}

impl RelationshipGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from persisted grants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFileFormat` for a duplicate pair or a stored `None`
    /// level.
    pub fn from_grants(grants: Vec<AccessGrant>) -> Result<Self> {
        let mut graph = Self::new();
        for grant in grants {
            if grant.level == AccessLevel::None {
                return Err(RegistryError::InvalidFileFormat(format!(
                    "stored grant {} -> {} has level none",
                    grant.doctor_id, grant.patient_id
                )));
            }
            if graph.grants.contains_key(&grant.key()) {
                return Err(RegistryError::InvalidFileFormat(format!(
                    "duplicate grant {} -> {}",
                    grant.doctor_id, grant.patient_id
                )));
            }
            graph.insert(grant);
        }
        Ok(graph)
    }

    // ── Mutation ──────────────────────────────────────────────────────────────

    /// Create or replace the grant for `(doctor, patient)`.
    ///
    /// Setting `AccessLevel::None` removes the grant. Returns the level the
    /// pair had before the call.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `doctor` is not an active doctor or `patient`
    /// is not a patient in `identities`.
    pub fn upsert_grant(
        &mut self,
        identities: &IdentityStore,
        doctor: &IdentityId,
        patient: &IdentityId,
        level: AccessLevel,
    ) -> Result<AccessLevel> {
        if !identities.exists(doctor, IdentityKind::Doctor) {
            return Err(RegistryError::NotFound(format!("doctor {doctor}")));
        }
        if !identities.exists(patient, IdentityKind::Patient) {
            return Err(RegistryError::NotFound(format!("patient {patient}")));
        }

        let previous = self.level_for(doctor, patient);
        if level == AccessLevel::None {
            self.remove_grant(doctor, patient);
            return Ok(previous);
        }

        let key = (doctor.clone(), patient.clone());
        match self.grants.get_mut(&key) {
            Some(existing) => {
                existing.level = level;
                existing.updated_at = crate::time::now_micros();
            }
            None => self.insert(AccessGrant::new(doctor.clone(), patient.clone(), level)),
        }
        Ok(previous)
    }

    /// Remove the grant for `(doctor, patient)` if there is one.
    ///
    /// Idempotent: returns `false` when there was nothing to remove.
    pub fn remove_grant(&mut self, doctor: &IdentityId, patient: &IdentityId) -> bool {
        let key = (doctor.clone(), patient.clone());
        if self.grants.remove(&key).is_none() {
            return false;
        }
        detach(&mut self.by_doctor, doctor, patient);
        detach(&mut self.by_patient, patient, doctor);
        true
    }

    /// Remove every grant held by `doctor` from all indexes.
    ///
    /// Returns the patients whose grants were dropped.
    pub fn remove_all_grants_for_doctor(&mut self, doctor: &IdentityId) -> Vec<IdentityId> {
        let patients: Vec<IdentityId> = self
            .by_doctor
            .remove(doctor)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();

        for patient in &patients {
            self.grants.remove(&(doctor.clone(), patient.clone()));
            detach(&mut self.by_patient, patient, doctor);
        }
        patients
    }

    /// Put a grant back exactly as it was, replacing any grant for the
    /// same pair. Used to undo a commit that failed to persist.
    pub(crate) fn restore_grant(&mut self, grant: AccessGrant) {
        self.remove_grant(&grant.doctor_id, &grant.patient_id);
        self.insert(grant);
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// The level `doctor` holds on `patient`; `None` if there is no grant.
    pub fn level_for(&self, doctor: &IdentityId, patient: &IdentityId) -> AccessLevel {
        self.grants
            .get(&(doctor.clone(), patient.clone()))
            .map(|g| g.level)
            .unwrap_or(AccessLevel::None)
    }

    /// The stored grant for a pair, if any.
    pub fn grant(&self, doctor: &IdentityId, patient: &IdentityId) -> Option<&AccessGrant> {
        self.grants.get(&(doctor.clone(), patient.clone()))
    }

    /// Doctors holding any grant on `patient`.
    pub fn doctors_of(&self, patient: &IdentityId) -> BTreeSet<IdentityId> {
        self.by_patient.get(patient).cloned().unwrap_or_default()
    }

    /// Patients on whom `doctor` holds any grant.
    pub fn patients_of(&self, doctor: &IdentityId) -> BTreeSet<IdentityId> {
        self.by_doctor.get(doctor).cloned().unwrap_or_default()
    }

    /// Number of doctors connected to `patient`, read off the index.
    pub fn doctor_count(&self, patient: &IdentityId) -> usize {
        self.by_patient.get(patient).map_or(0, BTreeSet::len)
    }

    /// Number of patients connected to `doctor`, read off the index.
    pub fn patient_count(&self, doctor: &IdentityId) -> usize {
        self.by_doctor.get(doctor).map_or(0, BTreeSet::len)
    }

    /// All grants, in no particular order.
    pub fn grants(&self) -> impl Iterator<Item = &AccessGrant> {
        self.grants.values()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Cross-validate the grant set against both indexes.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` describing the first disagreement found.
    pub fn check_consistency(&self) -> Result<()> {
        let mut forward = 0usize;
        for (doctor, patients) in &self.by_doctor {
            if patients.is_empty() {
                return Err(RegistryError::Conflict(format!(
                    "empty patient set left for doctor {doctor}"
                )));
            }
            for patient in patients {
                forward += 1;
                if !self.grants.contains_key(&(doctor.clone(), patient.clone())) {
                    return Err(RegistryError::Conflict(format!(
                        "doctor index has {doctor} -> {patient} without a grant"
                    )));
                }
                let reverse_has = self
                    .by_patient
                    .get(patient)
                    .is_some_and(|doctors| doctors.contains(doctor));
                if !reverse_has {
                    return Err(RegistryError::Conflict(format!(
                        "patient index is missing {patient} <- {doctor}"
                    )));
                }
            }
        }

        let mut backward = 0usize;
        for (patient, doctors) in &self.by_patient {
            if doctors.is_empty() {
                return Err(RegistryError::Conflict(format!(
                    "empty doctor set left for patient {patient}"
                )));
            }
            backward += doctors.len();
        }

        if forward != backward || forward != self.grants.len() {
            return Err(RegistryError::Conflict(format!(
                "edge counts disagree: grants={}, by_doctor={forward}, by_patient={backward}",
                self.grants.len()
            )));
        }
        Ok(())
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn insert(&mut self, grant: AccessGrant) {
        let doctor = grant.doctor_id.clone();
        let patient = grant.patient_id.clone();
        self.by_doctor
            .entry(doctor.clone())
            .or_default()
            .insert(patient.clone());
        self.by_patient
            .entry(patient.clone())
            .or_default()
            .insert(doctor.clone());
        self.grants.insert((doctor, patient), grant);
    }
}

/// Drop `value` from `index[key]`, removing the set once it is empty.
fn detach(
    index: &mut HashMap<IdentityId, BTreeSet<IdentityId>>,
    key: &IdentityId,
    value: &IdentityId,
) {
    if let Some(set) = index.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            index.remove(key);
        }
    }
}
