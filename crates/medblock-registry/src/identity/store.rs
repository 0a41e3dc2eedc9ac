//! Identity store: patients and doctors keyed by registry-assigned id.
//!
//! The store never forgets an id. Doctor removal is a soft delete, and an
//! id is only handed out after checking it is not already reserved by
//! either kind.

use std::collections::HashMap;

use crate::crypto::random::random_bytes;
use crate::error::{RegistryError, Result};

use super::record::{
    validate_age, validate_name, DoctorRecord, Identity, IdentityId, IdentityKind, PatientRecord,
    DEFAULT_MAX_NAME_LEN,
};

/// In-memory store of identity records.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    patients: HashMap<IdentityId, PatientRecord>,
    doctors: HashMap<IdentityId, DoctorRecord>,
    /// Sequence number mixed into the next allocated id.
    next_sequence: u64,
    max_name_len: usize,
}

impl IdentityStore {
    /// Create an empty store with the default name limit.
    pub fn new() -> Self {
        Self::with_max_name_len(DEFAULT_MAX_NAME_LEN)
    }

    /// Create an empty store that rejects names longer than `max_name_len`.
    pub fn with_max_name_len(max_name_len: usize) -> Self {
        Self {
            patients: HashMap::new(),
            doctors: HashMap::new(),
            next_sequence: 0,
            max_name_len,
        }
    }

    /// Rebuild a store from persisted records.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFileFormat` if an id appears twice or its prefix
    /// disagrees with the record kind.
    pub fn from_records(
        patients: Vec<PatientRecord>,
        doctors: Vec<DoctorRecord>,
        next_sequence: u64,
        max_name_len: usize,
    ) -> Result<Self> {
        let mut store = Self::with_max_name_len(max_name_len);
        store.next_sequence = next_sequence;

        for patient in patients {
            if !patient.id.as_str().starts_with("pat_") || store.is_reserved(&patient.id) {
                return Err(RegistryError::InvalidFileFormat(format!(
                    "bad or duplicate patient id: {}",
                    patient.id
                )));
            }
            store.patients.insert(patient.id.clone(), patient);
        }
        for doctor in doctors {
            if !doctor.id.as_str().starts_with("doc_") || store.is_reserved(&doctor.id) {
                return Err(RegistryError::InvalidFileFormat(format!(
                    "bad or duplicate doctor id: {}",
                    doctor.id
                )));
            }
            store.doctors.insert(doctor.id.clone(), doctor);
        }
        Ok(store)
    }

    // ── Creation ──────────────────────────────────────────────────────────────

    /// Register a patient and return the fresh id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `name` is empty or too long, or `age` is
    /// negative.
    pub fn add_patient(&mut self, name: &str, age: i64) -> Result<IdentityId> {
        let name = validate_name(name, self.max_name_len)?;
        let age = validate_age(age)?;
        let id = self.allocate_id(IdentityKind::Patient);
        self.patients.insert(
            id.clone(),
            PatientRecord {
                id: id.clone(),
                name,
                age,
                created_at: crate::time::now_micros(),
            },
        );
        Ok(id)
    }

    /// Register a doctor and return the fresh id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `name` is empty or too long.
    pub fn add_doctor(&mut self, name: &str) -> Result<IdentityId> {
        let name = validate_name(name, self.max_name_len)?;
        let id = self.allocate_id(IdentityKind::Doctor);
        self.doctors.insert(
            id.clone(),
            DoctorRecord {
                id: id.clone(),
                name,
                active: true,
                created_at: crate::time::now_micros(),
                deactivated_at: None,
            },
        );
        Ok(id)
    }

    // ── Mutation ──────────────────────────────────────────────────────────────

    /// Mark a doctor inactive. The id remains reserved forever.
    ///
    /// Grant cleanup is the caller's job; the store only knows identities.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` unless `id` is an active doctor.
    pub fn remove_doctor(&mut self, id: &IdentityId) -> Result<()> {
        match self.doctors.get_mut(id) {
            Some(doctor) if doctor.active => {
                doctor.active = false;
                doctor.deactivated_at = Some(crate::time::now_micros());
                Ok(())
            }
            _ => Err(RegistryError::NotFound(format!("doctor {id}"))),
        }
    }

    /// Update a patient's name and/or age in place.
    ///
    /// Both values are validated before either is written.
    pub fn update_patient(
        &mut self,
        id: &IdentityId,
        name: Option<&str>,
        age: Option<i64>,
    ) -> Result<PatientRecord> {
        let name = name
            .map(|n| validate_name(n, self.max_name_len))
            .transpose()?;
        let age = age.map(validate_age).transpose()?;

        let patient = self
            .patients
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("patient {id}")))?;
        if let Some(name) = name {
            patient.name = name;
        }
        if let Some(age) = age {
            patient.age = age;
        }
        Ok(patient.clone())
    }

    // ── Rollback ──────────────────────────────────────────────────────────────

    /// Drop an identity added by a commit that failed to persist. The
    /// sequence counter is not rewound, so the id stays unused for good.
    pub(crate) fn forget(&mut self, id: &IdentityId) {
        self.patients.remove(id);
        self.doctors.remove(id);
    }

    /// Put back a patient record as it was before an update.
    pub(crate) fn restore_patient(&mut self, record: PatientRecord) {
        self.patients.insert(record.id.clone(), record);
    }

    /// Undo [`remove_doctor`](Self::remove_doctor).
    pub(crate) fn reactivate_doctor(&mut self, id: &IdentityId) {
        if let Some(doctor) = self.doctors.get_mut(id) {
            doctor.active = true;
            doctor.deactivated_at = None;
        }
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// Resolve an id to a visible identity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the id is unknown or belongs to an inactive
    /// doctor.
    pub fn get(&self, id: &IdentityId) -> Result<Identity> {
        if let Some(patient) = self.patients.get(id) {
            return Ok(Identity::Patient(patient.clone()));
        }
        match self.doctors.get(id) {
            Some(doctor) if doctor.active => Ok(Identity::Doctor(doctor.clone())),
            _ => Err(RegistryError::NotFound(format!("identity {id}"))),
        }
    }

    /// Look up a patient by id.
    pub fn get_patient(&self, id: &IdentityId) -> Result<&PatientRecord> {
        self.patients
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(format!("patient {id}")))
    }

    /// Look up an active doctor by id.
    pub fn get_doctor(&self, id: &IdentityId) -> Result<&DoctorRecord> {
        match self.doctors.get(id) {
            Some(doctor) if doctor.active => Ok(doctor),
            _ => Err(RegistryError::NotFound(format!("doctor {id}"))),
        }
    }

    /// Return `true` if `id` is an active identity of `kind`.
    pub fn exists(&self, id: &IdentityId, kind: IdentityKind) -> bool {
        match kind {
            IdentityKind::Patient => self.patients.contains_key(id),
            IdentityKind::Doctor => self.doctors.get(id).is_some_and(|d| d.active),
        }
    }

    /// Return `true` if `id` has ever been handed out, active or not.
    pub fn is_reserved(&self, id: &IdentityId) -> bool {
        self.patients.contains_key(id) || self.doctors.contains_key(id)
    }

    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    pub fn active_doctor_count(&self) -> usize {
        self.doctors.values().filter(|d| d.active).count()
    }

    /// All patient records, in no particular order.
    pub fn patients(&self) -> impl Iterator<Item = &PatientRecord> {
        self.patients.values()
    }

    /// All doctor records including inactive ones, in no particular order.
    pub fn doctors(&self) -> impl Iterator<Item = &DoctorRecord> {
        self.doctors.values()
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn allocate_id(&mut self, kind: IdentityKind) -> IdentityId {
        loop {
            self.next_sequence += 1;
            let entropy: [u8; 16] = random_bytes();
            let candidate = IdentityId::derive(kind, self.next_sequence, &entropy);
            if !self.is_reserved(&candidate) {
                return candidate;
            }
        }
    }
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}
