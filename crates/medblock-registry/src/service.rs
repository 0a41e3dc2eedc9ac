//! Registry service: the public operation set.
//!
//! Every call runs as one atomic unit: resolve the caller, authorize,
//! then read or mutate. Mutations hold the single writer lock for their
//! whole duration and apply in place. Each one validates before it writes
//! and hands back an [`Undo`] record; if the backend refuses the commit
//! the record is replayed, so a failure at any step leaves the state as
//! it was.
//!
//! Reads share the lock and always see one consistent snapshot of both
//! grant indexes.

use std::collections::BTreeSet;
use std::sync::RwLock;

use crate::access::{AccessGrant, AccessLevel, RelationshipGraph};
use crate::authz::{AccessController, Decision, Operation, Principal};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::identity::{
    DoctorRecord, Identity, IdentityId, IdentityKind, IdentityStore, PatientRecord,
};
use crate::ledger::{verify_chain, EventKind, EventLedger, RegistryEvent};
use crate::storage::{RegistrySnapshot, StateBackend, SNAPSHOT_VERSION};

/// Combined registry state guarded by the service lock.
#[derive(Debug)]
struct RegistryState {
    identities: IdentityStore,
    graph: RelationshipGraph,
    ledger: EventLedger,
    revision: u64,
}

impl RegistryState {
    fn empty(config: &RegistryConfig) -> Self {
        Self {
            identities: IdentityStore::with_max_name_len(config.max_name_len),
            graph: RelationshipGraph::new(),
            ledger: EventLedger::new(),
            revision: 0,
        }
    }

    fn from_snapshot(snapshot: RegistrySnapshot, config: &RegistryConfig) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RegistryError::InvalidFileFormat(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if config.verify_ledger_on_open {
            verify_chain(&snapshot.events)?;
        }

        let identities = IdentityStore::from_records(
            snapshot.patients,
            snapshot.doctors,
            snapshot.next_sequence,
            config.max_name_len,
        )?;
        let graph = RelationshipGraph::from_grants(snapshot.grants)?;

        for grant in graph.grants() {
            if !identities.exists(&grant.doctor_id, IdentityKind::Doctor)
                || !identities.exists(&grant.patient_id, IdentityKind::Patient)
            {
                return Err(RegistryError::InvalidFileFormat(format!(
                    "grant {} -> {} references an unknown or inactive identity",
                    grant.doctor_id, grant.patient_id
                )));
            }
        }
        graph.check_consistency()?;

        Ok(Self {
            identities,
            graph,
            ledger: EventLedger::from_events(snapshot.events),
            revision: snapshot.revision,
        })
    }

    fn snapshot(&self) -> RegistrySnapshot {
        let mut snapshot = RegistrySnapshot {
            version: SNAPSHOT_VERSION,
            revision: self.revision,
            next_sequence: self.identities.next_sequence(),
            patients: self.identities.patients().cloned().collect(),
            doctors: self.identities.doctors().cloned().collect(),
            grants: self.graph.grants().cloned().collect(),
            events: self.ledger.events().to_vec(),
        };
        snapshot.normalize();
        snapshot
    }
}

/// How to take back a mutation already applied to the live state.
#[derive(Debug)]
enum Undo {
    /// Drop a newly added identity.
    Forget(IdentityId),
    /// Put a patient record back as it was.
    RestorePatient(PatientRecord),
    /// Put back the grant a pair held before, or remove it if it had none.
    RestoreGrant {
        doctor: IdentityId,
        patient: IdentityId,
        previous: Option<AccessGrant>,
    },
    /// Reactivate a removed doctor along with its dropped grants.
    ReinstateDoctor {
        doctor: IdentityId,
        grants: Vec<AccessGrant>,
    },
}

impl Undo {
    fn apply(self, state: &mut RegistryState) {
        match self {
            Undo::Forget(id) => state.identities.forget(&id),
            Undo::RestorePatient(record) => state.identities.restore_patient(record),
            Undo::RestoreGrant {
                doctor,
                patient,
                previous,
            } => match previous {
                Some(grant) => state.graph.restore_grant(grant),
                None => {
                    state.graph.remove_grant(&doctor, &patient);
                }
            },
            Undo::ReinstateDoctor { doctor, grants } => {
                state.identities.reactivate_doctor(&doctor);
                for grant in grants {
                    state.graph.restore_grant(grant);
                }
            }
        }
    }
}

/// A mutation that changed something: the event to record and its undo.
struct Change {
    event: EventKind,
    undo: Undo,
}

fn changed<T>(value: T, event: EventKind, undo: Undo) -> Result<(T, Option<Change>)> {
    Ok((value, Some(Change { event, undo })))
}

/// Non-sensitive registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub patients: usize,
    pub active_doctors: usize,
    pub grants: usize,
    pub events: usize,
    pub revision: u64,
}

/// The registry's public operation set.
pub struct RegistryService {
    config: RegistryConfig,
    controller: AccessController,
    state: RwLock<RegistryState>,
    /// `None` for a registry that lives in memory only; commits then skip
    /// snapshot building entirely.
    backend: Option<Box<dyn StateBackend>>,
}

impl RegistryService {
    /// Create an empty registry that is never persisted.
    pub fn new(config: RegistryConfig) -> Self {
        let controller = AccessController::new(&config);
        let state = RegistryState::empty(&config);
        Self {
            config,
            controller,
            state: RwLock::new(state),
            backend: None,
        }
    }

    /// Open a registry over `backend`, restoring whatever it holds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a bad config, `InvalidLedger` if the
    /// stored ledger does not verify (when `verify_ledger_on_open` is set),
    /// `InvalidFileFormat` / `Conflict` if the stored state is internally
    /// inconsistent, or any backend error.
    pub fn open(config: RegistryConfig, backend: Box<dyn StateBackend>) -> Result<Self> {
        config.validate()?;
        let state = match backend.load()? {
            Some(snapshot) => RegistryState::from_snapshot(snapshot, &config)?,
            None => RegistryState::empty(&config),
        };
        log::info!(
            "opened registry from {} at revision {} ({} patients, {} grants)",
            backend.describe(),
            state.revision,
            state.identities.patient_count(),
            state.graph.len()
        );
        Ok(Self {
            controller: AccessController::new(&config),
            config,
            state: RwLock::new(state),
            backend: Some(backend),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ── Identity creation ─────────────────────────────────────────────────────

    /// Register a patient and return the new id.
    pub fn add_patient(&self, caller: &Principal, name: &str, age: i64) -> Result<IdentityId> {
        self.mutate(caller, |state| {
            self.authorize(state, caller, &Operation::RegisterIdentity)?;
            let id = state.identities.add_patient(name, age)?;
            let event = EventKind::PatientAdded {
                patient: id.clone(),
            };
            let undo = Undo::Forget(id.clone());
            changed(id, event, undo)
        })
    }

    /// Register a doctor and return the new id.
    pub fn add_doctor(&self, caller: &Principal, name: &str) -> Result<IdentityId> {
        self.mutate(caller, |state| {
            self.authorize(state, caller, &Operation::RegisterIdentity)?;
            let id = state.identities.add_doctor(name)?;
            let event = EventKind::DoctorAdded { doctor: id.clone() };
            let undo = Undo::Forget(id.clone());
            changed(id, event, undo)
        })
    }

    // ── Access grants ─────────────────────────────────────────────────────────

    /// Give `doctor` access to `patient`'s record at `level`.
    ///
    /// Giving access to a pair that already has a grant replaces the level,
    /// exactly like [`change_access`](Self::change_access).
    pub fn give_access(
        &self,
        caller: &Principal,
        doctor: &IdentityId,
        patient: &IdentityId,
        level: AccessLevel,
    ) -> Result<()> {
        self.set_access(caller, doctor, patient, level)
    }

    /// Change the level `doctor` holds on `patient`. `AccessLevel::None`
    /// revokes.
    pub fn change_access(
        &self,
        caller: &Principal,
        doctor: &IdentityId,
        patient: &IdentityId,
        level: AccessLevel,
    ) -> Result<()> {
        self.set_access(caller, doctor, patient, level)
    }

    /// Revoke `doctor`'s access to `patient`. Revoking a grant that does not
    /// exist succeeds and returns `false`.
    pub fn revoke_access(
        &self,
        caller: &Principal,
        doctor: &IdentityId,
        patient: &IdentityId,
    ) -> Result<bool> {
        self.mutate(caller, |state| {
            self.authorize(state, caller, &manage(doctor, patient))?;
            let Some(grant) = state.graph.grant(doctor, patient).cloned() else {
                return Ok((false, None));
            };
            state.graph.remove_grant(doctor, patient);
            let event = EventKind::AccessRevoked {
                doctor: doctor.clone(),
                patient: patient.clone(),
                previous: grant.level,
            };
            let undo = Undo::RestoreGrant {
                doctor: doctor.clone(),
                patient: patient.clone(),
                previous: Some(grant),
            };
            changed(true, event, undo)
        })
    }

    fn set_access(
        &self,
        caller: &Principal,
        doctor: &IdentityId,
        patient: &IdentityId,
        level: AccessLevel,
    ) -> Result<()> {
        self.mutate(caller, |state| {
            self.authorize(state, caller, &manage(doctor, patient))?;
            let before = state.graph.grant(doctor, patient).cloned();
            if before.as_ref().map_or(AccessLevel::None, |g| g.level) == level {
                return Ok(((), None));
            }
            let previous = state
                .graph
                .upsert_grant(&state.identities, doctor, patient, level)?;
            let event = if level == AccessLevel::None {
                EventKind::AccessRevoked {
                    doctor: doctor.clone(),
                    patient: patient.clone(),
                    previous,
                }
            } else {
                EventKind::AccessSet {
                    doctor: doctor.clone(),
                    patient: patient.clone(),
                    previous,
                    level,
                }
            };
            let undo = Undo::RestoreGrant {
                doctor: doctor.clone(),
                patient: patient.clone(),
                previous: before,
            };
            changed((), event, undo)
        })
    }

    /// Deactivate `doctor`, dropping every grant it holds in the same step.
    pub fn remove_doctor(&self, caller: &Principal, doctor: &IdentityId) -> Result<()> {
        self.mutate(caller, |state| {
            self.authorize(state, caller, &Operation::RemoveDoctor(doctor.clone()))?;
            let grants: Vec<AccessGrant> = state
                .graph
                .patients_of(doctor)
                .iter()
                .filter_map(|patient| state.graph.grant(doctor, patient).cloned())
                .collect();
            state.identities.remove_doctor(doctor)?;
            let dropped = state.graph.remove_all_grants_for_doctor(doctor);
            let event = EventKind::DoctorRemoved {
                doctor: doctor.clone(),
                dropped_grants: dropped,
            };
            let undo = Undo::ReinstateDoctor {
                doctor: doctor.clone(),
                grants,
            };
            changed((), event, undo)
        })
    }

    // ── Records ───────────────────────────────────────────────────────────────

    /// Read a patient's full record.
    pub fn get_patient_data(
        &self,
        caller: &Principal,
        patient: &IdentityId,
    ) -> Result<PatientRecord> {
        self.read(|state| {
            self.authorize(state, caller, &Operation::ReadPatient(patient.clone()))?;
            state.identities.get_patient(patient).cloned()
        })
    }

    /// Update a patient's name and/or age.
    pub fn update_patient_data(
        &self,
        caller: &Principal,
        patient: &IdentityId,
        name: Option<&str>,
        age: Option<i64>,
    ) -> Result<PatientRecord> {
        self.mutate(caller, |state| {
            self.authorize(state, caller, &Operation::UpdatePatient(patient.clone()))?;
            let before = state.identities.get_patient(patient)?.clone();
            let record = state.identities.update_patient(patient, name, age)?;
            let event = EventKind::PatientUpdated {
                patient: patient.clone(),
            };
            changed(record, event, Undo::RestorePatient(before))
        })
    }

    /// Read a doctor's record.
    pub fn get_doctor_data(&self, caller: &Principal, doctor: &IdentityId) -> Result<DoctorRecord> {
        self.read(|state| {
            self.authorize(state, caller, &Operation::ReadDoctor(doctor.clone()))?;
            state.identities.get_doctor(doctor).cloned()
        })
    }

    /// The caller's own record.
    pub fn show_profile(&self, caller: &Principal) -> Result<Identity> {
        self.read(|state| {
            self.authorize(state, caller, &Operation::ShowProfile)?;
            let id = caller
                .id()
                .ok_or_else(|| RegistryError::Denied(format!("{caller} has no profile")))?;
            state.identities.get(id)
        })
    }

    // ── Dashboard ─────────────────────────────────────────────────────────────

    /// Level `doctor` holds on `patient`, visible to either party.
    pub fn access_level(
        &self,
        caller: &Principal,
        doctor: &IdentityId,
        patient: &IdentityId,
    ) -> Result<AccessLevel> {
        self.read(|state| {
            self.authorize(
                state,
                caller,
                &Operation::ReadGrant {
                    doctor: doctor.clone(),
                    patient: patient.clone(),
                },
            )?;
            Ok(state.graph.level_for(doctor, patient))
        })
    }

    /// Doctors holding a grant on the calling patient.
    pub fn connected_doctors(&self, caller: &Principal) -> Result<BTreeSet<IdentityId>> {
        self.read(|state| {
            self.authorize(state, caller, &Operation::ConnectedDoctors)?;
            let id = caller.id().ok_or_else(|| not_a_party(caller))?;
            Ok(state.graph.doctors_of(id))
        })
    }

    /// Patients on whom the calling doctor holds a grant.
    pub fn connected_patients(&self, caller: &Principal) -> Result<BTreeSet<IdentityId>> {
        self.read(|state| {
            self.authorize(state, caller, &Operation::ConnectedPatients)?;
            let id = caller.id().ok_or_else(|| not_a_party(caller))?;
            Ok(state.graph.patients_of(id))
        })
    }

    /// Number of doctors connected to the calling patient.
    pub fn doctors_connected(&self, caller: &Principal) -> Result<usize> {
        self.connected_doctors(caller).map(|set| set.len())
    }

    /// Number of patients connected to the calling doctor.
    pub fn patients_connected(&self, caller: &Principal) -> Result<usize> {
        self.connected_patients(caller).map(|set| set.len())
    }

    // ── Ledger and maintenance ────────────────────────────────────────────────

    /// Ledger events after sequence `after` (0 for all).
    pub fn events(&self, caller: &Principal, after: u64) -> Result<Vec<RegistryEvent>> {
        self.read(|state| {
            self.authorize(state, caller, &Operation::ReadLedger)?;
            Ok(state.ledger.since(after).to_vec())
        })
    }

    /// Verify the ledger hash chain.
    pub fn verify_ledger(&self) -> Result<()> {
        self.read(|state| state.ledger.verify())
    }

    /// Cross-validate both grant indexes against the grant set.
    pub fn check_consistency(&self) -> Result<()> {
        self.read(|state| state.graph.check_consistency())
    }

    /// Counters that reveal no record contents.
    pub fn stats(&self) -> Result<RegistryStats> {
        self.read(|state| {
            Ok(RegistryStats {
                patients: state.identities.patient_count(),
                active_doctors: state.identities.active_doctor_count(),
                grants: state.graph.len(),
                events: state.ledger.len(),
                revision: state.revision,
            })
        })
    }

    /// Full copy of the current state for backup and export. Carries
    /// patient data, so only an enabled administrator may take it.
    pub fn snapshot(&self, caller: &Principal) -> Result<RegistrySnapshot> {
        self.read(|state| {
            self.authorize(state, caller, &Operation::ExportState)?;
            log::info!("registry state exported by {caller} at revision {}", state.revision);
            Ok(state.snapshot())
        })
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn authorize(
        &self,
        state: &RegistryState,
        caller: &Principal,
        operation: &Operation,
    ) -> Result<()> {
        let decision =
            self.controller
                .authorize(&state.identities, &state.graph, caller, operation)?;
        if let Decision::Denied(reason) = &decision {
            log::debug!("denied {} for {caller}: {reason}", operation.name());
        }
        decision.into_result()
    }

    fn read<T>(&self, f: impl FnOnce(&RegistryState) -> Result<T>) -> Result<T> {
        let guard = self
            .state
            .read()
            .map_err(|_| RegistryError::Conflict("registry lock poisoned".into()))?;
        f(&guard)
    }

    /// Run `f` on the live state under the writer lock and commit.
    ///
    /// `f` returns its result plus the change it made; `None` means the
    /// call changed nothing and there is nothing to commit. `f` must not
    /// touch the state before its last fallible step.
    fn mutate<T>(
        &self,
        actor: &Principal,
        f: impl FnOnce(&mut RegistryState) -> Result<(T, Option<Change>)>,
    ) -> Result<T> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| RegistryError::Conflict("registry lock poisoned".into()))?;
        let state = &mut *guard;

        let (value, change) = f(state)?;
        let Some(Change { event, undo }) = change else {
            return Ok(value);
        };

        let tag = event.as_tag();
        state.ledger.append(event, actor.clone());
        state.revision += 1;

        if let Some(backend) = &self.backend {
            if let Err(e) = backend.persist(&state.snapshot()) {
                state.ledger.pop();
                state.revision -= 1;
                undo.apply(state);
                if matches!(e, RegistryError::Conflict(_)) {
                    log::warn!("{tag} by {actor} lost a write race: {e}");
                } else {
                    log::warn!("{tag} by {actor} rolled back: {e}");
                }
                return Err(e);
            }
        }

        log::info!("committed {tag} by {actor} at revision {}", state.revision);
        Ok(value)
    }
}

fn manage(doctor: &IdentityId, patient: &IdentityId) -> Operation {
    Operation::ManageAccess {
        doctor: doctor.clone(),
        patient: patient.clone(),
    }
}

fn not_a_party(caller: &Principal) -> RegistryError {
    RegistryError::Denied(format!("{caller} is not a registry identity"))
}
