//! Access controller: decides whether a principal may perform an operation.
//!
//! Decisions are a pure function of the identity store, the relationship
//! graph, and two policy switches. Nothing is cached between calls, so a
//! grant change is visible to the very next decision.
//!
//! Evaluation order:
//! 1. Resolve the caller (unknown or inactive caller is `NotFound`)
//! 2. Resolve every target (missing or inactive target is `NotFound`)
//! 3. Refuse `Admin` on a registry without admins
//! 4. Apply the per-operation policy

use crate::access::RelationshipGraph;
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::identity::{IdentityId, IdentityKind, IdentityStore};

use super::principal::{Operation, Principal};

/// Outcome of an authorization check against existing targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Authorized,
    Denied(String),
}

impl Decision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Decision::Authorized)
    }

    /// Turn a denial into `RegistryError::Denied`.
    pub fn into_result(self) -> Result<()> {
        match self {
            Decision::Authorized => Ok(()),
            Decision::Denied(reason) => Err(RegistryError::Denied(reason)),
        }
    }
}

fn deny(reason: impl Into<String>) -> Decision {
    Decision::Denied(reason.into())
}

/// Stateless policy evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessController {
    admin_enabled: bool,
    open_registration: bool,
}

impl AccessController {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            admin_enabled: config.admin_enabled,
            open_registration: config.open_registration,
        }
    }

    /// Decide whether `principal` may perform `operation`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the caller or any target does not resolve to
    /// an active identity of the expected kind. Policy refusals are
    /// reported as `Ok(Decision::Denied(..))`.
    pub fn authorize(
        &self,
        identities: &IdentityStore,
        graph: &RelationshipGraph,
        principal: &Principal,
        operation: &Operation,
    ) -> Result<Decision> {
        self.resolve_caller(identities, principal)?;
        let decision = self.evaluate(identities, graph, principal, operation)?;

        if matches!(principal, Principal::Admin) && !self.admin_enabled {
            return Ok(deny(
                "administrative principals are disabled for this registry",
            ));
        }
        Ok(decision)
    }

    /// Per-operation policy. Targets are resolved inside each arm.
    fn evaluate(
        &self,
        identities: &IdentityStore,
        graph: &RelationshipGraph,
        principal: &Principal,
        operation: &Operation,
    ) -> Result<Decision> {
        let decision = match operation {
            Operation::RegisterIdentity => {
                if self.open_registration || matches!(principal, Principal::Admin) {
                    Decision::Authorized
                } else {
                    deny("registration is closed to non-administrators")
                }
            }

            Operation::ReadPatient(patient) => {
                require(identities, patient, IdentityKind::Patient)?;
                match principal {
                    Principal::Patient(id) if id == patient => Decision::Authorized,
                    Principal::Doctor(doctor) => {
                        if graph.level_for(doctor, patient).can_read() {
                            Decision::Authorized
                        } else {
                            deny(format!("doctor {doctor} has no read grant on {patient}"))
                        }
                    }
                    _ => deny(format!("{principal} may not read patient {patient}")),
                }
            }

            Operation::UpdatePatient(patient) => {
                require(identities, patient, IdentityKind::Patient)?;
                match principal {
                    Principal::Patient(id) if id == patient => Decision::Authorized,
                    Principal::Doctor(doctor) => {
                        if graph.level_for(doctor, patient).can_write() {
                            Decision::Authorized
                        } else {
                            deny(format!("doctor {doctor} has no write grant on {patient}"))
                        }
                    }
                    _ => deny(format!("{principal} may not modify patient {patient}")),
                }
            }

            Operation::ReadDoctor(doctor) => {
                require(identities, doctor, IdentityKind::Doctor)?;
                match principal {
                    Principal::Anonymous => deny("anonymous callers may not read doctor records"),
                    _ => Decision::Authorized,
                }
            }

            Operation::ManageAccess { doctor, patient } => {
                require(identities, doctor, IdentityKind::Doctor)?;
                require(identities, patient, IdentityKind::Patient)?;
                match principal {
                    Principal::Patient(id) if id == patient => Decision::Authorized,
                    Principal::Admin => Decision::Authorized,
                    Principal::Doctor(_) => deny("doctors may not manage access grants"),
                    _ => deny(format!(
                        "only patient {patient} may manage access to their record"
                    )),
                }
            }

            Operation::RemoveDoctor(doctor) => {
                require(identities, doctor, IdentityKind::Doctor)?;
                match principal {
                    Principal::Doctor(id) if id == doctor => Decision::Authorized,
                    Principal::Admin => Decision::Authorized,
                    _ => deny(format!("{principal} may not remove doctor {doctor}")),
                }
            }

            Operation::ReadGrant { doctor, patient } => {
                require(identities, doctor, IdentityKind::Doctor)?;
                require(identities, patient, IdentityKind::Patient)?;
                if principal.is_patient(patient)
                    || principal.is_doctor(doctor)
                    || matches!(principal, Principal::Admin)
                {
                    Decision::Authorized
                } else {
                    deny(format!(
                        "{principal} is not a party to the grant {doctor} -> {patient}"
                    ))
                }
            }

            Operation::ShowProfile => match principal {
                Principal::Patient(_) | Principal::Doctor(_) => Decision::Authorized,
                _ => deny(format!("{principal} has no profile")),
            },

            Operation::ConnectedDoctors => match principal {
                Principal::Patient(_) => Decision::Authorized,
                _ => deny("only patients have connected doctors"),
            },

            Operation::ConnectedPatients => match principal {
                Principal::Doctor(_) => Decision::Authorized,
                _ => deny("only doctors have connected patients"),
            },

            Operation::ReadLedger => match principal {
                Principal::Admin => Decision::Authorized,
                _ => deny("only administrators may read the ledger"),
            },

            Operation::ExportState => match principal {
                Principal::Admin => Decision::Authorized,
                _ => deny("only administrators may export registry state"),
            },
        };

        Ok(decision)
    }

    /// Check the caller still resolves to an active identity.
    fn resolve_caller(&self, identities: &IdentityStore, principal: &Principal) -> Result<()> {
        match principal {
            Principal::Patient(id) => require(identities, id, IdentityKind::Patient),
            Principal::Doctor(id) => require(identities, id, IdentityKind::Doctor),
            Principal::Admin | Principal::Anonymous => Ok(()),
        }
    }
}

fn require(identities: &IdentityStore, id: &IdentityId, kind: IdentityKind) -> Result<()> {
    if identities.exists(id, kind) {
        Ok(())
    } else {
        Err(RegistryError::NotFound(format!("{kind} {id}")))
    }
}
