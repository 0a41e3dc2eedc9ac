//! Principals and the operations they ask for.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::identity::IdentityId;

/// An already-authenticated caller.
///
/// The registry never checks credentials; the transport layer hands over
/// a principal and the registry only checks that it still resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    Patient(IdentityId),
    Doctor(IdentityId),
    /// Deployment-defined administrator. Only honoured when the registry
    /// is configured with `admin_enabled`.
    Admin,
    /// A caller with no registry identity yet (e.g. signing up).
    Anonymous,
}

impl Principal {
    /// The identity id behind this principal, if it has one.
    pub fn id(&self) -> Option<&IdentityId> {
        match self {
            Principal::Patient(id) | Principal::Doctor(id) => Some(id),
            Principal::Admin | Principal::Anonymous => None,
        }
    }

    pub fn is_patient(&self, id: &IdentityId) -> bool {
        matches!(self, Principal::Patient(p) if p == id)
    }

    pub fn is_doctor(&self, id: &IdentityId) -> bool {
        matches!(self, Principal::Doctor(d) if d == id)
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Principal::Patient(id) => write!(f, "patient:{id}"),
            Principal::Doctor(id) => write!(f, "doctor:{id}"),
            Principal::Admin => f.write_str("admin"),
            Principal::Anonymous => f.write_str("anonymous"),
        }
    }
}

/// Parses `patient:<id>`, `doctor:<id>`, `admin`, or `anonymous`.
impl FromStr for Principal {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "admin" => return Ok(Principal::Admin),
            "anonymous" | "" => return Ok(Principal::Anonymous),
            _ => {}
        }
        let (kind, id) = s.split_once(':').ok_or_else(|| {
            RegistryError::InvalidInput(format!("unrecognized principal '{s}'"))
        })?;
        if id.is_empty() {
            return Err(RegistryError::InvalidInput(format!(
                "principal '{s}' is missing an id"
            )));
        }
        match kind {
            "patient" => Ok(Principal::Patient(IdentityId::from(id))),
            "doctor" => Ok(Principal::Doctor(IdentityId::from(id))),
            other => Err(RegistryError::InvalidInput(format!(
                "unknown principal kind '{other}'"
            ))),
        }
    }
}

/// An operation together with the record(s) it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a patient or doctor.
    RegisterIdentity,
    /// Read a patient's record.
    ReadPatient(IdentityId),
    /// Change a patient's name or age.
    UpdatePatient(IdentityId),
    /// Read a doctor's public record.
    ReadDoctor(IdentityId),
    /// Give, change, or revoke a doctor's access to a patient's record.
    ManageAccess {
        doctor: IdentityId,
        patient: IdentityId,
    },
    /// Deactivate a doctor.
    RemoveDoctor(IdentityId),
    /// Read the level one doctor holds on one patient.
    ReadGrant {
        doctor: IdentityId,
        patient: IdentityId,
    },
    /// Read the caller's own record.
    ShowProfile,
    /// List the doctors connected to the calling patient.
    ConnectedDoctors,
    /// List the patients connected to the calling doctor.
    ConnectedPatients,
    /// Read the full mutation ledger.
    ReadLedger,
    /// Export the whole registry state, patient records included.
    ExportState,
}

impl Operation {
    /// Short stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::RegisterIdentity => "register_identity",
            Operation::ReadPatient(_) => "read_patient",
            Operation::UpdatePatient(_) => "update_patient",
            Operation::ReadDoctor(_) => "read_doctor",
            Operation::ManageAccess { .. } => "manage_access",
            Operation::RemoveDoctor(_) => "remove_doctor",
            Operation::ReadGrant { .. } => "read_grant",
            Operation::ShowProfile => "show_profile",
            Operation::ConnectedDoctors => "connected_doctors",
            Operation::ConnectedPatients => "connected_patients",
            Operation::ReadLedger => "read_ledger",
            Operation::ExportState => "export_state",
        }
    }
}
