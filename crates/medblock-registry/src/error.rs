//! Error types for the MedBlock registry.
//!
//! All errors are strongly typed and propagated without panicking.
//! Patient record contents and passphrases are never included in error
//! messages; only identifiers are.

/// Caller-facing classification of a [`RegistryError`].
///
/// A transport layer maps these to its own status codes. The core does
/// not define any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed name, age, or access level.
    InvalidInput,
    /// Identity or grant target does not exist or is inactive.
    NotFound,
    /// Authorization failed for an existing, valid target.
    Denied,
    /// Concurrent-mutation detection (stale revision, poisoned lock,
    /// diverged indexes).
    Conflict,
    /// Storage, serialization, or crypto failure below the registry.
    Internal,
}

/// Registry error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Denied(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid passphrase")]
    InvalidPassphrase,

    #[error("Invalid event ledger at sequence {sequence}: {reason}")]
    InvalidLedger { sequence: u64, reason: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Classify this error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::InvalidInput(_) => ErrorKind::InvalidInput,
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::Denied(_) => ErrorKind::Denied,
            RegistryError::Conflict(_) => ErrorKind::Conflict,
            RegistryError::DerivationFailed(_)
            | RegistryError::EncryptionFailed(_)
            | RegistryError::DecryptionFailed(_)
            | RegistryError::InvalidPassphrase
            | RegistryError::InvalidLedger { .. }
            | RegistryError::StorageError(_)
            | RegistryError::SerializationError(_)
            | RegistryError::InvalidFileFormat(_)
            | RegistryError::Io(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, RegistryError>;
