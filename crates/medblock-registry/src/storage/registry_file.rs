//! Registry file format: a JSON file holding one snapshot, optionally
//! encrypted.
//!
//! Plain file:
//! ```json
//! {
//!     "version": 1,
//!     "format": "medblock-v1",
//!     "revision": 7,
//!     "encryption": null,
//!     "state": { ... RegistrySnapshot ... },
//!     "encrypted_state": null
//! }
//! ```
//!
//! Encrypted file: `state` is null and `encrypted_state` holds the
//! base64 ChaCha20-Poly1305 ciphertext of the snapshot JSON, under a key
//! derived as `HKDF-SHA256(Argon2id(passphrase, salt), context)`. The
//! revision stays in plaintext so writers can check it without the key.
//! The salt is kept across writes by one backend; every write draws a
//! fresh nonce.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::{derivation, encryption};
use crate::error::{RegistryError, Result};

use super::backend::{check_revision, StateBackend};
use super::snapshot::{RegistrySnapshot, SNAPSHOT_VERSION};

// ── File format constants ─────────────────────────────────────────────────────

const FILE_VERSION: u32 = 1;
const FILE_FORMAT: &str = "medblock-v1";
const FILE_ALGORITHM: &str = "chacha20-poly1305";
const FILE_KDF: &str = "argon2id";

// ── On-disk structures ────────────────────────────────────────────────────────

/// Top-level structure written to disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryFile {
    /// Format version number.
    pub version: u32,
    /// Format identifier string.
    pub format: String,
    /// Revision of the contained snapshot.
    pub revision: u64,
    /// Encryption parameters, present iff the state is encrypted.
    pub encryption: Option<EncryptionMetadata>,
    /// Plaintext snapshot.
    pub state: Option<RegistrySnapshot>,
    /// Base64 ciphertext of the snapshot JSON.
    pub encrypted_state: Option<String>,
}

/// Encryption metadata stored alongside the ciphertext.
#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    /// Symmetric cipher used.
    pub algorithm: String,
    /// Key derivation function used.
    pub kdf: String,
    /// Base64-encoded Argon2id salt (16 bytes).
    pub salt: String,
    /// Base64-encoded ChaCha20-Poly1305 nonce (12 bytes).
    pub nonce: String,
}

/// Peek at only the format header of a registry file.
#[derive(Debug, Deserialize)]
struct RegistryFileHeader {
    version: u32,
    format: String,
    revision: u64,
}

// ── FileBackend ───────────────────────────────────────────────────────────────

/// State key derived from the passphrase, with the salt it came from.
#[derive(Clone)]
struct StateKey {
    salt: [u8; 16],
    key: Zeroizing<[u8; 32]>,
}

/// File-backed [`StateBackend`].
///
/// Writes are atomic (sibling temp file, then rename). There is no
/// cross-process lock; the revision check narrows lost updates to the
/// window between the check and the rename.
///
/// In encrypted mode Argon2id runs once per salt: the derived key is
/// cached after the first successful load or write.
pub struct FileBackend {
    path: PathBuf,
    passphrase: Option<Zeroizing<String>>,
    key_cache: Mutex<Option<StateKey>>,
}

impl FileBackend {
    /// Backend storing plaintext JSON at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            passphrase: None,
            key_cache: Mutex::new(None),
        }
    }

    /// Backend storing state encrypted under `passphrase`.
    pub fn encrypted(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: Some(Zeroizing::new(passphrase.into())),
            key_cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_encrypted(&self) -> bool {
        self.passphrase.is_some()
    }

    /// Revision recorded in the file header, or 0 if there is no file.
    pub fn stored_revision(&self) -> Result<u64> {
        if !self.path.exists() {
            return Ok(0);
        }
        let bytes = std::fs::read(&self.path)?;
        let header: RegistryFileHeader = serde_json::from_slice(&bytes).map_err(|e| {
            RegistryError::InvalidFileFormat(format!(
                "failed to parse registry header {}: {e}",
                self.path.display()
            ))
        })?;
        check_header(header.version, &header.format)?;
        Ok(header.revision)
    }

    fn encode(&self, snapshot: &RegistrySnapshot) -> Result<RegistryFile> {
        let Some(passphrase) = &self.passphrase else {
            return Ok(RegistryFile {
                version: FILE_VERSION,
                format: FILE_FORMAT.to_string(),
                revision: snapshot.revision,
                encryption: None,
                state: Some(snapshot.clone()),
                encrypted_state: None,
            });
        };

        let mut plaintext = serde_json::to_vec(snapshot)
            .map_err(|e| RegistryError::SerializationError(e.to_string()))?;

        let state_key = self.state_key(passphrase, None)?;
        let salt = state_key.salt;
        let sealed = encryption::encrypt(&state_key.key, &plaintext);
        plaintext.zeroize();
        let (nonce, ciphertext) = sealed?;
        self.remember(state_key)?;

        Ok(RegistryFile {
            version: FILE_VERSION,
            format: FILE_FORMAT.to_string(),
            revision: snapshot.revision,
            encryption: Some(EncryptionMetadata {
                algorithm: FILE_ALGORITHM.to_string(),
                kdf: FILE_KDF.to_string(),
                salt: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, salt),
                nonce: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &nonce),
            }),
            state: None,
            encrypted_state: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                &ciphertext,
            )),
        })
    }

    fn decode(&self, file: RegistryFile) -> Result<RegistrySnapshot> {
        check_header(file.version, &file.format)?;

        let snapshot = match (file.encryption, file.state, file.encrypted_state) {
            (None, Some(state), None) => {
                if self.passphrase.is_some() {
                    log::warn!(
                        "registry file {} is not encrypted; it will be encrypted on next write",
                        self.path.display()
                    );
                }
                state
            }
            (Some(meta), None, Some(encrypted)) => {
                let passphrase = self.passphrase.as_ref().ok_or(RegistryError::InvalidPassphrase)?;
                if meta.algorithm != FILE_ALGORITHM || meta.kdf != FILE_KDF {
                    return Err(RegistryError::InvalidFileFormat(format!(
                        "unsupported encryption {} / {}",
                        meta.algorithm, meta.kdf
                    )));
                }
                let salt: [u8; 16] = decode_b64(&meta.salt, "salt")?
                    .try_into()
                    .map_err(|_| RegistryError::InvalidFileFormat("salt must be 16 bytes".into()))?;
                let nonce = decode_b64(&meta.nonce, "nonce")?;
                let ciphertext = decode_b64(&encrypted, "ciphertext")?;

                let state_key = self.state_key(passphrase, Some(salt))?;
                let mut plaintext = encryption::decrypt(&state_key.key, &nonce, &ciphertext)?;
                self.remember(state_key)?;

                let parsed = serde_json::from_slice::<RegistrySnapshot>(&plaintext)
                    .map_err(|e| RegistryError::SerializationError(format!("snapshot: {e}")));
                plaintext.zeroize();
                parsed?
            }
            _ => {
                return Err(RegistryError::InvalidFileFormat(
                    "registry file must carry exactly one of state or encrypted_state".into(),
                ))
            }
        };

        if snapshot.revision != file.revision {
            return Err(RegistryError::InvalidFileFormat(format!(
                "header revision {} does not match state revision {}",
                file.revision, snapshot.revision
            )));
        }
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RegistryError::InvalidFileFormat(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    /// Key for `salt`, or for the cached salt (a fresh one if nothing is
    /// cached yet) when `salt` is `None`.
    fn state_key(&self, passphrase: &str, salt: Option<[u8; 16]>) -> Result<StateKey> {
        if let Some(cached) = self.lock_cache()?.as_ref() {
            if salt.map_or(true, |s| s == cached.salt) {
                return Ok(cached.clone());
            }
        }
        let salt = salt.unwrap_or_else(crate::crypto::random::random_salt_16);
        let key = Zeroizing::new(derive_state_key(passphrase, &salt)?);
        log::debug!("derived state key for {}", self.path.display());
        Ok(StateKey { salt, key })
    }

    /// Cache a key that has just opened or sealed the file.
    fn remember(&self, key: StateKey) -> Result<()> {
        *self.lock_cache()? = Some(key);
        Ok(())
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, Option<StateKey>>> {
        self.key_cache
            .lock()
            .map_err(|_| RegistryError::StorageError("state key cache lock poisoned".into()))
    }
}

impl StateBackend for FileBackend {
    fn load(&self) -> Result<Option<RegistrySnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path)?;
        let file: RegistryFile = serde_json::from_slice(&bytes).map_err(|e| {
            RegistryError::InvalidFileFormat(format!(
                "failed to parse registry file {}: {e}",
                self.path.display()
            ))
        })?;
        self.decode(file).map(Some)
    }

    fn persist(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        check_revision(self.stored_revision()?, snapshot.revision)?;

        let file = self.encode(snapshot)?;
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| RegistryError::SerializationError(e.to_string()))?;
        write_atomic(&self.path, json.as_bytes())
    }

    fn describe(&self) -> String {
        format!(
            "file:{}{}",
            self.path.display(),
            if self.is_encrypted() { " (encrypted)" } else { "" }
        )
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn check_header(version: u32, format: &str) -> Result<()> {
    if version != FILE_VERSION || format != FILE_FORMAT {
        return Err(RegistryError::InvalidFileFormat(format!(
            "unsupported registry file version={version} format={format}"
        )));
    }
    Ok(())
}

/// passphrase → Argon2id(passphrase, salt) → HKDF(master, context) → key
fn derive_state_key(passphrase: &str, salt: &[u8; 16]) -> Result<[u8; 32]> {
    let mut master = encryption::derive_passphrase_key(passphrase.as_bytes(), salt)?;
    let key = derivation::derive_key(&master, &derivation::state_encryption_context());
    master.zeroize();
    key
}

fn decode_b64(value: &str, what: &str) -> Result<Vec<u8>> {
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, value)
        .map_err(|e| RegistryError::InvalidFileFormat(format!("invalid {what} base64: {e}")))
}

/// Write `data` to `path` atomically using a sibling temporary file.
///
/// Creates the parent directory if it does not exist.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("medblock.tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
