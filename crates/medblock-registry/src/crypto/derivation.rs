//! Key separation using HKDF-SHA256.
//!
//! The Argon2id output is never used directly as a cipher key; it is
//! expanded under a purpose string so that one passphrase can protect
//! several independent blobs.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{RegistryError, Result};

/// Derive a 32-byte child key from a root key and context string.
///
/// Uses HKDF-SHA256 (RFC 5869) with the root key as IKM and
/// the context as info.
pub fn derive_key(root_key_bytes: &[u8; 32], context: &str) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, root_key_bytes);
    let mut output = [0u8; 32];
    hk.expand(context.as_bytes(), &mut output)
        .map_err(|e| RegistryError::DerivationFailed(format!("HKDF expand failed: {e}")))?;
    Ok(output)
}

/// Context string for the registry state encryption key.
pub fn state_encryption_context() -> String {
    "medblock-registry/state-encryption".to_string()
}
