//! Cryptographic primitives for registry files at rest.
//!
//! This module provides:
//! - HKDF-SHA256 key separation
//! - Argon2id passphrase-based key derivation
//! - ChaCha20-Poly1305 authenticated encryption
//! - Cryptographically secure random bytes for salts, nonces, and ids

pub mod derivation;
pub mod encryption;
pub mod random;
