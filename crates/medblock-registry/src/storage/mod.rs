//! Storage layer for registry state.
//!
//! The registry persists whole snapshots through a [`StateBackend`]:
//!
//! - [`snapshot`]: the persisted shape (identities, grants, ledger).
//! - [`backend`]: the backend trait, revision checking, and an in-memory
//!   backend.
//! - [`registry_file`]: a JSON file backend with optional passphrase
//!   encryption.
//!
//! By convention the CLI keeps its file at `~/.medblock/registry.json`.

pub mod backend;
pub mod registry_file;
pub mod snapshot;

pub use backend::{MemoryBackend, StateBackend};
pub use registry_file::{FileBackend, RegistryFile};
pub use snapshot::{RegistrySnapshot, SNAPSHOT_VERSION};
