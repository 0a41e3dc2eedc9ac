//! Mutation ledger.
//!
//! Every committed mutation appends one [`RegistryEvent`], chained to the
//! previous one by SHA-256. The chain lets an auditor detect removed,
//! reordered, or rewritten history in a persisted registry.

pub mod chain;
pub mod event;

pub use chain::{verify_chain, EventLedger};
pub use event::{EventKind, RegistryEvent};
