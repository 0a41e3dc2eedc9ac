//! Access grants between doctors and patients.
//!
//! The access module provides:
//! - The ordered `AccessLevel` set
//! - `AccessGrant` records, one per (doctor, patient) pair
//! - `RelationshipGraph`, the grant set indexed in both directions

pub mod grant;
pub mod graph;
pub mod level;

pub use grant::AccessGrant;
pub use graph::RelationshipGraph;
pub use level::AccessLevel;
