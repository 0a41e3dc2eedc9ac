//! Authorization: who may do what to which record.
//!
//! - [`principal`]: authenticated callers and the operations they request.
//! - [`controller`]: the pure policy function over current state.

pub mod controller;
pub mod principal;

pub use controller::{AccessController, Decision};
pub use principal::{Operation, Principal};
