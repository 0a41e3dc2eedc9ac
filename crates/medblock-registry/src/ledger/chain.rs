//! The append-only event ledger and its chain verification.

use crate::authz::Principal;
use crate::error::{RegistryError, Result};

use super::event::{EventKind, RegistryEvent};

/// Ordered, hash-chained list of registry events.
#[derive(Debug, Clone, Default)]
pub struct EventLedger {
    events: Vec<RegistryEvent>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt persisted events without checking them. Call
    /// [`verify_chain`] first if the source is untrusted.
    pub fn from_events(events: Vec<RegistryEvent>) -> Self {
        Self { events }
    }

    /// Append a new event chained to the current head.
    pub fn append(&mut self, kind: EventKind, actor: Principal) -> &RegistryEvent {
        let sequence = self.events.len() as u64 + 1;
        let previous_hash = self.head_hash().map(str::to_string);
        let event = RegistryEvent::new(
            sequence,
            kind,
            actor,
            crate::time::now_micros(),
            previous_hash,
        );
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    /// Hash of the newest event.
    pub fn head_hash(&self) -> Option<&str> {
        self.events.last().map(|e| e.event_hash.as_str())
    }

    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    /// Events with a sequence number strictly greater than `after`.
    pub fn since(&self, after: u64) -> &[RegistryEvent] {
        let start = usize::try_from(after)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        &self.events[start..]
    }

    /// Drop the newest event. Used to undo an append whose commit failed.
    pub(crate) fn pop(&mut self) -> Option<RegistryEvent> {
        self.events.pop()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Verify this ledger's chain.
    pub fn verify(&self) -> Result<()> {
        verify_chain(&self.events)
    }
}

/// Verify a full chain of events (ordered oldest first).
///
/// Checks that sequence numbers run 1, 2, 3, …, that every event's hash
/// matches its contents, and that each event links to its predecessor.
///
/// # Errors
///
/// Returns `InvalidLedger` naming the first bad sequence number.
pub fn verify_chain(events: &[RegistryEvent]) -> Result<()> {
    let mut previous: Option<&str> = None;
    for (i, event) in events.iter().enumerate() {
        let expected_sequence = i as u64 + 1;
        if event.sequence != expected_sequence {
            return Err(RegistryError::InvalidLedger {
                sequence: event.sequence,
                reason: format!("expected sequence {expected_sequence}"),
            });
        }
        if !event.hash_matches() {
            return Err(RegistryError::InvalidLedger {
                sequence: event.sequence,
                reason: "hash does not match contents".into(),
            });
        }
        if event.previous_hash.as_deref() != previous {
            return Err(RegistryError::InvalidLedger {
                sequence: event.sequence,
                reason: "previous hash does not link to predecessor".into(),
            });
        }
        previous = Some(event.event_hash.as_str());
    }
    Ok(())
}
