//! In-memory mirror of a remote collection
//!
//! Maps entity name to its current numeric value. The mirror is kept
//! consistent with a change feed purely by applying events in receipt
//! order, so its content is a function of the event history alone.
//!
//! Uses BTreeMap for deterministic iteration.

use std::collections::BTreeMap;

use tracing::warn;
use types::document::{ChangeKind, DocumentChange};
use types::numeric::Amount;

/// A single mirror mutation
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorEvent {
    /// Insert or overwrite the value for `id`
    Upsert { id: String, value: Amount },
    /// Delete `id`; a no-op when absent
    Remove { id: String },
}

impl MirrorEvent {
    /// Translate a feed change into a mirror event, reading the value from
    /// `field`. Missing or non-numeric values mirror as zero.
    pub fn from_change(change: &DocumentChange, field: &str) -> Self {
        match change.kind {
            ChangeKind::Added | ChangeKind::Modified => {
                let value = change.amount(field).unwrap_or_else(|| {
                    warn!(id = %change.id, field, "Document has no numeric value, mirroring as 0");
                    Amount::zero()
                });
                MirrorEvent::Upsert {
                    id: change.id.clone(),
                    value,
                }
            }
            ChangeKind::Removed => MirrorEvent::Remove {
                id: change.id.clone(),
            },
        }
    }
}

/// Name → value mirror, single writer
#[derive(Debug, Default, Clone)]
pub struct StateMirror {
    entries: BTreeMap<String, Amount>,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event atomically
    pub fn apply(&mut self, event: MirrorEvent) {
        match event {
            MirrorEvent::Upsert { id, value } => {
                self.entries.insert(id, value);
            }
            MirrorEvent::Remove { id } => {
                self.entries.remove(&id);
            }
        }
    }

    /// Apply a feed delivery in order. Returns the number of events applied.
    pub fn apply_batch<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = MirrorEvent>,
    {
        let mut applied = 0;
        for event in events {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Current content
    pub fn snapshot(&self) -> &BTreeMap<String, Amount> {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Amount> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}


// ── Property-Based Tests ────────────────────────────────────────────
