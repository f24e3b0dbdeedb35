//! Outstanding request tracking keyed by correlation id.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use setdata_core::CorrelationId;

use crate::error::DuplicateCorrelation;

/// What an outstanding correlation id is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PendingOperation {
    /// The authorization request sent after token generation.
    AuthRequest,
    /// The business update request.
    BusinessRequest,
}

/// Maps correlation ids to the operation awaiting their response.
///
/// Matching is at-most-once: `resolve` removes the entry it returns. Backed
/// by `DashMap`, so it may be shared across tasks even though the router is
/// the only mutator in practice.
#[derive(Debug, Default)]
pub struct CorrelationRegistry {
    pending: DashMap<CorrelationId, PendingOperation>,
}

impl CorrelationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Records `id` as awaiting a response of kind `op`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateCorrelation` if `id` is already outstanding; the
    /// existing entry is left untouched.
    pub fn register(
        &self,
        id: CorrelationId,
        op: PendingOperation,
    ) -> Result<(), DuplicateCorrelation> {
        match self.pending.entry(id) {
            Entry::Occupied(_) => Err(DuplicateCorrelation(id)),
            Entry::Vacant(slot) => {
                slot.insert(op);
                tracing::debug!(correlation_id = %id, ?op, "registered pending operation");
                Ok(())
            }
        }
    }

    /// Removes and returns the operation waiting on `id`.
    pub fn resolve(&self, id: CorrelationId) -> Option<PendingOperation> {
        self.pending.remove(&id).map(|(_, op)| op)
    }

    /// Returns the operation waiting on `id` without consuming it.
    #[must_use]
    pub fn peek(&self, id: CorrelationId) -> Option<PendingOperation> {
        self.pending.get(&id).map(|entry| *entry.value())
    }

    #[must_use]
    pub fn contains(&self, id: CorrelationId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Whether any outstanding entry is of kind `op`.
    #[must_use]
    pub fn has_pending(&self, op: PendingOperation) -> bool {
        self.pending.iter().any(|entry| *entry.value() == op)
    }

    /// Drops every outstanding entry. Returns how many were abandoned.
    pub fn abandon_all(&self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
