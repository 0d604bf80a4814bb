//! Operation queue
//!
//! FIFO collection of pending operations keyed by identity. All access goes
//! through one mutex; this is the only structure shared between submitters
//! and the execution loop.

use crate::errors::{CommandError, Result};
use crate::operation::OperationEntry;
use celbridge_core_types::OperationId;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct QueueState {
    entries: VecDeque<OperationEntry>,
    ids: HashSet<OperationId>,
}

impl QueueState {
    fn retain_entries<F>(&mut self, mut keep: F) -> Vec<OperationEntry>
    where
        F: FnMut(&OperationEntry) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if keep(&entry) {
                kept.push_back(entry);
            } else {
                self.ids.remove(entry.id());
                removed.push(entry);
            }
        }
        self.entries = kept;
        removed
    }
}

/// Thread-safe, identity-deduplicated FIFO of pending operations
#[derive(Default)]
pub struct OperationQueue {
    state: Mutex<QueueState>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        // Nothing panics while holding the lock, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::DuplicateOperation`] if an entry with the same
    /// identity is already queued. The queued entry is left untouched and the
    /// rejected one is dropped.
    pub fn push_back(&self, entry: OperationEntry) -> Result<()> {
        let mut state = self.state();
        if state.ids.contains(entry.id()) {
            return Err(CommandError::DuplicateOperation {
                operation_id: entry.id().clone(),
            });
        }
        state.ids.insert(entry.id().clone());
        state.entries.push_back(entry);
        Ok(())
    }

    /// Remove and return the head entry, if any
    pub fn pop_front(&self) -> Option<OperationEntry> {
        let mut state = self.state();
        let entry = state.entries.pop_front()?;
        state.ids.remove(entry.id());
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    pub fn contains(&self, id: &OperationId) -> bool {
        self.state().ids.contains(id)
    }

    /// Identities in execution order
    pub fn ids(&self) -> Vec<OperationId> {
        self.state().entries.iter().map(|e| e.id().clone()).collect()
    }

    pub fn contains_kind(&self, kind: &str) -> bool {
        self.state().entries.iter().any(|e| e.kind() == kind)
    }

    /// Remove every queued entry of `kind`, preserving the order of the rest
    ///
    /// Returned entries have not executed; dropping them cancels any waiting
    /// callers.
    pub fn remove_kind(&self, kind: &str) -> Vec<OperationEntry> {
        self.state().retain_entries(|e| e.kind() != kind)
    }

    /// Remove everything
    pub fn clear(&self) -> Vec<OperationEntry> {
        let mut state = self.state();
        state.ids.clear();
        state.entries.drain(..).collect()
    }
}

impl std::fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationQueue")
            .field("len", &self.len())
            .finish()
    }
}
