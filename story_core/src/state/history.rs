//! Bounded undo/redo history of state snapshots.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::SystemTime;
use story_expr::StateStore;
use uuid::Uuid;

/// Unique identifier for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub Uuid);

impl SnapshotId {
    /// Create a new random snapshot ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A frozen copy of the store plus the passage it belongs to.
///
/// Copying is cheap: top-level variables are shared with the live store
/// until one side writes to them.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub state: StateStore,
    pub passage: Option<String>,
    pub timestamp: SystemTime,
}

impl Snapshot {
    pub fn new(state: StateStore, passage: Option<String>) -> Self {
        Self {
            id: SnapshotId::new(),
            state,
            passage,
            timestamp: SystemTime::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct History {
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
    max: usize,
}

impl History {
    pub fn new(max: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            max: max.max(1),
        }
    }

    pub fn push_undo(&mut self, snapshot: Snapshot) {
        push_bounded(&mut self.undo, snapshot, self.max);
    }

    pub fn push_redo(&mut self, snapshot: Snapshot) {
        push_bounded(&mut self.redo, snapshot, self.max);
    }

    pub fn pop_undo(&mut self) -> Option<Snapshot> {
        self.undo.pop_back()
    }

    pub fn pop_redo(&mut self) -> Option<Snapshot> {
        self.redo.pop_back()
    }

    pub fn clear_redo(&mut self) {
        self.redo.clear();
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
}

fn push_bounded(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, max: usize) {
    stack.push_back(snapshot);
    while stack.len() > max {
        stack.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(passage: &str) -> Snapshot {
        Snapshot::new(StateStore::new(), Some(passage.to_string()))
    }

    #[test]
    fn test_bounded_drops_oldest() {
        let mut history = History::new(2);
        history.push_undo(snap("a"));
        history.push_undo(snap("b"));
        history.push_undo(snap("c"));

        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.pop_undo().unwrap().passage.as_deref(), Some("c"));
        assert_eq!(history.pop_undo().unwrap().passage.as_deref(), Some("b"));
        assert!(history.pop_undo().is_none());
    }

    #[test]
    fn test_snapshot_ids_are_unique() {
        assert_ne!(snap("a").id, snap("a").id);
    }
}
