//! Snapshot-based linear undo/redo over a bounded buffer

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::DiagramState;

/// Default number of snapshots kept before the oldest is evicted.
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

/// Immutable full copy of the graph taken after a committed edit.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: DiagramState,
    /// Name of the operation that produced this state.
    pub label: String,
    pub taken_at: DateTime<Utc>,
}

/// Linear history: `snapshots[index]` is the state currently shown.
#[derive(Debug)]
pub struct HistoryManager {
    snapshots: VecDeque<Snapshot>,
    index: usize,
    capacity: usize,
    restoring: bool,
}

impl HistoryManager {
    pub fn new(capacity: usize) -> Self {
        HistoryManager {
            snapshots: VecDeque::new(),
            index: 0,
            capacity: capacity.max(1),
            restoring: false,
        }
    }

    /// Record a new snapshot after the current one, discarding any redo
    /// branch. Suppressed while a restore is in progress; returns whether
    /// a snapshot was recorded.
    pub fn checkpoint(&mut self, state: DiagramState, label: impl Into<String>) -> bool {
        let label = label.into();
        if self.restoring {
            debug!("checkpoint `{}` suppressed during restore", label);
            return false;
        }
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.index + 1);
        }
        self.snapshots.push_back(Snapshot {
            state,
            label,
            taken_at: Utc::now(),
        });
        if self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
            debug!("history full at {}, evicted oldest snapshot", self.capacity);
        }
        self.index = self.snapshots.len() - 1;
        true
    }

    /// Step back one snapshot. `None` when already at the oldest state.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.snapshots.get(self.index)
    }

    /// Step forward one snapshot. `None` when at the newest state.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.snapshots.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        !self.snapshots.is_empty() && self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.snapshots.len()
    }

    /// Mark the start of a restore; checkpoints are ignored until
    /// [`HistoryManager::end_restore`].
    pub fn begin_restore(&mut self) {
        self.restoring = true;
    }

    pub fn end_restore(&mut self) {
        self.restoring = false;
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.index)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Labels of all retained snapshots, oldest first.
    pub fn labels(&self) -> Vec<&str> {
        self.snapshots.iter().map(|s| s.label.as_str()).collect()
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
