//! # Undo/redo log
//!
//! A cursor-addressed log of [`ChangeRecord`]s for one document.
//!
//! ## Design
//!
//! - One `Vec` plus a cursor, not two stacks: the done prefix sits left of
//!   the cursor, the redo tail right of it
//! - A push truncates the redo tail before appending: undone futures are
//!   discarded, never replayed out of order
//! - Undo/redo on an exhausted log is a guarded no-op (`None`), not an error
//! - `Clone` yields a structurally independent copy; the surrounding
//!   application may keep a prior instance for re-render comparisons
//! - The wire format is `{records, currentIndex}` with
//!   `-1 <= currentIndex < records.len()`, kept lossless in both directions

use crate::changes::{ChangeRecord, HistoryState};
use crate::errors::EditorError;
use serde::{Deserialize, Serialize};

/// Depth cap: pushing beyond this discards the oldest records. Long sessions
/// otherwise grow the log without bound.
pub const MAX_DEPTH: usize = 500;

/// The undo/redo log for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "HistoryStackWire", try_from = "HistoryStackWire")]
pub struct HistoryStack {
    records: Vec<ChangeRecord>,
    /// Count of applied records; the wire `currentIndex` is `applied - 1`.
    applied: usize,
    max_depth: usize,
}

impl HistoryStack {
    /// Create an empty stack with the default depth cap.
    pub fn new() -> Self {
        Self::with_max_depth(MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            records: Vec::new(),
            applied: 0,
            max_depth,
        }
    }

    /// Append a change that has already been applied to the live state.
    /// Discards any redo tail first.
    pub fn push(&mut self, change: ChangeRecord) {
        self.records.truncate(self.applied);
        self.records.push(change);
        self.applied = self.records.len();

        if self.max_depth > 0 && self.records.len() > self.max_depth {
            let overflow = self.records.len() - self.max_depth;
            self.records.drain(..overflow);
            self.applied -= overflow;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.records.len()
    }

    /// Step the cursor back and return the reversed state, or `None` when
    /// there is nothing to undo.
    pub fn undo(&mut self, current: &HistoryState) -> Option<HistoryState> {
        if !self.can_undo() {
            return None;
        }
        self.applied -= 1;
        Some(self.records[self.applied].apply_backward(current))
    }

    /// Re-apply the record just right of the cursor, or `None` when there is
    /// nothing to redo.
    pub fn redo(&mut self, current: &HistoryState) -> Option<HistoryState> {
        if !self.can_redo() {
            return None;
        }
        let next = self.records[self.applied].apply_forward(current);
        self.applied += 1;
        Some(next)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records left of the cursor.
    pub fn undo_depth(&self) -> usize {
        self.applied
    }

    /// Number of records right of the cursor.
    pub fn redo_depth(&self) -> usize {
        self.records.len() - self.applied
    }

    /// Deserialize a persisted stack, surfacing [`EditorError::CorruptHistory`]
    /// on malformed payloads so callers can fall back to an empty stack.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, EditorError> {
        serde_json::from_value(value.clone()).map_err(|e| EditorError::CorruptHistory(e.to_string()))
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire shape of a persisted stack: `{records, currentIndex}`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryStackWire {
    records: Vec<ChangeRecord>,
    current_index: i64,
}

impl From<HistoryStack> for HistoryStackWire {
    fn from(stack: HistoryStack) -> Self {
        Self {
            records: stack.records,
            current_index: stack.applied as i64 - 1,
        }
    }
}

impl TryFrom<HistoryStackWire> for HistoryStack {
    type Error = String;

    fn try_from(wire: HistoryStackWire) -> Result<Self, Self::Error> {
        let len = wire.records.len() as i64;
        if wire.current_index < -1 || wire.current_index >= len {
            return Err(format!(
                "currentIndex {} out of range for {} records",
                wire.current_index, len
            ));
        }
        Ok(Self {
            records: wire.records,
            applied: (wire.current_index + 1) as usize,
            max_depth: MAX_DEPTH,
        })
    }
}
