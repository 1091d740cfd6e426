//! # Document sessions
//!
//! The live, in-memory runtime state for one open document: the current item
//! snapshot (inside its [`Document`]), the selection set, and the
//! [`HistoryStack`]. One session per open document, created on open and
//! dropped on close: only the derived document and the serialized history
//! outlive it.

use crate::changes::{ChangeRecord, HistoryState};
use crate::errors::EditorError;
use crate::history::HistoryStack;
use chrono::Utc;
use montage_document::{Document, DocumentId, ItemId};
use std::collections::BTreeSet;

pub struct DocumentSession {
    document: Document,
    selected_ids: BTreeSet<ItemId>,
    history: HistoryStack,
}

impl DocumentSession {
    /// Open a document with a fresh empty history.
    pub fn new(document: Document) -> Self {
        Self::with_history(document, HistoryStack::new())
    }

    /// Open a document with a history loaded from the store.
    pub fn with_history(document: Document, history: HistoryStack) -> Self {
        Self {
            document,
            selected_ids: BTreeSet::new(),
            history,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn selected_ids(&self) -> &BTreeSet<ItemId> {
        &self.selected_ids
    }

    /// Snapshot the state a change operates over.
    pub fn state(&self) -> HistoryState {
        HistoryState::new(self.document.items.clone(), self.selected_ids.clone())
    }

    /// Validate and apply a change, recording it for undo.
    pub fn push_change(&mut self, change: ChangeRecord) -> Result<(), EditorError> {
        let current = self.state();
        change.validate(&current)?;
        let next = change.apply_forward(&current);
        self.history.push(change);
        self.adopt(next);
        Ok(())
    }

    /// Undo the most recent change. Returns whether anything happened.
    pub fn undo(&mut self) -> bool {
        let current = self.state();
        match self.history.undo(&current) {
            Some(next) => {
                self.adopt(next);
                true
            }
            None => false,
        }
    }

    /// Redo the most recently undone change. Returns whether anything
    /// happened.
    pub fn redo(&mut self) -> bool {
        let current = self.state();
        match self.history.redo(&current) {
            Some(next) => {
                self.adopt(next);
                true
            }
            None => false,
        }
    }

    /// Update the selection, recording a Selection change only when the set
    /// actually differs: no-op selections never pollute history. Returns
    /// whether a change was pushed.
    pub fn set_selection(&mut self, ids: BTreeSet<ItemId>) -> Result<bool, EditorError> {
        if ids == self.selected_ids {
            return Ok(false);
        }
        self.push_change(ChangeRecord::Selection {
            old_ids: self.selected_ids.clone(),
            new_ids: ids,
        })?;
        Ok(true)
    }

    /// Swap in authoritative remote state (conflict resolution via
    /// GetRemote). Selection is cleared; it referenced the old snapshot.
    pub fn replace(&mut self, document: Document, history: HistoryStack) {
        self.document = document;
        self.history = history;
        self.selected_ids.clear();
    }

    /// Copy this session under a new document identity: same items, cloned
    /// history, fresh timestamps. Used by the Fork conflict resolution.
    pub fn fork(&self, id: DocumentId, name: impl Into<String>) -> DocumentSession {
        let now = Utc::now();
        let mut document = self.document.clone();
        document.id = id;
        document.name = name.into();
        document.created_at = now;
        document.modified_at = now;
        DocumentSession {
            document,
            selected_ids: self.selected_ids.clone(),
            history: self.history.clone(),
        }
    }

    fn adopt(&mut self, state: HistoryState) {
        self.document.items = state.items;
        self.selected_ids = state.selected_ids;
        self.document.touch(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_document::{Item, ItemKind};

    fn session() -> DocumentSession {
        DocumentSession::new(Document::new(
            DocumentId::new("doc-1"),
            "Board",
            Utc::now(),
        ))
    }

    fn text_item(id: &str) -> Item {
        Item::new(
            ItemId::new(id),
            ItemKind::Text {
                text: id.to_string(),
            },
        )
    }

    #[test]
    fn push_undo_redo_single_add() {
        let mut session = session();
        let item = text_item("x");

        session
            .push_change(ChangeRecord::AddObject { item: item.clone() })
            .unwrap();
        assert_eq!(session.document().items, vec![item.clone()]);

        assert!(session.undo());
        assert!(session.document().items.is_empty());

        assert!(session.redo());
        assert_eq!(session.document().items, vec![item]);
    }

    #[test]
    fn undo_on_fresh_session_is_a_no_op() {
        let mut session = session();
        assert!(!session.undo());
        assert!(!session.redo());
    }

    #[test]
    fn noop_selection_stays_out_of_history() {
        let mut session = session();
        session
            .push_change(ChangeRecord::AddObject {
                item: text_item("a"),
            })
            .unwrap();

        let pushed = session.set_selection(BTreeSet::new()).unwrap();
        assert!(!pushed);
        assert_eq!(session.history().len(), 1);

        let pushed = session
            .set_selection([ItemId::new("a")].into_iter().collect())
            .unwrap();
        assert!(pushed);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn selection_undo_restores_previous_set() {
        let mut session = session();
        session
            .push_change(ChangeRecord::AddObject {
                item: text_item("a"),
            })
            .unwrap();
        session
            .set_selection([ItemId::new("a")].into_iter().collect())
            .unwrap();

        assert!(session.undo());
        assert!(session.selected_ids().is_empty());
        assert!(session.redo());
        assert!(session.selected_ids().contains(&ItemId::new("a")));
    }

    #[test]
    fn rejected_change_leaves_session_untouched() {
        let mut session = session();
        session
            .push_change(ChangeRecord::AddObject {
                item: text_item("a"),
            })
            .unwrap();

        let err = session.push_change(ChangeRecord::AddObject {
            item: text_item("a"),
        });
        assert!(err.is_err());
        assert_eq!(session.document().items.len(), 1);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn fork_copies_items_under_new_identity() {
        let mut session = session();
        session
            .push_change(ChangeRecord::AddObject {
                item: text_item("a"),
            })
            .unwrap();

        let fork = session.fork(DocumentId::new("doc-2"), "Board (fork)");
        assert_eq!(fork.document().id, DocumentId::new("doc-2"));
        assert_eq!(fork.document().items, session.document().items);
        assert_eq!(fork.history().len(), session.history().len());
    }
}
