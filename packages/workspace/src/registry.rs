//! # Open-document arena
//!
//! One [`DocumentSession`] per open document, looked up by id. Opening and
//! closing are explicit: there is no other owner of live editing state.

use montage_document::DocumentId;
use montage_editor::DocumentSession;
use std::collections::HashMap;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<DocumentId, DocumentSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an opened session, replacing any previous session for the
    /// same document.
    pub fn open(&mut self, session: DocumentSession) {
        self.sessions
            .insert(session.document().id.clone(), session);
    }

    /// Close a document, returning its session for final inspection. The
    /// session (and its history) is gone after this: only the persisted
    /// document and serialized history outlive it.
    pub fn close(&mut self, id: &DocumentId) -> Option<DocumentSession> {
        self.sessions.remove(id)
    }

    pub fn get(&self, id: &DocumentId) -> Option<&DocumentSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &DocumentId) -> Option<&mut DocumentSession> {
        self.sessions.get_mut(id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.sessions.keys()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
