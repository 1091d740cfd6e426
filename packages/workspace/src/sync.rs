//! # Scene synchronization
//!
//! Debounced autosave with optimistic concurrency over a [`DocumentStore`].
//!
//! ## State machine
//!
//! ```text
//! Idle ──edit──▶ Unsaved ──timer──▶ (probe) ──▶ Saving ──▶ Saved
//!                  ▲                   │                     │
//!                  │                   ├── mismatch ──▶ Conflict
//!                  │                   └── net error ──▶ Error
//!                  └────────── next edit ◀─────────────────┘
//! ```
//!
//! The probe compares the store's `modifiedAt` against the last value this
//! controller saw. A mismatch means another client wrote in between: nothing
//! is persisted, the status lands on `Conflict`, and the user picks one of
//! three resolutions (GetRemote / KeepLocal / Fork). `Conflict` gates
//! autosave for that document until resolved.
//!
//! Everything is single-threaded and instant-addressed: the embedding calls
//! `tick(now)` (and tests pass a virtual clock); the only suspension points
//! are the store calls.

use crate::registry::SessionRegistry;
use crate::scheduler::{Debouncer, ProbeTimer};
use crate::store::{DocumentStore, StoreError};
use chrono::{DateTime, Utc};
use montage_document::{Document, DocumentId, ItemId};
use montage_editor::{ChangeRecord, DocumentSession, EditorError, HistoryStack};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Delay between the last edit and the autosave attempt.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(1000);

/// Cadence of the background remote probe for the active document.
pub const DEFAULT_PROBE_PERIOD: Duration = Duration::from_secs(15);

/// Per-document save status, driving the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Unsaved,
    Saving,
    Saved,
    Error,
    Conflict,
}

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("document not open: {0}")]
    UnknownDocument(DocumentId),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Save bookkeeping for one open document. All of it lives here: there are
/// no free-floating mutable cells.
struct DocSyncState {
    status: SaveStatus,
    last_saved_digest: Option<String>,
    last_known_remote_modified_at: Option<DateTime<Utc>>,
    /// Probed remote stamp that raised the current conflict, for display.
    remote_modified_at: Option<DateTime<Utc>>,
    debounce: Debouncer,
    saving: bool,
}

impl DocSyncState {
    fn new(delay: Duration) -> Self {
        Self {
            status: SaveStatus::Idle,
            last_saved_digest: None,
            last_known_remote_modified_at: None,
            remote_modified_at: None,
            debounce: Debouncer::new(delay),
            saving: false,
        }
    }
}

pub struct SceneSyncController {
    store: Arc<dyn DocumentStore>,
    registry: SessionRegistry,
    states: HashMap<DocumentId, DocSyncState>,
    active: Option<DocumentId>,
    probe_timer: ProbeTimer,
    online: bool,
    debounce_delay: Duration,
}

impl SceneSyncController {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_timing(store, DEFAULT_DEBOUNCE_DELAY, DEFAULT_PROBE_PERIOD)
    }

    pub fn with_timing(
        store: Arc<dyn DocumentStore>,
        debounce_delay: Duration,
        probe_period: Duration,
    ) -> Self {
        Self {
            store,
            registry: SessionRegistry::new(),
            states: HashMap::new(),
            active: None,
            probe_timer: ProbeTimer::new(probe_period),
            online: true,
            debounce_delay,
        }
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    // ------------------------------------------------------------------
    // Document lifecycle
    // ------------------------------------------------------------------

    /// Open a document from the store: fetch it plus its persisted history.
    /// A corrupt history payload falls back to a fresh empty stack rather
    /// than blocking the load.
    pub async fn open_from_store(&mut self, id: &DocumentId) -> Result<(), WorkspaceError> {
        let document = self.store.fetch_document(id).await?;
        let history = match self.store.fetch_history(id).await? {
            Some(payload) => match HistoryStack::from_json(&payload) {
                Ok(history) => history,
                Err(e) => {
                    tracing::warn!(document = %id, error = %e, "persisted history is corrupt, starting fresh");
                    HistoryStack::new()
                }
            },
            None => HistoryStack::new(),
        };
        self.open_local(document, history);
        Ok(())
    }

    /// Register an already-fetched document. The copy is treated as in sync
    /// with the store.
    pub fn open_local(&mut self, document: Document, history: HistoryStack) {
        let id = document.id.clone();
        let mut state = DocSyncState::new(self.debounce_delay);
        state.last_known_remote_modified_at = Some(document.modified_at);
        state.last_saved_digest = Some(snapshot_digest(&document));
        self.registry
            .open(DocumentSession::with_history(document, history));
        self.states.insert(id, state);
    }

    /// Create a brand-new document: unsaved, empty history, autosave armed.
    pub fn create_document(&mut self, name: impl Into<String>, now: Instant) -> DocumentId {
        let id = DocumentId::generate();
        let document = Document::new(id.clone(), name, Utc::now());
        self.registry.open(DocumentSession::new(document));

        let mut state = DocSyncState::new(self.debounce_delay);
        state.status = SaveStatus::Unsaved;
        state.debounce.arm(now);
        self.states.insert(id.clone(), state);
        id
    }

    /// Close a document: the session and its history are discarded.
    pub fn close_document(&mut self, id: &DocumentId) -> Option<DocumentSession> {
        self.states.remove(id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        self.registry.close(id)
    }

    /// Mark a document as the one on screen and probe it for out-of-band
    /// remote changes.
    pub async fn activate_document(&mut self, id: &DocumentId) -> Result<(), WorkspaceError> {
        if !self.states.contains_key(id) {
            return Err(WorkspaceError::UnknownDocument(id.clone()));
        }
        self.active = Some(id.clone());
        self.probe_remote(id).await
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn session(&self, id: &DocumentId) -> Option<&DocumentSession> {
        self.registry.get(id)
    }

    /// Mutable session access for edits that are not ChangeRecords (e.g.
    /// renaming the document). Content edits should go through
    /// [`apply_change`](Self::apply_change) so autosave notices them.
    pub fn session_mut(&mut self, id: &DocumentId) -> Option<&mut DocumentSession> {
        self.registry.get_mut(id)
    }

    pub fn open_ids(&self) -> Vec<DocumentId> {
        self.registry.ids().cloned().collect()
    }

    pub fn status(&self, id: &DocumentId) -> Option<SaveStatus> {
        self.states.get(id).map(|state| state.status)
    }

    /// The probed remote stamp behind the current conflict, for display.
    pub fn remote_modified_at(&self, id: &DocumentId) -> Option<DateTime<Utc>> {
        self.states.get(id).and_then(|state| state.remote_modified_at)
    }

    pub fn last_known_remote_modified_at(&self, id: &DocumentId) -> Option<DateTime<Utc>> {
        self.states
            .get(id)
            .and_then(|state| state.last_known_remote_modified_at)
    }

    /// Earliest pending debounce deadline, for drivers mapping the state
    /// machine onto a real timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.states
            .values()
            .filter_map(|state| state.debounce.deadline())
            .min()
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Validate, apply and record a change, then mark the document dirty.
    pub fn apply_change(
        &mut self,
        id: &DocumentId,
        change: ChangeRecord,
        now: Instant,
    ) -> Result<(), WorkspaceError> {
        let session = self
            .registry
            .get_mut(id)
            .ok_or_else(|| WorkspaceError::UnknownDocument(id.clone()))?;
        session.push_change(change)?;
        self.note_edit(id, now);
        Ok(())
    }

    pub fn undo(&mut self, id: &DocumentId, now: Instant) -> Result<bool, WorkspaceError> {
        let session = self
            .registry
            .get_mut(id)
            .ok_or_else(|| WorkspaceError::UnknownDocument(id.clone()))?;
        let undone = session.undo();
        if undone {
            self.note_edit(id, now);
        }
        Ok(undone)
    }

    pub fn redo(&mut self, id: &DocumentId, now: Instant) -> Result<bool, WorkspaceError> {
        let session = self
            .registry
            .get_mut(id)
            .ok_or_else(|| WorkspaceError::UnknownDocument(id.clone()))?;
        let redone = session.redo();
        if redone {
            self.note_edit(id, now);
        }
        Ok(redone)
    }

    pub fn set_selection(
        &mut self,
        id: &DocumentId,
        ids: BTreeSet<ItemId>,
        now: Instant,
    ) -> Result<bool, WorkspaceError> {
        let session = self
            .registry
            .get_mut(id)
            .ok_or_else(|| WorkspaceError::UnknownDocument(id.clone()))?;
        let changed = session.set_selection(ids)?;
        if changed {
            self.note_edit(id, now);
        }
        Ok(changed)
    }

    fn note_edit(&mut self, id: &DocumentId, now: Instant) {
        let Some(state) = self.states.get_mut(id) else {
            return;
        };
        match state.status {
            // Resolution gates autosave; edits keep landing in the snapshot.
            SaveStatus::Conflict => {}
            // Captured by the next cycle, not the in-flight one.
            SaveStatus::Saving => state.debounce.arm(now),
            _ => {
                state.status = SaveStatus::Unsaved;
                state.debounce.arm(now);
            }
        }
    }

    // ------------------------------------------------------------------
    // Autosave
    // ------------------------------------------------------------------

    /// Advance the state machine: run saves whose debounce deadline passed,
    /// and the background probe when its cadence is due.
    pub async fn tick(&mut self, now: Instant) {
        let due: Vec<DocumentId> = self
            .states
            .iter_mut()
            .filter_map(|(id, state)| state.debounce.fire(now).then(|| id.clone()))
            .collect();
        for id in due {
            self.autosave(&id).await;
        }

        if self.probe_timer.poll(now) {
            if let Some(active) = self.active.clone() {
                let _ = self.probe_remote(&active).await;
            }
        }
    }

    /// Force a save cycle now, superseding any pending debounce. The way a
    /// caller retries after `Error` without waiting for another edit.
    pub async fn flush(&mut self, id: &DocumentId) -> Result<(), WorkspaceError> {
        let state = self
            .states
            .get_mut(id)
            .ok_or_else(|| WorkspaceError::UnknownDocument(id.clone()))?;
        state.debounce.cancel();
        self.autosave(id).await;
        Ok(())
    }

    async fn autosave(&mut self, id: &DocumentId) {
        {
            let Some(state) = self.states.get_mut(id) else {
                return;
            };
            // One logical save in flight per document; Conflict gates until
            // resolved.
            if state.saving || state.status == SaveStatus::Conflict {
                return;
            }
            state.saving = true;
        }

        if self.online {
            match self.store.fetch_modified_at(id).await {
                Ok(remote) => {
                    let Some(state) = self.states.get_mut(id) else {
                        return;
                    };
                    if state.last_known_remote_modified_at != Some(remote) {
                        tracing::warn!(document = %id, %remote, "remote modified out from under us");
                        state.status = SaveStatus::Conflict;
                        state.remote_modified_at = Some(remote);
                        state.saving = false;
                        return;
                    }
                }
                // Nothing persisted yet: the first save of a new document.
                Err(StoreError::NotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(document = %id, error = %e, "timestamp probe failed");
                    self.fail_save(id);
                    return;
                }
            }
        }

        if let Some(state) = self.states.get_mut(id) {
            state.status = SaveStatus::Saving;
        }

        let Some((document, history, digest_at_save)) = self.registry.get(id).map(|session| {
            (
                session.document().clone(),
                session.history().clone(),
                snapshot_digest(session.document()),
            )
        }) else {
            self.fail_save(id);
            return;
        };

        let stamp = match self.store.save_document(&document).await {
            Ok(stamp) => stamp,
            Err(e) => {
                tracing::warn!(document = %id, error = %e, "document save failed");
                self.fail_save(id);
                return;
            }
        };

        if let Err(e) = self.store.save_history(id, &history).await {
            tracing::warn!(document = %id, error = %e, "history save failed");
            self.fail_save(id);
            return;
        }

        let live_digest = self.registry.get(id).map(|s| snapshot_digest(s.document()));
        if let Some(state) = self.states.get_mut(id) {
            state.last_known_remote_modified_at = Some(stamp);
            state.last_saved_digest = Some(digest_at_save);
            state.remote_modified_at = None;
            // Edits that landed while the save was in flight belong to the
            // next cycle.
            state.status = if live_digest == state.last_saved_digest {
                SaveStatus::Saved
            } else {
                SaveStatus::Unsaved
            };
            state.saving = false;
        }
        tracing::debug!(document = %id, "autosave complete");
    }

    fn fail_save(&mut self, id: &DocumentId) {
        if let Some(state) = self.states.get_mut(id) {
            state.status = SaveStatus::Error;
            state.saving = false;
        }
    }

    // ------------------------------------------------------------------
    // Remote probing
    // ------------------------------------------------------------------

    /// Compare the store's stamp against the last one seen; raise `Conflict`
    /// on divergence even when no save is pending. A failed background probe
    /// only logs: it must not clobber an otherwise-clean indicator.
    pub async fn probe_remote(&mut self, id: &DocumentId) -> Result<(), WorkspaceError> {
        let Some(state) = self.states.get(id) else {
            return Err(WorkspaceError::UnknownDocument(id.clone()));
        };
        if !self.online || state.saving {
            return Ok(());
        }
        // A never-saved document has nothing remote to diverge from.
        let Some(last_known) = state.last_known_remote_modified_at else {
            return Ok(());
        };

        match self.store.fetch_modified_at(id).await {
            Ok(remote) if remote != last_known => {
                tracing::warn!(document = %id, %remote, "background probe found remote divergence");
                if let Some(state) = self.states.get_mut(id) {
                    state.status = SaveStatus::Conflict;
                    state.remote_modified_at = Some(remote);
                    state.debounce.cancel();
                }
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(document = %id, error = %e, "background probe failed");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Conflict resolution
    // ------------------------------------------------------------------

    /// Discard local state: adopt the store's document and history. A store
    /// failure leaves the conflict standing and is returned to the caller.
    pub async fn resolve_get_remote(&mut self, id: &DocumentId) -> Result<(), WorkspaceError> {
        let document = self.store.fetch_document(id).await?;
        let history = match self.store.fetch_history(id).await? {
            Some(payload) => match HistoryStack::from_json(&payload) {
                Ok(history) => history,
                Err(e) => {
                    tracing::warn!(document = %id, error = %e, "remote history is corrupt, starting fresh");
                    HistoryStack::new()
                }
            },
            None => HistoryStack::new(),
        };

        let modified_at = document.modified_at;
        let digest = snapshot_digest(&document);
        let session = self
            .registry
            .get_mut(id)
            .ok_or_else(|| WorkspaceError::UnknownDocument(id.clone()))?;
        session.replace(document, history);

        if let Some(state) = self.states.get_mut(id) {
            state.status = SaveStatus::Saved;
            state.last_known_remote_modified_at = Some(modified_at);
            state.last_saved_digest = Some(digest);
            state.remote_modified_at = None;
            state.debounce.cancel();
            state.saving = false;
        }
        Ok(())
    }

    /// Force-write the local document over the remote copy.
    pub async fn resolve_keep_local(&mut self, id: &DocumentId) -> Result<(), WorkspaceError> {
        let (document, history) = {
            let session = self
                .registry
                .get(id)
                .ok_or_else(|| WorkspaceError::UnknownDocument(id.clone()))?;
            (session.document().clone(), session.history().clone())
        };

        self.store.save_document(&document).await?;
        self.store.save_history(id, &history).await?;

        if let Some(state) = self.states.get_mut(id) {
            state.status = SaveStatus::Saved;
            // The local document's own stamp is now the authoritative one.
            state.last_known_remote_modified_at = Some(document.modified_at);
            state.last_saved_digest = Some(snapshot_digest(&document));
            state.remote_modified_at = None;
            state.debounce.cancel();
        }
        Ok(())
    }

    /// Keep both: the local items move to a brand-new unsaved document, and
    /// the original id adopts the remote copy so it stays consistent with
    /// collaborators. Returns the fork's id.
    pub async fn resolve_fork(
        &mut self,
        id: &DocumentId,
        now: Instant,
    ) -> Result<DocumentId, WorkspaceError> {
        let fork_session = {
            let session = self
                .registry
                .get(id)
                .ok_or_else(|| WorkspaceError::UnknownDocument(id.clone()))?;
            let fork_name = format!("{} (fork)", session.document().name);
            session.fork(DocumentId::generate(), fork_name)
        };
        let fork_id = fork_session.document().id.clone();

        self.registry.open(fork_session);
        let mut state = DocSyncState::new(self.debounce_delay);
        state.status = SaveStatus::Unsaved;
        state.debounce.arm(now);
        self.states.insert(fork_id.clone(), state);

        self.resolve_get_remote(id).await?;
        Ok(fork_id)
    }
}

/// Content digest of the item snapshot, for last-saved bookkeeping.
fn snapshot_digest(document: &Document) -> String {
    let bytes = serde_json::to_vec(&document.items).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
