//! # Document store boundary
//!
//! [`DocumentStore`] is the persistence surface the sync layer talks to:
//! listing, full fetch/save, the lightweight modified-timestamp probe, and
//! history persistence. [`MemoryStore`] is the in-process implementation -
//! the server's backing state and the test double; the HTTP client
//! implementation lives in `client`.
//!
//! The store adopts a saved document's own `modifiedAt` as the authoritative
//! stamp and echoes it back, so the timestamp a later probe returns is the
//! one the saving client already knows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use montage_document::{Document, DocumentId, DocumentSummary};
use montage_editor::HistoryStack;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed store payload: {0}")]
    Malformed(String),
}

/// The remote document store, as seen by the sync layer.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError>;

    async fn fetch_document(&self, id: &DocumentId) -> Result<Document, StoreError>;

    /// Persist the full document. Returns the authoritative `modifiedAt` of
    /// the stored copy.
    async fn save_document(&self, document: &Document) -> Result<DateTime<Utc>, StoreError>;

    /// The lightweight probe used for conflict detection.
    async fn fetch_modified_at(&self, id: &DocumentId) -> Result<DateTime<Utc>, StoreError>;

    /// Fetch the persisted history, if any. Absent history is not an error -
    /// a document saved before any history PUT simply has none.
    async fn fetch_history(&self, id: &DocumentId)
        -> Result<Option<serde_json::Value>, StoreError>;

    async fn save_history(
        &self,
        id: &DocumentId,
        history: &HistoryStack,
    ) -> Result<(), StoreError>;
}

struct StoredDocument {
    document: Document,
    history: Option<serde_json::Value>,
}

/// In-memory store: backs the server binary and the test suites.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<DocumentId, StoredDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document verbatim, bypassing the save path. Used to load
    /// server state and to simulate out-of-band remote edits in tests.
    pub fn seed(&self, document: Document) {
        let mut inner = self.inner.lock().unwrap();
        let history = inner.remove(&document.id).and_then(|d| d.history);
        inner.insert(document.id.clone(), StoredDocument { document, history });
    }

    /// Attach a raw history payload to a stored document. The payload is
    /// kept verbatim: the store has no opinion on its shape.
    pub fn seed_history(
        &self,
        id: &DocumentId,
        history: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(id) {
            Some(stored) => {
                stored.history = Some(history);
                Ok(())
            }
            None => Err(StoreError::NotFound(id.clone())),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut summaries: Vec<_> = inner
            .values()
            .map(|stored| stored.document.summary())
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    async fn fetch_document(&self, id: &DocumentId) -> Result<Document, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .get(id)
            .map(|stored| stored.document.clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn save_document(&self, document: &Document) -> Result<DateTime<Utc>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let history = inner.remove(&document.id).and_then(|d| d.history);
        inner.insert(
            document.id.clone(),
            StoredDocument {
                document: document.clone(),
                history,
            },
        );
        Ok(document.modified_at)
    }

    async fn fetch_modified_at(&self, id: &DocumentId) -> Result<DateTime<Utc>, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .get(id)
            .map(|stored| stored.document.modified_at)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn fetch_history(
        &self,
        id: &DocumentId,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let inner = self.inner.lock().unwrap();
        match inner.get(id) {
            Some(stored) => Ok(stored.history.clone()),
            None => Err(StoreError::NotFound(id.clone())),
        }
    }

    async fn save_history(
        &self,
        id: &DocumentId,
        history: &HistoryStack,
    ) -> Result<(), StoreError> {
        let payload =
            serde_json::to_value(history).map_err(|e| StoreError::Malformed(e.to_string()))?;
        self.seed_history(id, payload)
    }
}
