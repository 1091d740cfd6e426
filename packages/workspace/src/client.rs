//! # HTTP store client
//!
//! [`DocumentStore`] over the REST surface in `server`. Transport failures
//! map to [`StoreError::Network`], undecodable bodies to
//! [`StoreError::Malformed`], and 404s to [`StoreError::NotFound`].

use crate::store::{DocumentStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use montage_document::{Document, DocumentId, DocumentSummary};
use montage_editor::HistoryStack;
use reqwest::StatusCode;
use serde::Deserialize;

pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModifiedAtBody {
    modified_at: DateTime<Utc>,
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Malformed(e.to_string())
        } else {
            StoreError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let response = self
            .client
            .get(self.url("/documents"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn fetch_document(&self, id: &DocumentId) -> Result<Document, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("/documents/{}", id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(response.error_for_status()?.json().await?)
    }

    async fn save_document(&self, document: &Document) -> Result<DateTime<Utc>, StoreError> {
        let response = self
            .client
            .put(self.url(&format!("/documents/{}", document.id)))
            .json(document)
            .send()
            .await?
            .error_for_status()?;
        let body: ModifiedAtBody = response.json().await?;
        Ok(body.modified_at)
    }

    async fn fetch_modified_at(&self, id: &DocumentId) -> Result<DateTime<Utc>, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("/documents/{}/modifiedAt", id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.clone()));
        }
        let body: ModifiedAtBody = response.error_for_status()?.json().await?;
        Ok(body.modified_at)
    }

    async fn fetch_history(
        &self,
        id: &DocumentId,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("/documents/{}/history", id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }

    async fn save_history(
        &self,
        id: &DocumentId,
        history: &HistoryStack,
    ) -> Result<(), StoreError> {
        self.client
            .put(self.url(&format!("/documents/{}/history", id)))
            .json(history)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
