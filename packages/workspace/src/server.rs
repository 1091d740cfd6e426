//! # Store server
//!
//! Axum router exposing the document store REST surface over a
//! [`MemoryStore`]:
//!
//! - `GET  /documents`: list summaries
//! - `GET  /documents/:id`: full document
//! - `PUT  /documents/:id`: persist; responds with the authoritative
//!   `{modifiedAt}`
//! - `GET  /documents/:id/modifiedAt`: the lightweight conflict probe
//! - `GET  /documents/:id/history`: persisted history (404 when none)
//! - `PUT  /documents/:id/history`: persist history verbatim

use crate::store::{DocumentStore, MemoryStore, StoreError};
use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use montage_document::{Document, DocumentId, DocumentSummary};
use serde::Serialize;
use tower_http::cors::CorsLayer;

/// Build the REST router over the given store.
pub fn router(store: MemoryStore) -> Router {
    Router::new()
        .route("/documents", get(list_documents))
        .route("/documents/:id", get(fetch_document).put(save_document))
        .route("/documents/:id/modifiedAt", get(fetch_modified_at))
        .route(
            "/documents/:id/history",
            get(fetch_history).put(save_history),
        )
        .with_state(store)
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifiedAtBody {
    modified_at: DateTime<Utc>,
}

struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Malformed(_) => StatusCode::BAD_REQUEST,
            StoreError::Network(_) => StatusCode::BAD_GATEWAY,
        };
        (status, self.0.to_string()).into_response()
    }
}

async fn list_documents(
    State(store): State<MemoryStore>,
) -> Result<Json<Vec<DocumentSummary>>, ApiError> {
    Ok(Json(store.list_documents().await?))
}

async fn fetch_document(
    State(store): State<MemoryStore>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let document = store.fetch_document(&DocumentId::new(id)).await?;
    Ok(Json(document))
}

async fn save_document(
    State(store): State<MemoryStore>,
    Path(id): Path<String>,
    Json(document): Json<Document>,
) -> Result<Json<ModifiedAtBody>, ApiError> {
    if document.id.as_str() != id {
        return Err(ApiError(StoreError::Malformed(format!(
            "document id {} does not match path id {}",
            document.id, id
        ))));
    }
    tracing::debug!(document = %document.id, "persisting document");
    let modified_at = store.save_document(&document).await?;
    Ok(Json(ModifiedAtBody { modified_at }))
}

async fn fetch_modified_at(
    State(store): State<MemoryStore>,
    Path(id): Path<String>,
) -> Result<Json<ModifiedAtBody>, ApiError> {
    let modified_at = store.fetch_modified_at(&DocumentId::new(id)).await?;
    Ok(Json(ModifiedAtBody { modified_at }))
}

async fn fetch_history(
    State(store): State<MemoryStore>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = DocumentId::new(id);
    match store.fetch_history(&id).await? {
        Some(payload) => Ok(Json(payload)),
        None => Err(ApiError(StoreError::NotFound(id))),
    }
}

async fn save_history(
    State(store): State<MemoryStore>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError> {
    store.seed_history(&DocumentId::new(id), payload)?;
    Ok(StatusCode::NO_CONTENT)
}
