//! End-to-end: the axum store server on an ephemeral port, driven through
//! [`HttpStore`] by a sync controller.

use montage_document::{Document, DocumentId, Item, ItemId, ItemKind};
use montage_editor::ChangeRecord;
use montage_workspace::{
    router, DocumentStore, HttpStore, MemoryStore, SaveStatus, SceneSyncController, StoreError,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn add_change(id: &str) -> ChangeRecord {
    ChangeRecord::AddObject {
        item: Item::new(
            ItemId::new(id),
            ItemKind::Text {
                text: id.to_string(),
            },
        ),
    }
}

/// Spawn the store server on an ephemeral port; returns its backing store
/// (for simulating other clients) and base URL.
async fn spawn_server() -> (MemoryStore, String) {
    let store = MemoryStore::new();
    let app = router(store.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (store, format!("http://{}", addr))
}

#[tokio::test]
async fn autosave_and_conflict_resolution_over_http() {
    let (backing, base_url) = spawn_server().await;
    let store = Arc::new(HttpStore::new(base_url));
    let mut ctl = SceneSyncController::new(store.clone());
    let start = Instant::now();

    // Create, edit, autosave.
    let id = ctl.create_document("Board", start);
    ctl.apply_change(&id, add_change("a"), start).unwrap();
    ctl.tick(start + Duration::from_millis(1500)).await;
    assert_eq!(ctl.status(&id), Some(SaveStatus::Saved));

    // Everything is visible through the REST surface.
    let listed = store.list_documents().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);

    let fetched = store.fetch_document(&id).await.unwrap();
    assert_eq!(fetched.items.len(), 1);
    assert!(store.fetch_history(&id).await.unwrap().is_some());

    // Another client writes out of band, straight into the backing store.
    let mut remote = fetched.clone();
    remote.touch(remote.modified_at + chrono::Duration::minutes(5));
    backing.seed(remote);

    // The next autosave probes, sees the divergence and refuses to write.
    ctl.apply_change(&id, add_change("b"), start + Duration::from_secs(10))
        .unwrap();
    ctl.tick(start + Duration::from_secs(12)).await;
    assert_eq!(ctl.status(&id), Some(SaveStatus::Conflict));
    assert_eq!(store.fetch_document(&id).await.unwrap().items.len(), 1);

    // KeepLocal force-writes both items over the remote copy.
    ctl.resolve_keep_local(&id).await.unwrap();
    assert_eq!(ctl.status(&id), Some(SaveStatus::Saved));
    let resolved = store.fetch_document(&id).await.unwrap();
    assert_eq!(resolved.items.len(), 2);
    assert_eq!(
        store.fetch_modified_at(&id).await.unwrap(),
        ctl.last_known_remote_modified_at(&id).unwrap()
    );
}

#[tokio::test]
async fn http_store_maps_missing_resources() {
    let (backing, base_url) = spawn_server().await;
    let store = HttpStore::new(base_url);

    let missing = DocumentId::new("missing");
    assert!(matches!(
        store.fetch_document(&missing).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.fetch_modified_at(&missing).await,
        Err(StoreError::NotFound(_))
    ));

    // A document with no persisted history reads back as None, not an
    // error.
    let document = Document::new(DocumentId::new("doc-1"), "Board", chrono::Utc::now());
    backing.seed(document.clone());
    assert!(store.fetch_history(&document.id).await.unwrap().is_none());
}

#[tokio::test]
async fn open_from_store_round_trips_document_and_history() {
    let (_backing, base_url) = spawn_server().await;
    let store = Arc::new(HttpStore::new(base_url));

    // First client writes a document with some history.
    let start = Instant::now();
    let mut writer = SceneSyncController::new(store.clone());
    let id = writer.create_document("Shared board", start);
    writer.apply_change(&id, add_change("a"), start).unwrap();
    writer.apply_change(&id, add_change("b"), start).unwrap();
    writer.flush(&id).await.unwrap();
    assert_eq!(writer.status(&id), Some(SaveStatus::Saved));

    // Second client opens the same document cold.
    let mut reader = SceneSyncController::new(store);
    reader.open_from_store(&id).await.unwrap();

    let session = reader.session(&id).unwrap();
    assert_eq!(session.document().items.len(), 2);
    assert_eq!(session.history().undo_depth(), 2);

    // And can undo the writer's edits locally.
    let now = Instant::now();
    assert!(reader.undo(&id, now).unwrap());
    assert_eq!(reader.session(&id).unwrap().document().items.len(), 1);
}
