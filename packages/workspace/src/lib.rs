//! # Montage Workspace
//!
//! Scene synchronization for Montage documents: debounced autosave with
//! optimistic concurrency, conflict resolution, and the document store
//! surface.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ editor: ChangeRecord / HistoryStack /       │
//! │         DocumentSession                     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ workspace:                                  │
//! │  - SessionRegistry: one session per open    │
//! │    document                                 │
//! │  - SceneSyncController: dirty tracking,     │
//! │    debounce, probe-compare-commit, conflict │
//! │    resolution (GetRemote/KeepLocal/Fork)    │
//! │  - DocumentStore: MemoryStore + HttpStore   │
//! │  - server: axum REST surface + binary       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The controller is single-threaded and instant-addressed: edits call
//! `apply_change(id, change, now)`, a driver calls `tick(now)`, and the only
//! suspension points are the store calls. Tests pass a synthetic clock.

mod client;
mod registry;
mod scheduler;
mod server;
mod store;
mod sync;

pub use client::HttpStore;
pub use registry::SessionRegistry;
pub use scheduler::{Debouncer, ProbeTimer};
pub use server::router;
pub use store::{DocumentStore, MemoryStore, StoreError};
pub use sync::{
    SaveStatus, SceneSyncController, WorkspaceError, DEFAULT_DEBOUNCE_DELAY, DEFAULT_PROBE_PERIOD,
};
