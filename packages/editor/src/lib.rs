//! # Montage Editor
//!
//! Change-log engine for Montage documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ document: Item / Document model             │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: reversible edits + history          │
//! │  - ChangeRecord: closed set of edits,       │
//! │    each with a pure forward/backward apply  │
//! │  - HistoryStack: cursor-addressed undo/redo │
//! │    log with a lossless wire format          │
//! │  - DocumentSession: live snapshot +         │
//! │    selection + history for one open doc     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ workspace: autosave + conflict resolution   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core principles
//!
//! 1. **Changes are self-contained**: a record embeds everything needed to
//!    reverse itself; no second fetch, no external lookups during apply.
//! 2. **Apply is pure**: forward/backward take a [`HistoryState`] and return
//!    a new one; validation happens once, before a record enters history.
//! 3. **Exhausted history is not an error**: undo/redo on an empty stack is
//!    a guarded no-op, never a panic.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use montage_editor::{ChangeRecord, DocumentSession};
//!
//! let mut session = DocumentSession::new(document);
//! session.push_change(ChangeRecord::AddObject { item })?;
//! session.undo();
//! session.redo();
//! ```

mod changes;
mod errors;
mod history;
mod session;

pub use changes::{ChangeError, ChangeRecord, HistoryState, TransformEntry};
pub use errors::EditorError;
pub use history::HistoryStack;
pub use session::DocumentSession;
