//! # Montage Document Model
//!
//! The persisted data model for Montage canvas documents.
//!
//! A [`Document`] is the unit of storage: an ordered collection of typed
//! [`Item`]s plus naming and timestamp metadata. Items are polymorphic over a
//! `kind` discriminant (text, image, video, generative prompt) with a shared
//! positional frame; [`Transform`] is the movable/resizable subset of that
//! frame.
//!
//! This crate is a leaf: no I/O, no async, no editing logic. The change-log
//! engine lives in `montage-editor` and persistence in `montage-workspace`.

mod document;
mod item;

pub use document::{Document, DocumentId, DocumentSummary};
pub use item::{Item, ItemId, ItemKind, Transform};
