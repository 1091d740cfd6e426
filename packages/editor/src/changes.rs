//! # Reversible edits
//!
//! The closed set of edit descriptions a user action can produce.
//!
//! ## Design
//!
//! - Each variant carries symmetric before/after payloads, so a record can
//!   be applied in either direction without consulting anything but itself
//! - `apply_forward`/`apply_backward` are pure: state in, state out
//! - `validate` runs once, before a record is pushed; a record that made it
//!   into history always applies cleanly
//! - Missing targets during apply are left untouched (idempotent removal,
//!   untouched transforms) rather than erroring: history replay must never
//!   fail halfway

use montage_document::{Item, ItemId, ItemKind, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// The minimal snapshot a [`ChangeRecord`] operates over: the item sequence
/// plus the selection. Derived from a `Document` and the live selection,
/// never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    pub items: Vec<Item>,
    pub selected_ids: BTreeSet<ItemId>,
}

impl HistoryState {
    pub fn new(items: Vec<Item>, selected_ids: BTreeSet<ItemId>) -> Self {
        Self {
            items,
            selected_ids,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            selected_ids: BTreeSet::new(),
        }
    }

    pub fn find_item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }
}

/// One entry of a synchronized batch transform (multi-select drag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformEntry {
    pub id: ItemId,
    pub old_transform: Transform,
    pub new_transform: Transform,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChangeError {
    #[error("item not found: {0}")]
    UnknownItem(ItemId),

    #[error("item already exists: {0}")]
    DuplicateItem(ItemId),

    #[error("item {id} is not a {expected} item")]
    KindMismatch { id: ItemId, expected: &'static str },

    #[error("batch transform has no entries")]
    EmptyBatch,

    #[error("composite change has no steps")]
    EmptyComposite,
}

/// A reversible description of one edit.
///
/// Serialized with a `type` discriminant; payload fields mirror the in-memory
/// shape in camelCase, so the wire format is exactly what the history
/// endpoint persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ChangeRecord {
    /// Place a new item. The embedded item is an immutable copy taken at
    /// creation time.
    #[serde(rename = "add")]
    AddObject { item: Item },

    /// Remove an item. The full snapshot is embedded so the delete reverses
    /// without a second fetch.
    #[serde(rename = "delete")]
    DeleteObject { item: Item },

    /// Move/resize a single item.
    #[serde(rename = "transform")]
    TransformObject {
        id: ItemId,
        old_transform: Transform,
        new_transform: Transform,
    },

    /// Synchronized transform of several items at once.
    #[serde(rename = "transformBatch")]
    TransformObjects { entries: Vec<TransformEntry> },

    /// Replace the content of a text item.
    #[serde(rename = "updateText")]
    UpdateText {
        id: ItemId,
        old_text: String,
        new_text: String,
    },

    /// Replace label and prompt text of a prompt item.
    #[serde(rename = "updatePrompt")]
    UpdatePrompt {
        id: ItemId,
        old_label: String,
        old_text: String,
        new_label: String,
        new_text: String,
    },

    /// Retarget a prompt item at a different model.
    #[serde(rename = "updateModel")]
    UpdateModel {
        id: ItemId,
        old_model: String,
        new_model: String,
    },

    /// Rename an item (any kind).
    #[serde(rename = "updateName")]
    UpdateName {
        id: ItemId,
        old_name: Option<String>,
        new_name: Option<String>,
    },

    /// Collapse or expand a prompt card.
    #[serde(rename = "toggleMinimized")]
    ToggleMinimized {
        id: ItemId,
        old_flag: bool,
        new_flag: bool,
    },

    /// Change the selection set. Never touches `items`.
    #[serde(rename = "selection")]
    Selection {
        old_ids: BTreeSet<ItemId>,
        new_ids: BTreeSet<ItemId>,
    },

    /// Atomic composite: undone and redone as a single step.
    #[serde(rename = "multiStep")]
    MultiStep { sub_changes: Vec<ChangeRecord> },
}

impl ChangeRecord {
    /// Apply this change in the forward direction.
    pub fn apply_forward(&self, state: &HistoryState) -> HistoryState {
        match self {
            ChangeRecord::AddObject { item } => {
                let mut next = state.clone();
                next.items.push(item.clone());
                next
            }

            ChangeRecord::DeleteObject { item } => remove_by_id(state, &item.id),

            ChangeRecord::TransformObject {
                id, new_transform, ..
            } => with_item(state, id, |item| item.apply_transform(new_transform)),

            ChangeRecord::TransformObjects { entries } => {
                let mut next = state.clone();
                for entry in entries {
                    if let Some(item) = next.items.iter_mut().find(|i| i.id == entry.id) {
                        item.apply_transform(&entry.new_transform);
                    }
                }
                next
            }

            ChangeRecord::UpdateText { id, new_text, .. } => with_item(state, id, |item| {
                if let ItemKind::Text { text } = &mut item.kind {
                    *text = new_text.clone();
                }
            }),

            ChangeRecord::UpdatePrompt {
                id,
                new_label,
                new_text,
                ..
            } => with_item(state, id, |item| {
                if let ItemKind::Prompt { label, text, .. } = &mut item.kind {
                    *label = new_label.clone();
                    *text = new_text.clone();
                }
            }),

            ChangeRecord::UpdateModel { id, new_model, .. } => with_item(state, id, |item| {
                if let ItemKind::Prompt { model, .. } = &mut item.kind {
                    *model = new_model.clone();
                }
            }),

            ChangeRecord::UpdateName { id, new_name, .. } => {
                with_item(state, id, |item| item.name = new_name.clone())
            }

            ChangeRecord::ToggleMinimized { id, new_flag, .. } => with_item(state, id, |item| {
                if let ItemKind::Prompt { minimized, .. } = &mut item.kind {
                    *minimized = *new_flag;
                }
            }),

            ChangeRecord::Selection { new_ids, .. } => HistoryState {
                items: state.items.clone(),
                selected_ids: new_ids.clone(),
            },

            ChangeRecord::MultiStep { sub_changes } => sub_changes
                .iter()
                .fold(state.clone(), |acc, change| change.apply_forward(&acc)),
        }
    }

    /// Apply this change in the backward direction. For every state `s`,
    /// `apply_backward(&apply_forward(&s)) == s`.
    pub fn apply_backward(&self, state: &HistoryState) -> HistoryState {
        match self {
            // Idempotent removal: a no-op if the id is already gone.
            ChangeRecord::AddObject { item } => remove_by_id(state, &item.id),

            // Re-insertion appends; sequence order is not z-order.
            ChangeRecord::DeleteObject { item } => {
                let mut next = state.clone();
                next.items.push(item.clone());
                next
            }

            ChangeRecord::TransformObject {
                id, old_transform, ..
            } => with_item(state, id, |item| item.apply_transform(old_transform)),

            ChangeRecord::TransformObjects { entries } => {
                let mut next = state.clone();
                for entry in entries {
                    if let Some(item) = next.items.iter_mut().find(|i| i.id == entry.id) {
                        item.apply_transform(&entry.old_transform);
                    }
                }
                next
            }

            ChangeRecord::UpdateText { id, old_text, .. } => with_item(state, id, |item| {
                if let ItemKind::Text { text } = &mut item.kind {
                    *text = old_text.clone();
                }
            }),

            ChangeRecord::UpdatePrompt {
                id,
                old_label,
                old_text,
                ..
            } => with_item(state, id, |item| {
                if let ItemKind::Prompt { label, text, .. } = &mut item.kind {
                    *label = old_label.clone();
                    *text = old_text.clone();
                }
            }),

            ChangeRecord::UpdateModel { id, old_model, .. } => with_item(state, id, |item| {
                if let ItemKind::Prompt { model, .. } = &mut item.kind {
                    *model = old_model.clone();
                }
            }),

            ChangeRecord::UpdateName { id, old_name, .. } => {
                with_item(state, id, |item| item.name = old_name.clone())
            }

            ChangeRecord::ToggleMinimized { id, old_flag, .. } => with_item(state, id, |item| {
                if let ItemKind::Prompt { minimized, .. } = &mut item.kind {
                    *minimized = *old_flag;
                }
            }),

            ChangeRecord::Selection { old_ids, .. } => HistoryState {
                items: state.items.clone(),
                selected_ids: old_ids.clone(),
            },

            // Reverse order: sub-changes may depend on each other
            // (delete-then-add during a combine).
            ChangeRecord::MultiStep { sub_changes } => sub_changes
                .iter()
                .rev()
                .fold(state.clone(), |acc, change| change.apply_backward(&acc)),
        }
    }

    /// Validate against the state this change would be applied to. Runs
    /// before push; a rejected change never enters history.
    pub fn validate(&self, state: &HistoryState) -> Result<(), ChangeError> {
        match self {
            ChangeRecord::AddObject { item } => {
                if state.find_item(&item.id).is_some() {
                    return Err(ChangeError::DuplicateItem(item.id.clone()));
                }
                Ok(())
            }

            ChangeRecord::DeleteObject { item } => require_item(state, &item.id).map(|_| ()),

            ChangeRecord::TransformObject { id, .. } => require_item(state, id).map(|_| ()),

            ChangeRecord::TransformObjects { entries } => {
                if entries.is_empty() {
                    return Err(ChangeError::EmptyBatch);
                }
                for entry in entries {
                    require_item(state, &entry.id)?;
                }
                Ok(())
            }

            ChangeRecord::UpdateText { id, .. } => {
                let item = require_item(state, id)?;
                match item.kind {
                    ItemKind::Text { .. } => Ok(()),
                    _ => Err(ChangeError::KindMismatch {
                        id: id.clone(),
                        expected: "text",
                    }),
                }
            }

            ChangeRecord::UpdatePrompt { id, .. }
            | ChangeRecord::UpdateModel { id, .. }
            | ChangeRecord::ToggleMinimized { id, .. } => {
                let item = require_item(state, id)?;
                match item.kind {
                    ItemKind::Prompt { .. } => Ok(()),
                    _ => Err(ChangeError::KindMismatch {
                        id: id.clone(),
                        expected: "prompt",
                    }),
                }
            }

            ChangeRecord::UpdateName { id, .. } => require_item(state, id).map(|_| ()),

            // A selection may reference ids that are already gone.
            ChangeRecord::Selection { .. } => Ok(()),

            ChangeRecord::MultiStep { sub_changes } => {
                if sub_changes.is_empty() {
                    return Err(ChangeError::EmptyComposite);
                }
                // Each step validates against the state its predecessors
                // produce, so delete-then-add chains check out.
                let mut acc = state.clone();
                for change in sub_changes {
                    change.validate(&acc)?;
                    acc = change.apply_forward(&acc);
                }
                Ok(())
            }
        }
    }
}

fn require_item<'a>(state: &'a HistoryState, id: &ItemId) -> Result<&'a Item, ChangeError> {
    state
        .find_item(id)
        .ok_or_else(|| ChangeError::UnknownItem(id.clone()))
}

fn remove_by_id(state: &HistoryState, id: &ItemId) -> HistoryState {
    let mut next = state.clone();
    next.items.retain(|item| &item.id != id);
    next
}

fn with_item(state: &HistoryState, id: &ItemId, edit: impl FnOnce(&mut Item)) -> HistoryState {
    let mut next = state.clone();
    if let Some(item) = next.items.iter_mut().find(|item| &item.id == id) {
        edit(item);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_item(id: &str, content: &str) -> Item {
        Item::new(
            ItemId::new(id),
            ItemKind::Text {
                text: content.to_string(),
            },
        )
        .with_frame(0.0, 0.0, 100.0, 40.0)
    }

    fn prompt_item(id: &str) -> Item {
        Item::new(
            ItemId::new(id),
            ItemKind::Prompt {
                label: "Scene".to_string(),
                text: "a quiet street".to_string(),
                model: "sd-xl".to_string(),
                minimized: false,
            },
        )
    }

    fn state_with(items: Vec<Item>) -> HistoryState {
        HistoryState::new(items, BTreeSet::new())
    }

    #[test]
    fn add_round_trips() {
        let state = state_with(vec![]);
        let change = ChangeRecord::AddObject {
            item: text_item("a", "hello"),
        };

        let forward = change.apply_forward(&state);
        assert_eq!(forward.items.len(), 1);

        let back = change.apply_backward(&forward);
        assert_eq!(back, state);
    }

    #[test]
    fn delete_round_trips() {
        let state = state_with(vec![text_item("a", "hello"), text_item("b", "world")]);
        let change = ChangeRecord::DeleteObject {
            item: text_item("a", "hello"),
        };

        let forward = change.apply_forward(&state);
        assert_eq!(forward.items.len(), 1);
        assert_eq!(forward.items[0].id, ItemId::new("b"));

        // Re-insertion appends, so the sequence is reordered but the item
        // set matches.
        let back = change.apply_backward(&forward);
        assert_eq!(back.items.len(), 2);
        assert!(back.find_item(&ItemId::new("a")).is_some());
    }

    #[test]
    fn add_backward_is_idempotent_on_missing_id() {
        let state = state_with(vec![]);
        let change = ChangeRecord::AddObject {
            item: text_item("a", "hello"),
        };

        // Removing an id that is not there is a silent no-op.
        let back = change.apply_backward(&state);
        assert_eq!(back, state);
    }

    #[test]
    fn transform_round_trips_and_leaves_other_fields() {
        let mut item = text_item("a", "hello");
        item.name = Some("headline".to_string());
        let state = state_with(vec![item.clone()]);

        let change = ChangeRecord::TransformObject {
            id: ItemId::new("a"),
            old_transform: item.transform(),
            new_transform: Transform {
                x: 50.0,
                y: 60.0,
                width: 200.0,
                height: 80.0,
                rotation: Some(15.0),
            },
        };

        let forward = change.apply_forward(&state);
        let moved = forward.find_item(&ItemId::new("a")).unwrap();
        assert_eq!(moved.x, 50.0);
        assert_eq!(moved.name.as_deref(), Some("headline"));
        assert!(matches!(&moved.kind, ItemKind::Text { text } if text == "hello"));

        assert_eq!(change.apply_backward(&forward), state);
    }

    #[test]
    fn batch_transform_moves_every_entry() {
        let a = text_item("a", "x");
        let b = text_item("b", "y");
        let state = state_with(vec![a.clone(), b.clone()]);

        let shift = |t: Transform| Transform {
            x: t.x + 10.0,
            y: t.y + 10.0,
            ..t
        };
        let change = ChangeRecord::TransformObjects {
            entries: vec![
                TransformEntry {
                    id: a.id.clone(),
                    old_transform: a.transform(),
                    new_transform: shift(a.transform()),
                },
                TransformEntry {
                    id: b.id.clone(),
                    old_transform: b.transform(),
                    new_transform: shift(b.transform()),
                },
            ],
        };

        let forward = change.apply_forward(&state);
        assert_eq!(forward.find_item(&a.id).unwrap().x, 10.0);
        assert_eq!(forward.find_item(&b.id).unwrap().x, 10.0);
        assert_eq!(change.apply_backward(&forward), state);
    }

    #[test]
    fn update_prompt_round_trips() {
        let state = state_with(vec![prompt_item("p")]);
        let change = ChangeRecord::UpdatePrompt {
            id: ItemId::new("p"),
            old_label: "Scene".to_string(),
            old_text: "a quiet street".to_string(),
            new_label: "Backdrop".to_string(),
            new_text: "a crowded market".to_string(),
        };

        let forward = change.apply_forward(&state);
        match &forward.find_item(&ItemId::new("p")).unwrap().kind {
            ItemKind::Prompt { label, text, .. } => {
                assert_eq!(label, "Backdrop");
                assert_eq!(text, "a crowded market");
            }
            other => panic!("unexpected kind: {:?}", other),
        }

        assert_eq!(change.apply_backward(&forward), state);
    }

    #[test]
    fn selection_never_touches_items() {
        let state = HistoryState::new(
            vec![text_item("a", "x")],
            [ItemId::new("a")].into_iter().collect(),
        );
        let change = ChangeRecord::Selection {
            old_ids: state.selected_ids.clone(),
            new_ids: BTreeSet::new(),
        };

        let forward = change.apply_forward(&state);
        assert_eq!(forward.items, state.items);
        assert!(forward.selected_ids.is_empty());

        assert_eq!(change.apply_backward(&forward), state);
    }

    #[test]
    fn multi_step_backward_runs_in_reverse_order() {
        // Combine: delete two items, add their replacement. Backward has to
        // remove the replacement before re-inserting the originals.
        let a = text_item("a", "left");
        let b = text_item("b", "right");
        let combined = text_item("c", "leftright");
        let state = state_with(vec![a.clone(), b.clone()]);

        let change = ChangeRecord::MultiStep {
            sub_changes: vec![
                ChangeRecord::DeleteObject { item: a.clone() },
                ChangeRecord::DeleteObject { item: b.clone() },
                ChangeRecord::AddObject {
                    item: combined.clone(),
                },
            ],
        };

        let forward = change.apply_forward(&state);
        assert_eq!(forward.items.len(), 1);
        assert_eq!(forward.items[0].id, combined.id);

        let back = change.apply_backward(&forward);
        assert_eq!(back.items.len(), 2);
        assert!(back.find_item(&a.id).is_some());
        assert!(back.find_item(&b.id).is_some());
    }

    #[test]
    fn validate_rejects_duplicate_add() {
        let state = state_with(vec![text_item("a", "x")]);
        let change = ChangeRecord::AddObject {
            item: text_item("a", "y"),
        };
        assert_eq!(
            change.validate(&state),
            Err(ChangeError::DuplicateItem(ItemId::new("a")))
        );
    }

    #[test]
    fn validate_rejects_kind_mismatch() {
        let state = state_with(vec![text_item("a", "x")]);
        let change = ChangeRecord::UpdateModel {
            id: ItemId::new("a"),
            old_model: "sd-xl".to_string(),
            new_model: "flux".to_string(),
        };
        assert!(matches!(
            change.validate(&state),
            Err(ChangeError::KindMismatch { expected: "prompt", .. })
        ));
    }

    #[test]
    fn validate_multi_step_tracks_intermediate_state() {
        // Delete `a` then add a fresh `a`: only valid because validation
        // threads the intermediate state through the steps.
        let a = text_item("a", "old");
        let state = state_with(vec![a.clone()]);

        let change = ChangeRecord::MultiStep {
            sub_changes: vec![
                ChangeRecord::DeleteObject { item: a },
                ChangeRecord::AddObject {
                    item: text_item("a", "new"),
                },
            ],
        };
        assert!(change.validate(&state).is_ok());

        assert_eq!(
            ChangeRecord::MultiStep {
                sub_changes: vec![]
            }
            .validate(&state),
            Err(ChangeError::EmptyComposite)
        );
    }

    #[test]
    fn wire_format_uses_type_discriminant() {
        let change = ChangeRecord::TransformObject {
            id: ItemId::new("a"),
            old_transform: Transform {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                rotation: None,
            },
            new_transform: Transform {
                x: 5.0,
                y: 5.0,
                width: 10.0,
                height: 10.0,
                rotation: None,
            },
        };

        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "transform");
        assert_eq!(json["id"], "a");
        assert_eq!(json["oldTransform"]["x"], 0.0);
        assert_eq!(json["newTransform"]["x"], 5.0);

        let back: ChangeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, change);
    }
}
