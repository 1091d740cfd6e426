//! Canvas items: polymorphic placed objects keyed by a `kind` discriminant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a single placed item. Opaque to everything except the store
/// that minted it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The movable/resizable subset of an item's frame.
///
/// Applying a transform replaces exactly these fields and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

/// Kind-specific payload of an [`Item`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ItemKind {
    /// Free-floating text block.
    Text { text: String },

    /// Placed raster image.
    Image { url: String },

    /// Placed video.
    Video { url: String },

    /// Generative prompt card: a labeled prompt plus the model it targets.
    Prompt {
        label: String,
        text: String,
        model: String,
        minimized: bool,
    },
}

impl ItemKind {
    /// Discriminant name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Text { .. } => "text",
            ItemKind::Image { .. } => "image",
            ItemKind::Video { .. } => "video",
            ItemKind::Prompt { .. } => "prompt",
        }
    }
}

/// One placed object within a document.
///
/// Common frame fields live here; everything kind-specific is in
/// [`ItemKind`], flattened into the same JSON object under the `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl Item {
    pub fn new(id: ItemId, kind: ItemKind) -> Self {
        Self {
            id,
            name: None,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            rotation: None,
            kind,
        }
    }

    pub fn with_frame(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self
    }

    /// Snapshot of the transform-relevant fields.
    pub fn transform(&self) -> Transform {
        Transform {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            rotation: self.rotation,
        }
    }

    /// Replace the transform-relevant fields, leaving everything else alone.
    pub fn apply_transform(&mut self, transform: &Transform) {
        self.x = transform.x;
        self.y = transform.y;
        self.width = transform.width;
        self.height = transform.height;
        self.rotation = transform.rotation;
    }
}
