//! Error types for the editor

use crate::changes::ChangeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    /// Malformed change payload, rejected before it enters history.
    #[error("invalid change: {0}")]
    Validation(#[from] ChangeError),

    /// A persisted history payload that does not deserialize. Callers fall
    /// back to a fresh empty stack rather than blocking the document load.
    #[error("corrupt history payload: {0}")]
    CorruptHistory(String),
}
