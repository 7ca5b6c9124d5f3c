//! Error types for leadsheet edits
//!
//! Every variant here is a rejected edit that the caller can recover from,
//! normally by aborting its open transaction and showing the message.
//! Caller bugs (no open transaction, stale handles) panic instead.

use crate::models::{ItemKind, Position};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The edit would break a position or payload invariant
    #[error("Invalid edit: {0}")]
    InvariantViolation(String),

    /// Another section already uses this name
    #[error("A section named '{0}' already exists")]
    NameConflict(String),

    /// Another section already starts on this bar
    #[error("Bar {0} already starts a section")]
    SectionBarOccupied(u32),

    /// Another item of the same kind sits at the target position
    #[error("A {} already exists at {position}", .kind.name())]
    PositionOccupied { kind: ItemKind, position: Position },

    /// The section at bar 0 can never be removed
    #[error("The initial section cannot be removed")]
    CannotRemoveInitialSection,

    /// The edit is not possible given the current document structure
    #[error("Unsupported edit: {0}")]
    UnsupportedEdit(String),

    /// An inconsistency was found after mutating; the transaction was rolled back
    #[error("Internal inconsistency, edit rolled back: {0}")]
    InternalInconsistency(String),

    /// The open transaction was already rolled back and cannot be committed
    #[error("Edit '{0}' was aborted and cannot be committed")]
    TransactionAborted(String),

    #[error("No undo history available")]
    NothingToUndo,

    #[error("No redo history available")]
    NothingToRedo,
}

impl EditError {
    /// Whether this is a rejected edit raised before anything changed
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EditError::InvariantViolation(_)
                | EditError::NameConflict(_)
                | EditError::SectionBarOccupied(_)
                | EditError::PositionOccupied { .. }
                | EditError::CannotRemoveInitialSection
                | EditError::UnsupportedEdit(_)
        )
    }
}
