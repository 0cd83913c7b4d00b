use thiserror::Error;

use crate::{playoff::BracketError, store::StorageError};

/// Errors that can occur while operating the arena.
#[derive(Debug, Error)]
pub enum ArenaError {
    /// A parameter supplied by the operator is malformed or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Operation cannot be performed in the current match state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The field is not ready for the requested operation.
    #[error("cannot start match: {0}")]
    NotReady(String),
    /// Requested entity was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Storage backend failed.
    #[error("storage error")]
    Storage(#[from] StorageError),
    /// The playoff bracket is inconsistent or unsupported.
    #[error(transparent)]
    Bracket(#[from] BracketError),
}

impl ArenaError {
    /// Shorthand for an [`ArenaError::InvalidArgument`] with a formatted message.
    pub fn argument(message: impl Into<String>) -> Self {
        ArenaError::InvalidArgument(message.into())
    }

    /// Shorthand for an [`ArenaError::InvalidState`] with a formatted message.
    pub fn state(message: impl Into<String>) -> Self {
        ArenaError::InvalidState(message.into())
    }
}
