//! Session-level error taxonomy.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced at the session and dispatch boundary.
///
/// Store-level failures on fire-and-forget mutations are logged rather than
/// returned (convergence comes from the next snapshot); this type covers the
/// checks that fail fast before any mutation is issued, plus the store errors
/// of lifecycle operations such as joining a room.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backing store rejected a lifecycle operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The local role does not permit this action.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Action cannot be performed against the current snapshot.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Referenced entity is not in the current snapshot.
    #[error("not found: {0}")]
    NotFound(String),
}
