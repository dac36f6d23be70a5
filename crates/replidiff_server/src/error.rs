//! Error types for the server engine.

use replidiff_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving a sync call.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A snapshot conversion, patch or wire operation failed.
    ///
    /// A patch failure aborts the sync call; per-record store mutations
    /// already issued in the same call are not rolled back.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The persistence layer failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The message carries more edits than the server accepts.
    #[error("message carries too many edits: {count} > {max}")]
    TooManyEdits {
        /// Number of edits in the message.
        count: usize,
        /// Configured maximum.
        max: usize,
    },
}

impl ServerError {
    /// Creates a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Returns true if this is a failed (unrecovered) patch.
    pub fn is_unrecoverable_patch(&self) -> bool {
        matches!(self, ServerError::Protocol(ProtocolError::Patch(_)))
    }
}
