//! Error types for the client engine.

use replidiff_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur during client sync operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The engine has no document yet; call `init()` first.
    #[error("client not initialized")]
    NotInitialized,

    /// A sync cycle is already in flight.
    ///
    /// The call is rejected immediately, nothing is queued and no
    /// version state changes; staged mutations ride the next cycle.
    #[error("a sync cycle is already in flight")]
    ConcurrentSyncRejected,

    /// The server's response did not confirm the sent local version.
    ///
    /// Pending edits are kept and re-sent on the next cycle.
    #[error("server confirmed local version {received}, expected {expected}")]
    VersionMismatchRejected {
        /// The local version the client held after staging.
        expected: u64,
        /// The local version the server echoed back.
        received: u64,
    },

    /// The transport call failed.
    #[error("transport error: {message}")]
    Transport {
        /// Error message from the transport.
        message: String,
    },

    /// A snapshot conversion, patch or wire operation failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The local store failed.
    #[error("local store error: {0}")]
    Store(String),
}

impl ClientError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a local store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Returns true if the next sync cycle is expected to recover.
    ///
    /// Pending edits stay staged across these failures and are
    /// re-delivered until a matching version pair acknowledges them.
    pub fn is_retried_next_cycle(&self) -> bool {
        matches!(
            self,
            ClientError::ConcurrentSyncRejected
                | ClientError::VersionMismatchRejected { .. }
                | ClientError::Transport { .. }
        )
    }
}
