//! Protocol messages for sync.

use replidiff_delta::Delta;
use serde::{Deserialize, Serialize};

/// A delta tagged with the version pair it was computed against.
///
/// The pair identifies exactly which acknowledged state the delta must
/// be applied to: a receiver accepts the edit only when its shadow holds
/// exactly these versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    /// The structural delta.
    pub delta: Delta,
    /// The sender's `local_version` when the delta was computed.
    pub local_version: u64,
    /// The sender's `remote_version` when the delta was computed.
    pub remote_version: u64,
}

impl Edit {
    /// Creates an edit from a delta and the version pair it is based on.
    pub fn new(delta: Delta, local_version: u64, remote_version: u64) -> Self {
        Self {
            delta,
            local_version,
            remote_version,
        }
    }

    /// Returns true if this edit targets exactly the given version pair.
    pub fn targets(&self, local_version: u64, remote_version: u64) -> bool {
        self.local_version == local_version && self.remote_version == remote_version
    }
}

/// The wire envelope: staged edits plus the sender's version pair.
///
/// The trailing pair states the versions the sender held when it began
/// building the message. The receiver uses it to bootstrap a shadow on
/// first contact; the original sender matches the echoed pair against
/// its own counters to confirm the round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditsMessage {
    /// Id of the client replica this exchange belongs to.
    pub replica_id: String,
    /// Staged edits, oldest first.
    pub edits: Vec<Edit>,
    /// The sender's `local_version` when building the message.
    pub local_version: u64,
    /// The sender's `remote_version` when building the message.
    pub remote_version: u64,
}

impl EditsMessage {
    /// Creates a new message envelope.
    pub fn new(
        replica_id: impl Into<String>,
        edits: Vec<Edit>,
        local_version: u64,
        remote_version: u64,
    ) -> Self {
        Self {
            replica_id: replica_id.into(),
            edits,
            local_version,
            remote_version,
        }
    }

    /// Returns true if the message carries no edits.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}
