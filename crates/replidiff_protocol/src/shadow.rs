//! Shadow and client document state.

use crate::messages::Edit;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A per-replica mirror of the last mutually-acknowledged state.
///
/// `local_version` counts edits originated by this replica and staged;
/// `remote_version` counts edits received and accepted from the peer.
/// Both counters only ever grow. `shadow_copy` always equals the last
/// state both sides have exchanged; the live working copy may be ahead
/// of it due to unsynced local mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shadow<T> {
    /// Id of the client replica this shadow mirrors.
    pub replica_id: String,
    /// Number of edits staged by this shadow's owner.
    pub local_version: u64,
    /// Number of peer edits accepted by this shadow's owner.
    pub remote_version: u64,
    /// The last mutually-acknowledged snapshot.
    pub shadow_copy: Vec<T>,
}

impl<T: Record> Shadow<T> {
    /// Creates an empty shadow at version 0/0.
    pub fn new(replica_id: impl Into<String>) -> Self {
        Self::with_versions(replica_id, 0, 0)
    }

    /// Creates an empty shadow at a declared version pair.
    ///
    /// Used for the server-side first-contact bootstrap, which trusts
    /// the version pair the client declared in its message envelope.
    pub fn with_versions(
        replica_id: impl Into<String>,
        local_version: u64,
        remote_version: u64,
    ) -> Self {
        Self {
            replica_id: replica_id.into(),
            local_version,
            remote_version,
            shadow_copy: Vec::new(),
        }
    }

    /// Returns the `(local_version, remote_version)` pair.
    pub fn version_pair(&self) -> (u64, u64) {
        (self.local_version, self.remote_version)
    }

    /// Returns true if the edit targets exactly this shadow's state.
    ///
    /// Any edit that does not is stale or a duplicate and must be
    /// dropped without mutating state.
    pub fn accepts(&self, edit: &Edit) -> bool {
        edit.targets(self.local_version, self.remote_version)
    }
}

/// The client's live state: working copy, shadow and unacknowledged edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDocument<T> {
    /// The working copy local mutations apply to.
    pub local_copy: Vec<T>,
    /// The shadow of the last state the server acknowledged.
    pub shadow: Shadow<T>,
    /// Edits staged but not yet confirmed by the server.
    pub pending_edits: Vec<Edit>,
}

impl<T: Record> ClientDocument<T> {
    /// Creates an empty document with a freshly generated replica id.
    pub fn new() -> Self {
        Self::with_replica_id(Uuid::new_v4().to_string())
    }

    /// Creates an empty document with the given replica id.
    pub fn with_replica_id(replica_id: impl Into<String>) -> Self {
        Self {
            local_copy: Vec::new(),
            shadow: Shadow::new(replica_id),
            pending_edits: Vec::new(),
        }
    }

    /// Returns the replica id this document belongs to.
    pub fn replica_id(&self) -> &str {
        &self.shadow.replica_id
    }
}

impl<T: Record> Default for ClientDocument<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replidiff_delta::{Delta, ValueDelta};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        text: String,
    }

    impl Record for Note {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn edit(local_version: u64, remote_version: u64) -> Edit {
        let mut entries = BTreeMap::new();
        entries.insert(
            "n1".to_string(),
            ValueDelta::Insert {
                value: json!({"id": "n1", "text": "x"}),
            },
        );
        Edit::new(Delta::from_entries(entries), local_version, remote_version)
    }

    #[test]
    fn shadow_starts_at_zero() {
        let shadow: Shadow<Note> = Shadow::new("replica-1");
        assert_eq!(shadow.version_pair(), (0, 0));
        assert!(shadow.shadow_copy.is_empty());
    }

    #[test]
    fn bootstrap_trusts_declared_versions() {
        let shadow: Shadow<Note> = Shadow::with_versions("replica-1", 4, 9);
        assert_eq!(shadow.version_pair(), (4, 9));
        assert!(shadow.shadow_copy.is_empty());
    }

    #[test]
    fn accepts_requires_exact_pair() {
        let shadow: Shadow<Note> = Shadow::with_versions("replica-1", 2, 3);

        assert!(shadow.accepts(&edit(2, 3)));
        assert!(!shadow.accepts(&edit(1, 3)));
        assert!(!shadow.accepts(&edit(2, 2)));
        assert!(!shadow.accepts(&edit(3, 4)));
    }

    #[test]
    fn fresh_documents_get_distinct_replica_ids() {
        let a: ClientDocument<Note> = ClientDocument::new();
        let b: ClientDocument<Note> = ClientDocument::new();

        assert!(!a.replica_id().is_empty());
        assert_ne!(a.replica_id(), b.replica_id());
        assert!(a.local_copy.is_empty());
        assert!(a.pending_edits.is_empty());
    }

    #[test]
    fn document_serde_roundtrip() {
        let mut doc: ClientDocument<Note> = ClientDocument::with_replica_id("replica-1");
        doc.local_copy.push(Note {
            id: "n1".into(),
            text: "hello".into(),
        });
        doc.pending_edits.push(edit(0, 0));
        doc.shadow.local_version = 1;

        let encoded = serde_json::to_string(&doc).unwrap();
        let decoded: ClientDocument<Note> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, doc);
    }
}
