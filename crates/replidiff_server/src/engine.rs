//! The server sync engine.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::persistence::Persistence;
use crate::reconcile::{classify, StoreOp};
use replidiff_delta::{DeltaEngine, JsonDeltaEngine};
use replidiff_protocol::{
    diff_snapshots, patch_snapshot, Edit, EditsMessage, Record, Shadow,
};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// The server side of the differential sync protocol.
///
/// The engine owns the canonical record store and one shadow per known
/// client replica, both behind the [`Persistence`] seam. Each
/// [`sync`](ServerEngine::sync) call reconciles one client message:
/// version-matching edits are applied to the replica's shadow and a
/// working copy of the store, a fresh delta is computed for the client,
/// and the store is updated record by record.
///
/// Synchronization scope is the per-replica shadow: concurrent calls
/// for distinct replicas are safe, while calls from different replicas
/// touching the same record race under last-write-wins at the store.
pub struct ServerEngine<T: Record, P: Persistence<T>> {
    config: ServerConfig,
    persistence: Arc<P>,
    delta: Box<dyn DeltaEngine>,
    _records: PhantomData<fn() -> T>,
}

impl<T: Record, P: Persistence<T>> ServerEngine<T, P> {
    /// Creates an engine with the default delta engine.
    pub fn new(config: ServerConfig, persistence: P) -> Self {
        let delta = Box::new(JsonDeltaEngine::with_options(config.delta.clone()));
        Self::with_delta_engine(config, persistence, delta)
    }

    /// Creates an engine with a custom delta engine.
    pub fn with_delta_engine(
        config: ServerConfig,
        persistence: P,
        delta: Box<dyn DeltaEngine>,
    ) -> Self {
        Self {
            config,
            persistence: Arc::new(persistence),
            delta,
            _records: PhantomData,
        }
    }

    /// Returns the persistence layer.
    pub fn persistence(&self) -> &Arc<P> {
        &self.persistence
    }

    /// Returns the canonical record snapshot.
    pub fn records(&self) -> ServerResult<Vec<T>> {
        self.persistence.all_records()
    }

    /// Returns the shadow for a replica, if one exists.
    pub fn shadow(&self, replica_id: &str) -> ServerResult<Option<Shadow<T>>> {
        self.persistence.find_shadow(replica_id)
    }

    /// Returns all known shadows.
    pub fn shadows(&self) -> ServerResult<Vec<Shadow<T>>> {
        self.persistence.all_shadows()
    }

    /// Reconciles one client message and produces the response.
    ///
    /// # Errors
    ///
    /// Fails when the message exceeds the edit limit, when persistence
    /// fails, or when a version-matching edit cannot be patched in
    /// ([`ServerError::is_unrecoverable_patch`]). Store mutations issued
    /// before a failure are not rolled back; delivery is at-least-once,
    /// not atomic.
    pub fn sync(&self, message: &EditsMessage) -> ServerResult<EditsMessage> {
        if message.edits.len() > self.config.max_message_edits {
            return Err(ServerError::TooManyEdits {
                count: message.edits.len(),
                max: self.config.max_message_edits,
            });
        }

        let store_before = self.persistence.all_records()?;
        let mut shadow = match self.persistence.find_shadow(&message.replica_id)? {
            Some(shadow) => shadow,
            None => {
                // First contact: trust the client-declared version pair.
                debug!(replica = %message.replica_id, "bootstrapping shadow for new replica");
                let shadow = Shadow::with_versions(
                    &message.replica_id,
                    message.local_version,
                    message.remote_version,
                );
                self.persistence.save_shadow(&shadow)?;
                shadow
            }
        };

        // The shadow copy as of the start of this call is the only
        // snapshot that can still contain a record deleted from the
        // store while the client was editing it concurrently.
        let shadow_before = shadow.shadow_copy.clone();
        let mut working_store = store_before.clone();

        for edit in &message.edits {
            if shadow.accepts(edit) {
                shadow.shadow_copy =
                    patch_snapshot(self.delta.as_ref(), &shadow.shadow_copy, &edit.delta, None)?;
                working_store = patch_snapshot(
                    self.delta.as_ref(),
                    &working_store,
                    &edit.delta,
                    Some(&shadow_before),
                )?;
                shadow.local_version += 1;
            } else {
                // The previous response must have been lost; the edit
                // was already applied. Retransmission is the recovery
                // mechanism, not an error.
                warn!(
                    replica = %message.replica_id,
                    edit_local = edit.local_version,
                    edit_remote = edit.remote_version,
                    shadow_local = shadow.local_version,
                    shadow_remote = shadow.remote_version,
                    "dropping stale or duplicate edit"
                );
            }
        }

        let server_delta =
            diff_snapshots(self.delta.as_ref(), &shadow.shadow_copy, &working_store)?;
        let (based_on_local, based_on_remote) = shadow.version_pair();

        let edits = match server_delta {
            Some(delta) => {
                let edit = Edit::new(delta.clone(), based_on_local, based_on_remote);
                shadow.remote_version += 1;
                shadow.shadow_copy =
                    patch_snapshot(self.delta.as_ref(), &shadow.shadow_copy, &delta, None)?;
                vec![edit]
            }
            None => Vec::new(),
        };

        self.persistence.update_shadow(&shadow)?;
        self.reconcile(&store_before, &working_store)?;

        Ok(EditsMessage::new(
            &message.replica_id,
            edits,
            based_on_local,
            based_on_remote,
        ))
    }

    /// Applies the difference between two store states record by record.
    fn reconcile(&self, old_state: &[T], new_state: &[T]) -> ServerResult<()> {
        let Some(delta) = diff_snapshots(self.delta.as_ref(), old_state, new_state)? else {
            return Ok(());
        };

        for operation in classify(&delta, old_state, new_state) {
            match operation {
                StoreOp::Update(record) => self.persistence.update_record(&record)?,
                StoreOp::Create(record) => self.persistence.save_record(&record)?,
                StoreOp::Delete(record) => self.persistence.delete_record(record.id())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use replidiff_protocol::diff_snapshots as diff;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Task {
        id: String,
        title: String,
        done: bool,
    }

    impl Record for Task {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn task(id: &str, title: &str) -> Task {
        Task {
            id: id.into(),
            title: title.into(),
            done: false,
        }
    }

    fn engine_with(records: Vec<Task>) -> ServerEngine<Task, MemoryPersistence<Task>> {
        ServerEngine::new(ServerConfig::new(), MemoryPersistence::with_records(records))
    }

    fn client_edit(before: &[Task], after: &[Task], local: u64, remote: u64) -> Edit {
        let delta = diff(&JsonDeltaEngine::new(), before, after)
            .unwrap()
            .unwrap();
        Edit::new(delta, local, remote)
    }

    #[test]
    fn first_contact_without_edits_sends_canonical_set() {
        let engine = engine_with(vec![task("s1", "server item")]);

        let message = EditsMessage::new("replica-1", vec![], 0, 0);
        let response = engine.sync(&message).unwrap();

        // The whole canonical set comes back as one creation edit based
        // on the fresh 0/0 shadow.
        assert_eq!(response.edits.len(), 1);
        assert!(response.edits[0].targets(0, 0));
        assert_eq!(response.local_version, 0);
        assert_eq!(response.remote_version, 0);

        let shadow = engine.shadow("replica-1").unwrap().unwrap();
        assert_eq!(shadow.local_version, 0);
        assert_eq!(shadow.remote_version, 1);
        assert_eq!(shadow.shadow_copy, vec![task("s1", "server item")]);
    }

    #[test]
    fn first_contact_with_client_edit_applies_it() {
        let engine = engine_with(vec![task("s1", "server item")]);

        let edit = client_edit(&[], &[task("r1", "client item")], 0, 0);
        let message = EditsMessage::new("replica-1", vec![edit], 0, 0);
        let response = engine.sync(&message).unwrap();

        // The accepted edit advanced local_version before the response
        // pair was captured, confirming the round trip to the client.
        assert_eq!(response.local_version, 1);
        assert_eq!(response.remote_version, 0);
        assert_eq!(response.edits.len(), 1);

        let shadow = engine.shadow("replica-1").unwrap().unwrap();
        assert_eq!(shadow.version_pair(), (1, 1));

        let mut titles: Vec<_> = engine
            .records()
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["r1", "s1"]);
    }

    #[test]
    fn duplicate_edit_is_dropped_without_state_change() {
        let engine = engine_with(vec![]);

        let edit = client_edit(&[], &[task("r1", "client item")], 0, 0);
        let message = EditsMessage::new("replica-1", vec![edit], 0, 0);

        engine.sync(&message).unwrap();
        let shadow_after_first = engine.shadow("replica-1").unwrap().unwrap();
        let records_after_first = engine.records().unwrap();

        // Resend of an already-consumed version pair: no reapply, no
        // cached response, shadow untouched by that edit.
        let response = engine.sync(&message).unwrap();
        assert!(response.edits.is_empty());

        let shadow_after_second = engine.shadow("replica-1").unwrap().unwrap();
        assert_eq!(shadow_after_second, shadow_after_first);
        assert_eq!(engine.records().unwrap(), records_after_first);
    }

    #[test]
    fn no_changes_on_either_side_yields_empty_response() {
        let engine = engine_with(vec![]);

        let first = EditsMessage::new("replica-1", vec![], 0, 0);
        let response = engine.sync(&first).unwrap();
        assert!(response.edits.is_empty());
        assert_eq!(response.local_version, 0);
        assert_eq!(response.remote_version, 0);

        let shadow = engine.shadow("replica-1").unwrap().unwrap();
        assert_eq!(shadow.version_pair(), (0, 0));
    }

    #[test]
    fn sequential_edits_in_one_message_apply_in_order() {
        let engine = engine_with(vec![]);

        let created = vec![task("r1", "v1")];
        let mut updated = created.clone();
        updated[0].title = "v2".into();

        let edits = vec![
            client_edit(&[], &created, 0, 0),
            client_edit(&created, &updated, 1, 0),
        ];
        let message = EditsMessage::new("replica-1", edits, 0, 0);
        let response = engine.sync(&message).unwrap();

        assert_eq!(response.local_version, 2);
        let records = engine.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "v2");
    }

    #[test]
    fn update_of_server_deleted_record_resurrects_it() {
        // Sync once so the shadow knows record "x".
        let engine = engine_with(vec![task("x", "original")]);
        let first = EditsMessage::new("replica-1", vec![], 0, 0);
        engine.sync(&first).unwrap();

        // Server-side delete of "x" behind the engine's back (another
        // replica's doing, as far as this shadow is concerned).
        engine.persistence().delete_record("x").unwrap();

        // The client concurrently updated "x" based on the acked state.
        let acked = vec![task("x", "original")];
        let mut edited = acked.clone();
        edited[0].title = "updated".into();
        let edit = client_edit(&acked, &edited, 0, 1);
        let message = EditsMessage::new("replica-1", vec![edit], 0, 1);

        let response = engine.sync(&message).unwrap();
        assert_eq!(response.local_version, 1);

        // "x" is back, with the update applied.
        let records = engine.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "updated");
    }

    #[test]
    fn oversized_message_is_rejected() {
        let engine = ServerEngine::new(
            ServerConfig::new().with_max_message_edits(1),
            MemoryPersistence::<Task>::new(),
        );

        let edits = vec![
            client_edit(&[], &[task("a", "one")], 0, 0),
            client_edit(&[], &[task("b", "two")], 1, 0),
        ];
        let message = EditsMessage::new("replica-1", edits, 0, 0);

        let err = engine.sync(&message).unwrap_err();
        assert!(matches!(err, ServerError::TooManyEdits { count: 2, max: 1 }));
        // Rejected before any shadow was bootstrapped.
        assert!(engine.shadow("replica-1").unwrap().is_none());
    }

    #[test]
    fn distinct_replicas_have_independent_shadows() {
        let engine = engine_with(vec![]);

        let edit = client_edit(&[], &[task("r1", "from one")], 0, 0);
        engine
            .sync(&EditsMessage::new("replica-1", vec![edit], 0, 0))
            .unwrap();

        // A second replica's first contact sees replica-1's record but
        // keeps its own version pair.
        let response = engine
            .sync(&EditsMessage::new("replica-2", vec![], 0, 0))
            .unwrap();
        assert_eq!(response.edits.len(), 1);

        let one = engine.shadow("replica-1").unwrap().unwrap();
        let two = engine.shadow("replica-2").unwrap().unwrap();
        assert_eq!(one.version_pair(), (1, 0));
        assert_eq!(two.version_pair(), (0, 1));
    }

    #[test]
    fn versions_never_decrease_across_calls() {
        let engine = engine_with(vec![]);

        let mut state: Vec<Task> = Vec::new();
        let mut pairs = Vec::new();

        for round in 0..4u64 {
            let mut next = state.clone();
            next.push(task(&format!("r{round}"), "item"));
            let edit = client_edit(&state, &next, round, 0);
            engine
                .sync(&EditsMessage::new("replica-1", vec![edit], round, 0))
                .unwrap();
            state = next;

            let shadow = engine.shadow("replica-1").unwrap().unwrap();
            pairs.push(shadow.version_pair());
        }

        for window in pairs.windows(2) {
            assert!(window[1].0 >= window[0].0);
            assert!(window[1].1 >= window[0].1);
        }
    }
}
