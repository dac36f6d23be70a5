//! The client sync engine.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::store::LocalStore;
use crate::transport::SyncTransport;
use crate::watch::{ChangePublisher, Subscription};
use parking_lot::RwLock;
use replidiff_delta::{DeltaEngine, JsonDeltaEngine};
use replidiff_protocol::{
    diff_snapshots, patch_snapshot, ClientDocument, Edit, EditsMessage, Record,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// The client side of the differential sync protocol.
///
/// The engine owns a [`ClientDocument`]: the live working copy local
/// mutations apply to, the shadow of the last server-acknowledged state
/// and the queue of staged-but-unconfirmed edits. One
/// [`sync`](SyncClient::sync) call runs one exchange with the server;
/// at most one runs at a time per instance, enforced by a flag rather
/// than queuing.
///
/// Every snapshot crossing the engine boundary is an independent copy:
/// mutations take their argument by value, reads and publications hand
/// out clones, and the store only ever sees snapshots.
pub struct SyncClient<T: Record, Tr: SyncTransport, St: LocalStore<T>> {
    config: ClientConfig,
    transport: Arc<Tr>,
    store: Arc<St>,
    delta: Box<dyn DeltaEngine>,
    document: RwLock<Option<ClientDocument<T>>>,
    is_syncing: AtomicBool,
    publisher: ChangePublisher<Vec<T>>,
}

impl<T: Record, Tr: SyncTransport, St: LocalStore<T>> SyncClient<T, Tr, St> {
    /// Creates a client with the default delta engine.
    pub fn new(config: ClientConfig, transport: Tr, store: St) -> Self {
        let delta = Box::new(JsonDeltaEngine::with_options(config.delta.clone()));
        Self::with_delta_engine(config, transport, store, delta)
    }

    /// Creates a client with a custom delta engine.
    pub fn with_delta_engine(
        config: ClientConfig,
        transport: Tr,
        store: St,
        delta: Box<dyn DeltaEngine>,
    ) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            store: Arc::new(store),
            delta,
            document: RwLock::new(None),
            is_syncing: AtomicBool::new(false),
            publisher: ChangePublisher::new(),
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Loads the document from the local store, or creates a fresh one.
    ///
    /// A fresh document starts empty with a generated replica id and is
    /// persisted immediately so the id survives restarts.
    pub fn init(&self) -> ClientResult<()> {
        let document = match self.store.load()? {
            Some(document) => document,
            None => {
                let document = ClientDocument::new();
                self.store.create(&document)?;
                document
            }
        };
        *self.document.write() = Some(document);
        Ok(())
    }

    /// Returns true once `init()` has run.
    pub fn is_initialized(&self) -> bool {
        self.document.read().is_some()
    }

    /// Returns this replica's id.
    pub fn replica_id(&self) -> ClientResult<String> {
        let guard = self.document.read();
        let document = guard.as_ref().ok_or(ClientError::NotInitialized)?;
        Ok(document.replica_id().to_string())
    }

    /// Returns a snapshot of the whole document.
    pub fn document(&self) -> ClientResult<ClientDocument<T>> {
        let guard = self.document.read();
        guard.clone().ok_or(ClientError::NotInitialized)
    }

    /// Returns a copy of the current working copy.
    pub fn read(&self) -> ClientResult<Vec<T>> {
        let guard = self.document.read();
        let document = guard.as_ref().ok_or(ClientError::NotInitialized)?;
        Ok(document.local_copy.clone())
    }

    /// Adds a record to the working copy.
    ///
    /// The change reaches the shadow, and then the server, on the next
    /// successful sync cycle.
    pub fn create(&self, item: T) -> ClientResult<()> {
        self.mutate(|local_copy| local_copy.push(item))
    }

    /// Replaces the record with the given id in the working copy.
    ///
    /// A missing id is a no-op, matching remove-then-update races.
    pub fn update(&self, id: &str, item: T) -> ClientResult<()> {
        self.mutate(|local_copy| {
            if let Some(slot) = local_copy.iter_mut().find(|slot| slot.id() == id) {
                *slot = item;
            }
        })
    }

    /// Removes the record with the given id from the working copy.
    pub fn remove(&self, id: &str) -> ClientResult<()> {
        self.mutate(|local_copy| local_copy.retain(|item| item.id() != id))
    }

    /// Subscribes to working-copy changes.
    ///
    /// The subscription immediately replays the latest published state,
    /// then receives the working copy after every mutation and after
    /// every sync cycle, successful or not.
    pub fn subscribe(&self) -> Subscription<Vec<T>> {
        self.publisher.subscribe()
    }

    fn mutate(&self, apply: impl FnOnce(&mut Vec<T>)) -> ClientResult<()> {
        let mut guard = self.document.write();
        let document = guard.as_mut().ok_or(ClientError::NotInitialized)?;
        apply(&mut document.local_copy);
        let copy = document.local_copy.clone();
        drop(guard);
        self.publisher.publish(copy);
        Ok(())
    }

    /// Runs one sync cycle with the server.
    ///
    /// Stages the difference between working copy and shadow as a new
    /// edit, sends the whole pending queue, and on a confirmed round
    /// trip clears the queue and applies the server's edits to both
    /// shadow and working copy.
    ///
    /// # Errors
    ///
    /// - [`ClientError::ConcurrentSyncRejected`] when a cycle is already
    ///   in flight; nothing is staged or mutated
    /// - [`ClientError::VersionMismatchRejected`] when the response does
    ///   not confirm the sent local version; pending edits are kept
    /// - [`ClientError::Transport`] / [`ClientError::Protocol`] after
    ///   persisting whatever the cycle had staged so far
    pub fn sync(&self) -> ClientResult<Vec<T>> {
        if self
            .is_syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sync already in flight, rejecting");
            return Err(ClientError::ConcurrentSyncRejected);
        }

        let result = self.sync_cycle();

        self.is_syncing.store(false, Ordering::SeqCst);
        if let Some(copy) = self.current_copy() {
            self.publisher.publish(copy);
        }

        result
    }

    fn sync_cycle(&self) -> ClientResult<Vec<T>> {
        // Stage under the lock, releasing it before the transport call
        // so local mutations stay possible while the request is out.
        let message = {
            let mut guard = self.document.write();
            let document = guard.as_mut().ok_or(ClientError::NotInitialized)?;

            let based_on_local = document.shadow.local_version;
            let delta = diff_snapshots(
                self.delta.as_ref(),
                &document.shadow.shadow_copy,
                &document.local_copy,
            )?;

            if let Some(delta) = delta {
                document.pending_edits.push(Edit::new(
                    delta.clone(),
                    based_on_local,
                    document.shadow.remote_version,
                ));
                document.shadow.local_version += 1;
                self.store.update(document)?;

                document.shadow.shadow_copy = patch_snapshot(
                    self.delta.as_ref(),
                    &document.shadow.shadow_copy,
                    &delta,
                    None,
                )?;
            }

            EditsMessage::new(
                document.replica_id().to_string(),
                document.pending_edits.clone(),
                based_on_local,
                document.shadow.remote_version,
            )
        };

        let response = match self.transport.send(&message) {
            Ok(response) => response,
            Err(err) => {
                warn!("sync transport failed: {err}");
                self.persist_current();
                return Err(err);
            }
        };

        let mut guard = self.document.write();
        let document = guard.as_mut().ok_or(ClientError::NotInitialized)?;

        if response.local_version != document.shadow.local_version {
            warn!(
                expected = document.shadow.local_version,
                received = response.local_version,
                "response rejected: local versions do not match"
            );
            let expected = document.shadow.local_version;
            if let Err(err) = self.store.update(document) {
                warn!("failed to persist document after rejection: {err}");
            }
            return Err(ClientError::VersionMismatchRejected {
                expected,
                received: response.local_version,
            });
        }

        // Round trip confirmed: the queue is delivered.
        if !document.pending_edits.is_empty() {
            document.pending_edits.clear();
            self.store.update(document)?;
        }

        if !response.edits.is_empty() {
            for edit in &response.edits {
                if let Err(err) = self.apply_edit(document, edit) {
                    if let Err(persist_err) = self.store.update(document) {
                        warn!("failed to persist document after patch failure: {persist_err}");
                    }
                    return Err(err);
                }
            }
            self.store.update(document)?;
        }

        Ok(document.local_copy.clone())
    }

    /// Applies one server-origin edit if it targets the shadow's exact
    /// version pair; silently ignores it otherwise (retransmission is
    /// the recovery mechanism, not an error condition).
    fn apply_edit(&self, document: &mut ClientDocument<T>, edit: &Edit) -> ClientResult<()> {
        if document.shadow.accepts(edit) {
            document.shadow.shadow_copy = patch_snapshot(
                self.delta.as_ref(),
                &document.shadow.shadow_copy,
                &edit.delta,
                None,
            )?;
            document.local_copy =
                patch_snapshot(self.delta.as_ref(), &document.local_copy, &edit.delta, None)?;
            document.shadow.remote_version += 1;
        } else {
            debug!(
                edit_local = edit.local_version,
                edit_remote = edit.remote_version,
                shadow_local = document.shadow.local_version,
                shadow_remote = document.shadow.remote_version,
                "ignoring server edit for a different version pair"
            );
        }
        Ok(())
    }

    fn current_copy(&self) -> Option<Vec<T>> {
        self.document
            .read()
            .as_ref()
            .map(|document| document.local_copy.clone())
    }

    fn persist_current(&self) {
        let guard = self.document.read();
        if let Some(document) = guard.as_ref() {
            if let Err(err) = self.store.update(document) {
                warn!("failed to persist document after error: {err}");
            }
        }
    }
}
