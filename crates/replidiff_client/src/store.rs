//! Local store seam for client-side durability.

use crate::error::{ClientError, ClientResult};
use parking_lot::RwLock;
use replidiff_protocol::{ClientDocument, Record};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// The client-held storage capability.
///
/// Called for durability before and after each sync step that mutates
/// state. The engine always hands over an independent snapshot of the
/// document; implementations never see the live state.
pub trait LocalStore<T: Record>: Send + Sync {
    /// Loads the persisted document, if one exists.
    fn load(&self) -> ClientResult<Option<ClientDocument<T>>>;

    /// Persists a freshly created document.
    fn create(&self, document: &ClientDocument<T>) -> ClientResult<()>;

    /// Persists the current document state.
    fn update(&self, document: &ClientDocument<T>) -> ClientResult<()>;
}

/// An in-memory store for tests and ephemeral clients.
pub struct MemoryStore<T> {
    document: RwLock<Option<ClientDocument<T>>>,
    updates: AtomicU64,
}

impl<T: Record> MemoryStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            document: RwLock::new(None),
            updates: AtomicU64::new(0),
        }
    }

    /// Creates a store pre-seeded with a document, as if from a
    /// previous session.
    pub fn with_document(document: ClientDocument<T>) -> Self {
        Self {
            document: RwLock::new(Some(document)),
            updates: AtomicU64::new(0),
        }
    }

    /// Returns how many times `update` has been called.
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }

    /// Returns a copy of the stored document, if any.
    pub fn stored(&self) -> Option<ClientDocument<T>> {
        self.document.read().clone()
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> LocalStore<T> for MemoryStore<T>
where
    T: Send + Sync,
{
    fn load(&self) -> ClientResult<Option<ClientDocument<T>>> {
        Ok(self.document.read().clone())
    }

    fn create(&self, document: &ClientDocument<T>) -> ClientResult<()> {
        *self.document.write() = Some(document.clone());
        Ok(())
    }

    fn update(&self, document: &ClientDocument<T>) -> ClientResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        *self.document.write() = Some(document.clone());
        Ok(())
    }
}

/// A store persisting the document as a JSON file.
///
/// Suitable for desktop or CLI clients; browsers and mobile apps plug
/// in their own [`LocalStore`] over whatever storage they have.
pub struct FileStore<T> {
    path: PathBuf,
    _records: PhantomData<fn() -> T>,
}

impl<T: Record> FileStore<T> {
    /// Creates a store backed by the given file path.
    ///
    /// The file is created on the first `create`/`update`; a missing
    /// file loads as `None`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _records: PhantomData,
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn write(&self, document: &ClientDocument<T>) -> ClientResult<()> {
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| ClientError::store(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| ClientError::store(e.to_string()))
    }
}

impl<T: Record> LocalStore<T> for FileStore<T>
where
    T: Send + Sync,
{
    fn load(&self) -> ClientResult<Option<ClientDocument<T>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json =
            std::fs::read_to_string(&self.path).map_err(|e| ClientError::store(e.to_string()))?;
        let document =
            serde_json::from_str(&json).map_err(|e| ClientError::store(e.to_string()))?;
        Ok(Some(document))
    }

    fn create(&self, document: &ClientDocument<T>) -> ClientResult<()> {
        self.write(document)
    }

    fn update(&self, document: &ClientDocument<T>) -> ClientResult<()> {
        self.write(document)
    }
}
