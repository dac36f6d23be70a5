//! Persistence seam for the server engine.

use crate::error::ServerResult;
use parking_lot::RwLock;
use replidiff_protocol::{Record, Shadow};
use std::collections::BTreeMap;

/// Server-side persistence for shadows and canonical records.
///
/// One shadow is stored per known replica id, independently of the
/// record store. Implementations must be safe for concurrent sync calls
/// from distinct replicas; the engine serializes nothing across calls.
pub trait Persistence<T: Record>: Send + Sync {
    /// Finds the shadow for a replica, if one exists.
    fn find_shadow(&self, replica_id: &str) -> ServerResult<Option<Shadow<T>>>;

    /// Returns all known shadows.
    fn all_shadows(&self) -> ServerResult<Vec<Shadow<T>>>;

    /// Persists a newly created shadow.
    fn save_shadow(&self, shadow: &Shadow<T>) -> ServerResult<()>;

    /// Persists an updated shadow.
    fn update_shadow(&self, shadow: &Shadow<T>) -> ServerResult<()>;

    /// Deletes the shadow for a replica.
    fn delete_shadow(&self, replica_id: &str) -> ServerResult<()>;

    /// Returns the canonical record snapshot.
    fn all_records(&self) -> ServerResult<Vec<T>>;

    /// Persists a newly created record.
    fn save_record(&self, record: &T) -> ServerResult<()>;

    /// Persists an updated record.
    fn update_record(&self, record: &T) -> ServerResult<()>;

    /// Deletes a record by id.
    fn delete_record(&self, id: &str) -> ServerResult<()>;
}

/// An in-memory persistence implementation.
///
/// Each operation takes an interior lock, so concurrent sync calls from
/// distinct replicas are safe. Intended for tests and as the reference
/// implementation of the seam.
pub struct MemoryPersistence<T> {
    shadows: RwLock<BTreeMap<String, Shadow<T>>>,
    records: RwLock<BTreeMap<String, T>>,
}

impl<T: Record> MemoryPersistence<T> {
    /// Creates an empty persistence store.
    pub fn new() -> Self {
        Self {
            shadows: RwLock::new(BTreeMap::new()),
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates a store pre-seeded with canonical records.
    pub fn with_records(records: Vec<T>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write();
            for record in records {
                map.insert(record.id().to_string(), record);
            }
        }
        store
    }

    /// Returns the number of stored records.
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Returns the number of known shadows.
    pub fn shadow_count(&self) -> usize {
        self.shadows.read().len()
    }
}

impl<T: Record> Default for MemoryPersistence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Persistence<T> for MemoryPersistence<T>
where
    T: Send + Sync,
{
    fn find_shadow(&self, replica_id: &str) -> ServerResult<Option<Shadow<T>>> {
        Ok(self.shadows.read().get(replica_id).cloned())
    }

    fn all_shadows(&self) -> ServerResult<Vec<Shadow<T>>> {
        Ok(self.shadows.read().values().cloned().collect())
    }

    fn save_shadow(&self, shadow: &Shadow<T>) -> ServerResult<()> {
        self.shadows
            .write()
            .insert(shadow.replica_id.clone(), shadow.clone());
        Ok(())
    }

    fn update_shadow(&self, shadow: &Shadow<T>) -> ServerResult<()> {
        self.save_shadow(shadow)
    }

    fn delete_shadow(&self, replica_id: &str) -> ServerResult<()> {
        self.shadows.write().remove(replica_id);
        Ok(())
    }

    fn all_records(&self) -> ServerResult<Vec<T>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn save_record(&self, record: &T) -> ServerResult<()> {
        self.records
            .write()
            .insert(record.id().to_string(), record.clone());
        Ok(())
    }

    fn update_record(&self, record: &T) -> ServerResult<()> {
        self.save_record(record)
    }

    fn delete_record(&self, id: &str) -> ServerResult<()> {
        self.records.write().remove(id);
        Ok(())
    }
}
