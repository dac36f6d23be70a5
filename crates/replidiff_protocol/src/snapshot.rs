//! Snapshot conversion and patch recovery.
//!
//! Every snapshot is converted to its id-keyed form immediately before
//! a diff or patch and back to an ordered collection afterwards, so
//! reordering is never mistaken for an edit. This module also implements
//! the one-shot resurrect-from-history recovery used when a patch
//! references a record the base snapshot no longer contains.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::Record;
use replidiff_delta::{Delta, DeltaEngine, KeyedSnapshot};

/// Converts an ordered snapshot into its id-keyed form.
///
/// # Errors
///
/// Fails when a record does not serialize, or when two records share an
/// id.
pub fn to_keyed<T: Record>(records: &[T]) -> ProtocolResult<KeyedSnapshot> {
    let mut keyed = KeyedSnapshot::new();
    for record in records {
        let id = record.id().to_string();
        let value = serde_json::to_value(record).map_err(|source| ProtocolError::Encode {
            id: id.clone(),
            source,
        })?;
        if keyed.insert(id.clone(), value).is_some() {
            return Err(ProtocolError::DuplicateId { id });
        }
    }
    Ok(keyed)
}

/// Converts an id-keyed snapshot back into an ordered collection.
///
/// Records come back in id order; callers treat snapshots as logically
/// unordered.
pub fn from_keyed<T: Record>(keyed: KeyedSnapshot) -> ProtocolResult<Vec<T>> {
    keyed
        .into_values()
        .map(|value| serde_json::from_value(value).map_err(|source| ProtocolError::Decode { source }))
        .collect()
}

/// Diffs two snapshots in keyed form.
///
/// Returns `None` when the snapshots are structurally equal.
pub fn diff_snapshots<T: Record>(
    engine: &dyn DeltaEngine,
    before: &[T],
    after: &[T],
) -> ProtocolResult<Option<Delta>> {
    let keyed_before = to_keyed(before)?;
    let keyed_after = to_keyed(after)?;
    Ok(engine.diff(&keyed_before, &keyed_after))
}

/// Applies a delta to a snapshot, optionally recovering missing records.
///
/// When the patch fails because the delta updates a record id absent
/// from `base` (the record was deleted locally while the peer edited it
/// concurrently), and a `recovery` snapshot still containing that id
/// was supplied, the matching records are cloned from the recovery
/// snapshot into the base and the patch is retried exactly once. Any
/// other failure, a failed retry, or a missing recovery snapshot is
/// fatal for the operation.
pub fn patch_snapshot<T: Record>(
    engine: &dyn DeltaEngine,
    base: &[T],
    delta: &Delta,
    recovery: Option<&[T]>,
) -> ProtocolResult<Vec<T>> {
    let keyed = to_keyed(base)?;

    match engine.patch(&keyed, delta) {
        Ok(patched) => from_keyed(patched),
        Err(err) if err.is_recoverable() => {
            let Some(history) = recovery else {
                return Err(err.into());
            };

            let historical = to_keyed(history)?;
            let mut resurrected = keyed;
            for id in delta.ids() {
                if !resurrected.contains_key(id) {
                    if let Some(value) = historical.get(id) {
                        resurrected.insert(id.to_string(), value.clone());
                    }
                }
            }

            let patched = engine.patch(&resurrected, delta)?;
            from_keyed(patched)
        }
        Err(err) => Err(err.into()),
    }
}
