//! Record-granular store reconciliation.
//!
//! After a sync call the working store is reconciled against the store
//! as it was when the call began, by id-set comparison against the
//! delta's key set. Each classified operation is applied individually
//! through the persistence seam, never as a bulk replace, so downstream
//! collaborators observe per-record history.

use replidiff_delta::Delta;
use replidiff_protocol::Record;
use std::collections::BTreeSet;

/// A single record-level store operation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp<T> {
    /// The record exists in both states and the delta touched it.
    Update(T),
    /// The record only exists in the new state.
    Create(T),
    /// The record only exists in the old state; it carries the last
    /// stored value so callers can log or archive it.
    Delete(T),
}

/// Classifies the difference between two store states into per-record
/// operations.
///
/// Only ids present in the delta's key set are considered:
/// - in the delta and both id-sets: update
/// - in the delta and the new id-set only: create
/// - in the delta and the old id-set only: delete
pub fn classify<T: Record>(delta: &Delta, old_state: &[T], new_state: &[T]) -> Vec<StoreOp<T>> {
    let delta_ids: BTreeSet<&str> = delta.ids().collect();
    let old_ids: BTreeSet<&str> = old_state.iter().map(Record::id).collect();
    let new_ids: BTreeSet<&str> = new_state.iter().map(Record::id).collect();

    let mut operations = Vec::new();

    for record in new_state {
        let id = record.id();
        if delta_ids.contains(id) && old_ids.contains(id) {
            operations.push(StoreOp::Update(record.clone()));
        }
    }
    for record in new_state {
        let id = record.id();
        if delta_ids.contains(id) && !old_ids.contains(id) {
            operations.push(StoreOp::Create(record.clone()));
        }
    }
    for record in old_state {
        let id = record.id();
        if delta_ids.contains(id) && !new_ids.contains(id) {
            operations.push(StoreOp::Delete(record.clone()));
        }
    }

    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use replidiff_delta::{DeltaEngine, JsonDeltaEngine};
    use replidiff_protocol::to_keyed;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Task {
        id: String,
        title: String,
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
        }
    }

    fn diff(old_state: &[Task], new_state: &[Task]) -> Delta {
        JsonDeltaEngine::new()
            .diff(&to_keyed(old_state).unwrap(), &to_keyed(new_state).unwrap())
            .unwrap()
    }

    #[test]
    fn classifies_update_create_delete() {
        let old_state = vec![task("a", "one"), task("b", "two")];
        let new_state = vec![task("a", "renamed"), task("c", "three")];
        let delta = diff(&old_state, &new_state);

        let ops = classify(&delta, &old_state, &new_state);
        assert_eq!(
            ops,
            vec![
                StoreOp::Update(task("a", "renamed")),
                StoreOp::Create(task("c", "three")),
                StoreOp::Delete(task("b", "two")),
            ]
        );
    }

    #[test]
    fn untouched_records_are_ignored() {
        let old_state = vec![task("a", "one"), task("b", "two")];
        let new_state = vec![task("a", "one"), task("b", "changed")];
        let delta = diff(&old_state, &new_state);

        let ops = classify(&delta, &old_state, &new_state);
        // "a" did not change, so the delta does not reference it.
        assert_eq!(ops, vec![StoreOp::Update(task("b", "changed"))]);
    }

    #[test]
    fn updates_come_before_creates_and_deletes() {
        let old_state = vec![task("z", "zed")];
        let new_state = vec![task("a", "new"), task("z", "zed!")];
        let delta = diff(&old_state, &new_state);

        let ops = classify(&delta, &old_state, &new_state);
        assert!(matches!(ops[0], StoreOp::Update(_)));
        assert!(matches!(ops[1], StoreOp::Create(_)));
    }
}
