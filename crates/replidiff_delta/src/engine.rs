//! The delta engine trait and its JSON implementation.

use crate::delta::{Delta, KeyedSnapshot, ValueDelta};
use crate::error::{DeltaError, DeltaResult};
use serde_json::Value;
use std::collections::BTreeMap;

/// Tuning options for [`JsonDeltaEngine`].
#[derive(Debug, Clone)]
pub struct DeltaOptions {
    /// Minimum length, in characters, of both sides of a string change
    /// before the engine emits an in-place splice instead of replacing
    /// the whole string. A tuning parameter, not a protocol contract.
    pub text_diff_min_len: usize,
}

impl DeltaOptions {
    /// Creates options with the default text diff threshold.
    pub fn new() -> Self {
        Self {
            text_diff_min_len: 60,
        }
    }

    /// Sets the minimum string length for in-place text diffing.
    pub fn with_text_diff_min_len(mut self, len: usize) -> Self {
        self.text_diff_min_len = len;
        self
    }
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A structural diff/patch engine over id-keyed snapshots.
///
/// The sync protocol consumes exactly these two operations and treats
/// the [`Delta`] they exchange as opaque. Implementations must be pure:
/// neither operation may mutate its inputs, and `patch` must leave the
/// base untouched when it fails.
pub trait DeltaEngine: Send + Sync {
    /// Computes the structural difference between two keyed snapshots.
    ///
    /// Returns `None` when the snapshots are structurally equal.
    fn diff(&self, before: &KeyedSnapshot, after: &KeyedSnapshot) -> Option<Delta>;

    /// Applies a delta to a base snapshot, yielding the patched snapshot.
    ///
    /// # Errors
    ///
    /// Fails with [`DeltaError::MissingEntry`] when the delta updates a
    /// record id absent from `base`; with other [`DeltaError`] variants
    /// when a nested operation does not fit the base value's shape.
    fn patch(&self, base: &KeyedSnapshot, delta: &Delta) -> DeltaResult<KeyedSnapshot>;
}

/// The default delta engine over `serde_json::Value` records.
///
/// Per record id the delta distinguishes creation, deletion, whole-value
/// replacement, nested field-level diffs for objects, and in-place
/// splices for strings at least [`DeltaOptions::text_diff_min_len`]
/// characters long on both sides.
#[derive(Debug, Clone, Default)]
pub struct JsonDeltaEngine {
    options: DeltaOptions,
}

impl JsonDeltaEngine {
    /// Creates an engine with default options.
    pub fn new() -> Self {
        Self {
            options: DeltaOptions::new(),
        }
    }

    /// Creates an engine with the given options.
    pub fn with_options(options: DeltaOptions) -> Self {
        Self { options }
    }

    /// Returns the engine's options.
    pub fn options(&self) -> &DeltaOptions {
        &self.options
    }

    fn diff_value(&self, old: &Value, new: &Value) -> Option<ValueDelta> {
        if old == new {
            return None;
        }

        match (old, new) {
            (Value::Object(before), Value::Object(after)) => {
                let mut fields = BTreeMap::new();
                for (key, old_field) in before {
                    match after.get(key) {
                        None => {
                            fields.insert(key.clone(), ValueDelta::Remove);
                        }
                        Some(new_field) => {
                            if let Some(change) = self.diff_value(old_field, new_field) {
                                fields.insert(key.clone(), change);
                            }
                        }
                    }
                }
                for (key, new_field) in after {
                    if !before.contains_key(key) {
                        fields.insert(
                            key.clone(),
                            ValueDelta::Insert {
                                value: new_field.clone(),
                            },
                        );
                    }
                }
                if fields.is_empty() {
                    None
                } else {
                    Some(ValueDelta::Object { fields })
                }
            }
            (Value::String(before), Value::String(after))
                if before.chars().count() >= self.options.text_diff_min_len
                    && after.chars().count() >= self.options.text_diff_min_len =>
            {
                Some(splice_strings(before, after))
            }
            _ => Some(ValueDelta::Replace { value: new.clone() }),
        }
    }

    fn patch_object(
        &self,
        id: &str,
        base: &Value,
        fields: &BTreeMap<String, ValueDelta>,
    ) -> DeltaResult<Value> {
        let Value::Object(map) = base else {
            return Err(DeltaError::TypeMismatch {
                id: id.to_string(),
                expected: "object",
            });
        };

        let mut out = map.clone();
        for (field, change) in fields {
            match change {
                ValueDelta::Insert { value } => {
                    out.insert(field.clone(), value.clone());
                }
                ValueDelta::Remove => {
                    out.remove(field);
                }
                ValueDelta::Replace { value } => {
                    if !out.contains_key(field) {
                        return Err(DeltaError::MissingField {
                            id: id.to_string(),
                            field: field.clone(),
                        });
                    }
                    out.insert(field.clone(), value.clone());
                }
                ValueDelta::Object { fields: nested } => {
                    let current = out.get(field).ok_or_else(|| DeltaError::MissingField {
                        id: id.to_string(),
                        field: field.clone(),
                    })?;
                    let patched = self.patch_object(id, current, nested)?;
                    out.insert(field.clone(), patched);
                }
                ValueDelta::Splice {
                    index,
                    remove,
                    insert,
                } => {
                    let current = out.get(field).ok_or_else(|| DeltaError::MissingField {
                        id: id.to_string(),
                        field: field.clone(),
                    })?;
                    let patched = splice_apply(id, current, *index, *remove, insert)?;
                    out.insert(field.clone(), patched);
                }
            }
        }
        Ok(Value::Object(out))
    }
}

impl DeltaEngine for JsonDeltaEngine {
    fn diff(&self, before: &KeyedSnapshot, after: &KeyedSnapshot) -> Option<Delta> {
        let mut entries = BTreeMap::new();

        for (id, old) in before {
            match after.get(id) {
                None => {
                    entries.insert(id.clone(), ValueDelta::Remove);
                }
                Some(new) => {
                    if let Some(change) = self.diff_value(old, new) {
                        entries.insert(id.clone(), change);
                    }
                }
            }
        }
        for (id, new) in after {
            if !before.contains_key(id) {
                entries.insert(id.clone(), ValueDelta::Insert { value: new.clone() });
            }
        }

        if entries.is_empty() {
            None
        } else {
            Some(Delta::from_entries(entries))
        }
    }

    fn patch(&self, base: &KeyedSnapshot, delta: &Delta) -> DeltaResult<KeyedSnapshot> {
        let mut out = base.clone();

        for (id, change) in delta.iter() {
            match change {
                ValueDelta::Insert { value } => {
                    out.insert(id.clone(), value.clone());
                }
                // Deleting an already-absent record is a no-op.
                ValueDelta::Remove => {
                    out.remove(id.as_str());
                }
                ValueDelta::Replace { value } => {
                    if !out.contains_key(id.as_str()) {
                        return Err(DeltaError::MissingEntry { id: id.clone() });
                    }
                    out.insert(id.clone(), value.clone());
                }
                ValueDelta::Object { fields } => {
                    let current =
                        out.get(id.as_str())
                            .ok_or_else(|| DeltaError::MissingEntry { id: id.clone() })?;
                    let patched = self.patch_object(id, current, fields)?;
                    out.insert(id.clone(), patched);
                }
                ValueDelta::Splice {
                    index,
                    remove,
                    insert,
                } => {
                    let current =
                        out.get(id.as_str())
                            .ok_or_else(|| DeltaError::MissingEntry { id: id.clone() })?;
                    let patched = splice_apply(id, current, *index, *remove, insert)?;
                    out.insert(id.clone(), patched);
                }
            }
        }
        Ok(out)
    }
}

/// Computes an in-place splice from the common prefix and suffix of two
/// strings. Offsets are in characters, not bytes.
fn splice_strings(before: &str, after: &str) -> ValueDelta {
    let old: Vec<char> = before.chars().collect();
    let new: Vec<char> = after.chars().collect();

    let mut prefix = 0;
    while prefix < old.len() && prefix < new.len() && old[prefix] == new[prefix] {
        prefix += 1;
    }

    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < new.len() - prefix
        && old[old.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }

    ValueDelta::Splice {
        index: prefix,
        remove: old.len() - prefix - suffix,
        insert: new[prefix..new.len() - suffix].iter().collect(),
    }
}

fn splice_apply(id: &str, base: &Value, index: usize, remove: usize, insert: &str) -> DeltaResult<Value> {
    let Value::String(text) = base else {
        return Err(DeltaError::TypeMismatch {
            id: id.to_string(),
            expected: "string",
        });
    };

    let chars: Vec<char> = text.chars().collect();
    if index + remove > chars.len() {
        return Err(DeltaError::SpliceOutOfRange {
            id: id.to_string(),
            len: chars.len(),
            index,
            remove,
        });
    }

    let mut out: String = chars[..index].iter().collect();
    out.push_str(insert);
    out.extend(&chars[index + remove..]);
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keyed(records: &[Value]) -> KeyedSnapshot {
        records
            .iter()
            .map(|r| (r["id"].as_str().unwrap().to_string(), r.clone()))
            .collect()
    }

    #[test]
    fn diff_equal_snapshots_is_none() {
        let engine = JsonDeltaEngine::new();
        let snap = keyed(&[json!({"id": "a", "title": "one"})]);
        assert!(engine.diff(&snap, &snap).is_none());
    }

    #[test]
    fn diff_detects_create_update_delete() {
        let engine = JsonDeltaEngine::new();
        let before = keyed(&[
            json!({"id": "a", "title": "one"}),
            json!({"id": "b", "title": "two"}),
        ]);
        let after = keyed(&[
            json!({"id": "a", "title": "changed"}),
            json!({"id": "c", "title": "three"}),
        ]);

        let delta = engine.diff(&before, &after).unwrap();
        assert_eq!(delta.len(), 3);
        assert!(matches!(delta.get("a"), Some(ValueDelta::Object { .. })));
        assert_eq!(delta.get("b"), Some(&ValueDelta::Remove));
        assert!(matches!(delta.get("c"), Some(ValueDelta::Insert { .. })));
    }

    #[test]
    fn diff_is_order_insensitive() {
        let engine = JsonDeltaEngine::new();
        let one = json!({"id": "a", "n": 1});
        let two = json!({"id": "b", "n": 2});

        let before = keyed(&[one.clone(), two.clone()]);
        let after = keyed(&[two, one]);
        assert!(engine.diff(&before, &after).is_none());
    }

    #[test]
    fn nested_field_diff() {
        let engine = JsonDeltaEngine::new();
        let before = keyed(&[json!({"id": "a", "meta": {"done": false, "prio": 2}})]);
        let after = keyed(&[json!({"id": "a", "meta": {"done": true, "prio": 2}})]);

        let delta = engine.diff(&before, &after).unwrap();
        let Some(ValueDelta::Object { fields }) = delta.get("a") else {
            panic!("expected object delta");
        };
        let Some(ValueDelta::Object { fields: meta }) = fields.get("meta") else {
            panic!("expected nested object delta");
        };
        assert_eq!(
            meta.get("done"),
            Some(&ValueDelta::Replace { value: json!(true) })
        );
        assert!(!meta.contains_key("prio"));
    }

    #[test]
    fn patch_roundtrip() {
        let engine = JsonDeltaEngine::new();
        let before = keyed(&[
            json!({"id": "a", "title": "one"}),
            json!({"id": "b", "title": "two"}),
        ]);
        let after = keyed(&[
            json!({"id": "b", "title": "changed"}),
            json!({"id": "c", "title": "three"}),
        ]);

        let delta = engine.diff(&before, &after).unwrap();
        let patched = engine.patch(&before, &delta).unwrap();
        assert_eq!(patched, after);
    }

    #[test]
    fn patch_update_on_missing_id_fails() {
        let engine = JsonDeltaEngine::new();
        let before = keyed(&[json!({"id": "a", "title": "one"})]);
        let after = keyed(&[json!({"id": "a", "title": "changed"})]);
        let delta = engine.diff(&before, &after).unwrap();

        let empty = KeyedSnapshot::new();
        let err = engine.patch(&empty, &delta).unwrap_err();
        assert_eq!(err, DeltaError::MissingEntry { id: "a".into() });
        assert!(err.is_recoverable());
    }

    #[test]
    fn patch_remove_on_missing_id_is_noop() {
        let engine = JsonDeltaEngine::new();
        let before = keyed(&[json!({"id": "a", "title": "one"})]);
        let delta = engine.diff(&before, &KeyedSnapshot::new()).unwrap();

        let empty = KeyedSnapshot::new();
        let patched = engine.patch(&empty, &delta).unwrap();
        assert!(patched.is_empty());
    }

    #[test]
    fn patch_insert_on_missing_id_succeeds() {
        let engine = JsonDeltaEngine::new();
        let record = json!({"id": "a", "title": "one"});
        let delta = engine
            .diff(&KeyedSnapshot::new(), &keyed(&[record.clone()]))
            .unwrap();

        let patched = engine.patch(&KeyedSnapshot::new(), &delta).unwrap();
        assert_eq!(patched.get("a"), Some(&record));
    }

    #[test]
    fn long_strings_use_splice() {
        let engine = JsonDeltaEngine::with_options(DeltaOptions::new().with_text_diff_min_len(5));
        let before = keyed(&[json!({"id": "a", "body": "the quick brown fox"})]);
        let after = keyed(&[json!({"id": "a", "body": "the quick red fox"})]);

        let delta = engine.diff(&before, &after).unwrap();
        let Some(ValueDelta::Object { fields }) = delta.get("a") else {
            panic!("expected object delta");
        };
        assert!(matches!(fields.get("body"), Some(ValueDelta::Splice { .. })));

        let patched = engine.patch(&before, &delta).unwrap();
        assert_eq!(patched, after);
    }

    #[test]
    fn short_strings_are_replaced_whole() {
        let engine = JsonDeltaEngine::new();
        let before = keyed(&[json!({"id": "a", "title": "one"})]);
        let after = keyed(&[json!({"id": "a", "title": "two"})]);

        let delta = engine.diff(&before, &after).unwrap();
        let Some(ValueDelta::Object { fields }) = delta.get("a") else {
            panic!("expected object delta");
        };
        assert_eq!(
            fields.get("title"),
            Some(&ValueDelta::Replace { value: json!("two") })
        );
    }

    #[test]
    fn splice_survives_multibyte_text() {
        let engine = JsonDeltaEngine::with_options(DeltaOptions::new().with_text_diff_min_len(4));
        let before = keyed(&[json!({"id": "a", "body": "grüße aus köln"})]);
        let after = keyed(&[json!({"id": "a", "body": "grüße aus bonn"})]);

        let delta = engine.diff(&before, &after).unwrap();
        let patched = engine.patch(&before, &delta).unwrap();
        assert_eq!(patched, after);
    }

    #[test]
    fn splice_out_of_range_fails() {
        let engine = JsonDeltaEngine::new();
        let mut entries = BTreeMap::new();
        entries.insert(
            "a".to_string(),
            ValueDelta::Splice {
                index: 10,
                remove: 5,
                insert: "x".into(),
            },
        );
        let delta = Delta::from_entries(entries);
        let base = keyed(&[json!({"id": "a"})]);

        // Record "a" is not a string at the top level.
        let err = engine.patch(&base, &delta).unwrap_err();
        assert!(matches!(err, DeltaError::TypeMismatch { .. }));
    }

    #[test]
    fn patch_does_not_mutate_base() {
        let engine = JsonDeltaEngine::new();
        let before = keyed(&[json!({"id": "a", "title": "one"})]);
        let after = keyed(&[json!({"id": "a", "title": "two"})]);
        let delta = engine.diff(&before, &after).unwrap();

        let snapshot = before.clone();
        let _ = engine.patch(&before, &delta).unwrap();
        assert_eq!(before, snapshot);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // A splice computed from two strings always reconstructs
            // the target when applied to the source.
            #[test]
            fn splice_reconstructs_target(before in "[abc ]{0,12}", after in "[abc ]{0,12}") {
                prop_assume!(before != after);

                let ValueDelta::Splice { index, remove, insert } =
                    splice_strings(&before, &after)
                else {
                    panic!("splice_strings always yields a splice");
                };

                let patched =
                    splice_apply("r", &Value::String(before.clone()), index, remove, &insert)
                        .unwrap();
                prop_assert_eq!(patched, Value::String(after));
            }
        }
    }
}
