//! Delta representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An id-keyed snapshot ready for diffing.
///
/// Snapshots are ordered collections on the outside, but every diff and
/// patch runs over this keyed form so that reordering is never mistaken
/// for an edit.
pub type KeyedSnapshot = BTreeMap<String, Value>;

/// A change to a single value.
///
/// At the top level of a [`Delta`] the value is a whole record; inside
/// an `Object` entry it is one field of a record, recursively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ValueDelta {
    /// The value is new: insert it.
    Insert {
        /// The inserted value.
        value: Value,
    },
    /// The value was removed.
    Remove,
    /// The value changed wholesale: replace it.
    Replace {
        /// The replacement value.
        value: Value,
    },
    /// The value is an object and only some fields changed.
    Object {
        /// Per-field changes.
        fields: BTreeMap<String, ValueDelta>,
    },
    /// The value is a long string edited in place.
    Splice {
        /// Start of the edited range, in characters.
        index: usize,
        /// Number of characters removed.
        remove: usize,
        /// Replacement text.
        insert: String,
    },
}

impl ValueDelta {
    /// Returns true if applying this change requires the target to
    /// already exist in the base.
    pub fn requires_base(&self) -> bool {
        matches!(
            self,
            ValueDelta::Replace { .. } | ValueDelta::Object { .. } | ValueDelta::Splice { .. }
        )
    }
}

/// A structural diff between two keyed snapshots, keyed by record id.
///
/// A delta is opaque to the sync protocol: it travels inside an edit and
/// is only interpreted by the engine that produced it. An absent delta
/// (`Option::None` from `diff`) denotes "no change"; a `Delta` value is
/// always non-empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delta {
    entries: BTreeMap<String, ValueDelta>,
}

impl Delta {
    /// Creates a delta from per-record changes.
    pub fn from_entries(entries: BTreeMap<String, ValueDelta>) -> Self {
        Self { entries }
    }

    /// Returns true if the delta contains no changes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of records the delta touches.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the change for a record id, if any.
    pub fn get(&self, id: &str) -> Option<&ValueDelta> {
        self.entries.get(id)
    }

    /// Iterates over the record ids the delta references.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over `(id, change)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ValueDelta)> {
        self.entries.iter()
    }
}
