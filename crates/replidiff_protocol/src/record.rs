//! The record contract.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A synchronizable record.
///
/// The protocol requires only a stable, unique, string-valued id; every
/// other field is an opaque payload the delta engine diffs structurally.
/// Records must serialize to a JSON object so that field-level diffs can
/// address into them.
///
/// # Example
///
/// ```
/// use replidiff_protocol::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Task {
///     id: String,
///     title: String,
///     done: bool,
/// }
///
/// impl Record for Task {
///     fn id(&self) -> &str {
///         &self.id
///     }
/// }
/// ```
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// Returns the record's stable unique identifier.
    ///
    /// The id must not change over the record's lifetime; the protocol
    /// keys every diff, patch and store operation on it.
    fn id(&self) -> &str;
}
