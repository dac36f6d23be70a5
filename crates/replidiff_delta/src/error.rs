//! Error types for the delta engine.

use thiserror::Error;

/// Result type for delta operations.
pub type DeltaResult<T> = Result<T, DeltaError>;

/// Errors that can occur while applying a delta.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeltaError {
    /// The delta updates a record the base snapshot does not contain.
    ///
    /// This is the recoverable case: callers holding a historical
    /// snapshot that still contains the record may resurrect it and
    /// retry (see the snapshot layer).
    #[error("delta references missing record {id:?}")]
    MissingEntry {
        /// Id of the missing record.
        id: String,
    },

    /// A nested field update targets a field the base value lacks.
    #[error("delta references missing field {field:?} of record {id:?}")]
    MissingField {
        /// Id of the record being patched.
        id: String,
        /// Name of the missing field.
        field: String,
    },

    /// The base value has a different shape than the delta expects.
    #[error("record {id:?}: expected {expected} value")]
    TypeMismatch {
        /// Id of the record being patched.
        id: String,
        /// The JSON shape the delta expected.
        expected: &'static str,
    },

    /// A text splice addresses characters beyond the base string.
    #[error("record {id:?}: splice at {index}+{remove} exceeds string length {len}")]
    SpliceOutOfRange {
        /// Id of the record being patched.
        id: String,
        /// Length of the base string in characters.
        len: usize,
        /// Splice start offset.
        index: usize,
        /// Number of characters the splice removes.
        remove: usize,
    },
}

impl DeltaError {
    /// Returns the id of the record the failed operation referenced.
    pub fn record_id(&self) -> &str {
        match self {
            DeltaError::MissingEntry { id }
            | DeltaError::MissingField { id, .. }
            | DeltaError::TypeMismatch { id, .. }
            | DeltaError::SpliceOutOfRange { id, .. } => id,
        }
    }

    /// Returns true if supplying a recovery snapshot could fix this failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DeltaError::MissingEntry { .. })
    }
}
