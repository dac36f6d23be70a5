//! Error types for protocol operations.

use replidiff_delta::DeltaError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur in snapshot conversion, recovery and wire coding.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A record failed to serialize into its keyed JSON form.
    #[error("failed to encode record {id:?}: {source}")]
    Encode {
        /// Id of the offending record.
        id: String,
        /// Underlying serialization error.
        source: serde_json::Error,
    },

    /// A keyed value failed to deserialize back into a record.
    #[error("failed to decode record: {source}")]
    Decode {
        /// Underlying deserialization error.
        source: serde_json::Error,
    },

    /// Two records in one snapshot share an id.
    #[error("duplicate record id {id:?} in snapshot")]
    DuplicateId {
        /// The duplicated id.
        id: String,
    },

    /// A patch failed and could not be recovered.
    ///
    /// Either no recovery snapshot was supplied, the recovery snapshot
    /// did not contain the missing record, or the failure was not a
    /// missing-record failure in the first place.
    #[error("unrecoverable patch: {0}")]
    Patch(#[from] DeltaError),

    /// A message failed to encode for the wire.
    #[error("wire encode failed: {0}")]
    WireEncode(String),

    /// Wire bytes failed to decode into a message.
    #[error("wire decode failed: {0}")]
    WireDecode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_error_wraps_delta_error() {
        let err: ProtocolError = DeltaError::MissingEntry { id: "x".into() }.into();
        assert!(err.to_string().contains("unrecoverable patch"));
        assert!(err.to_string().contains("\"x\""));
    }

    #[test]
    fn duplicate_id_display() {
        let err = ProtocolError::DuplicateId { id: "r1".into() };
        assert_eq!(err.to_string(), "duplicate record id \"r1\" in snapshot");
    }
}
