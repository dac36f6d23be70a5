//! CBOR wire codec for protocol messages.
//!
//! The protocol only requires that messages be representable as a
//! serializable value; this codec is the reference framing used by the
//! byte-oriented transport adapters.

use crate::error::{ProtocolError, ProtocolResult};
use crate::messages::EditsMessage;

/// Encodes a message to CBOR bytes.
pub fn encode_message(message: &EditsMessage) -> ProtocolResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(message, &mut buf)
        .map_err(|e| ProtocolError::WireEncode(e.to_string()))?;
    Ok(buf)
}

/// Decodes a message from CBOR bytes.
pub fn decode_message(bytes: &[u8]) -> ProtocolResult<EditsMessage> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::WireDecode(e.to_string()))
}
