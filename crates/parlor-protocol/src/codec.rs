//! JSON text framing for the event surface.
//!
//! Parlor speaks JSON over WebSocket text frames — the clients are
//! browsers, so human-readable framing doubles as the debugging story.
//! Encoding and decoding are concrete functions rather than a pluggable
//! codec: there is exactly one wire format.

use crate::{ClientEvent, ProtocolError, ServerEvent};

/// Serializes a server event to a JSON text frame.
pub fn encode_event(event: &ServerEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

/// Parses a JSON text frame into a client event.
///
/// # Errors
/// Returns [`ProtocolError::Decode`] for malformed JSON, unknown event
/// types, or missing required fields.
pub fn decode_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

// =========================================================================
// Tests
// =========================================================================
