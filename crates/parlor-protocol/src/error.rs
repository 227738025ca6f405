//! Error types for the protocol layer.

/// Errors that can occur while framing events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a server event failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// A client frame was malformed, incomplete, or of an unknown type.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but violates protocol rules.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}
