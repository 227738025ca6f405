//! Error types for the session layer.

use parlor_protocol::ConnId;

/// Errors that can occur in connection bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A connection id was bound twice. Ids are unique per accept, so
    /// this indicates a transport-layer bug.
    #[error("connection {0} is already bound")]
    AlreadyBound(ConnId),

    /// No entry for this connection (never bound, or already unbound).
    #[error("connection {0} not found")]
    NotFound(ConnId),

    /// The connection exceeded its event window. Advisory: the event is
    /// dropped with no side effects.
    #[error("connection {0} exceeded the event rate limit")]
    RateLimited(ConnId),
}
