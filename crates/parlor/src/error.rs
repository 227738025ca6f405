//! Unified error type for the Parlor server.

use parlor_protocol::ProtocolError;
use parlor_room::RoomError;
use parlor_session::SessionError;

use crate::TransportError;

/// Top-level error wrapping all layer-specific errors.
///
/// The `#[from]` attributes let `?` convert layer errors automatically,
/// so server code deals with one type.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),
}
