//! Error types for the room layer.

use parlor_game::GameError;
use parlor_protocol::{ErrorKind, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// No seat slots left (capacity is capped at 50).
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// Wrong password for a private room.
    #[error("wrong password for room {0}")]
    BadPassword(RoomId),

    /// Display name failed validation.
    #[error("display names must be 1 to 24 characters")]
    InvalidName,

    /// The room enforces one seat per source address.
    #[error("a seat from this address already exists in room {0}")]
    IpAlreadySeated(RoomId),

    /// The connection has no seat in this room.
    #[error("you are not seated in this room")]
    NotSeated,

    /// The room's command channel is closed — it is shutting down.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// A game engine rejected the action.
    #[error(transparent)]
    Game(#[from] GameError),
}

impl RoomError {
    /// Maps the error onto the wire-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::Unavailable(_) => ErrorKind::NotFound,
            Self::BadPassword(_) | Self::InvalidName => ErrorKind::Validation,
            Self::RoomFull(_) | Self::IpAlreadySeated(_) | Self::NotSeated => {
                ErrorKind::State
            }
            Self::Game(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_taxonomy() {
        let id = RoomId("ABC123".into());
        assert_eq!(RoomError::NotFound(id.clone()).kind(), ErrorKind::NotFound);
        assert_eq!(
            RoomError::BadPassword(id.clone()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(RoomError::RoomFull(id).kind(), ErrorKind::State);
        assert_eq!(
            RoomError::Game(GameError::HostOnly("kick players")).kind(),
            ErrorKind::Permission
        );
    }
}
