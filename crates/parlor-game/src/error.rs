//! Error types for the game engines.

use parlor_protocol::ErrorKind;

use crate::rng::MAX_ROLL;

/// Errors a game engine can reject an action with.
///
/// Rejections never mutate state; the room actor maps each error onto the
/// wire taxonomy via [`GameError::kind`] and sends it to the originating
/// connection only.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The roll range failed validation.
    #[error("roll range must satisfy 1 <= min <= max <= {MAX_ROLL}, got {min}..={max}")]
    InvalidRange { min: u32, max: u32 },

    /// A non-host attempted a host-only action.
    #[error("only the host can {0}")]
    HostOnly(&'static str),

    /// The action is invalid for the room's current game state.
    #[error("{0}")]
    InvalidState(String),

    /// No seat with this name.
    #[error("no user named {0}")]
    UserNotFound(String),

    /// The vehicle index is out of range for this race.
    #[error("no vehicle at index {0}")]
    InvalidVehicle(usize),

    /// Another contestant already bet this vehicle.
    #[error("vehicle {0} is already claimed")]
    VehicleTaken(usize),
}

impl GameError {
    /// Maps the error onto the wire-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRange { .. } | Self::InvalidVehicle(_) => {
                ErrorKind::Validation
            }
            Self::HostOnly(_) => ErrorKind::Permission,
            Self::InvalidState(_) | Self::VehicleTaken(_) => ErrorKind::State,
            Self::UserNotFound(_) => ErrorKind::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_taxonomy() {
        assert_eq!(
            GameError::InvalidRange { min: 0, max: 5 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            GameError::HostOnly("start the game").kind(),
            ErrorKind::Permission
        );
        assert_eq!(
            GameError::InvalidState("spinning".into()).kind(),
            ErrorKind::State
        );
        assert_eq!(
            GameError::UserNotFound("ghost".into()).kind(),
            ErrorKind::NotFound
        );
    }
}
