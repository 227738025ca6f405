//! Game state machines for Parlor.
//!
//! Everything in this crate is synchronous and free of I/O: engines are
//! plain functions over `&mut GameState` that return `(Recipient,
//! ServerEvent)` pairs for the room actor to dispatch. Randomness comes
//! in through a caller-supplied [`rand::Rng`], so every transition is
//! reproducible under test.
//!
//! # Key pieces
//!
//! - [`GameState`] — the per-room envelope (seats, ready roster, frozen
//!   round roster, history) plus a [`GameVariant`] payload
//! - [`seeded_roll`] — the deterministic, auditable dice draw
//! - [`dice`], [`roulette`], [`horse`] — the three round engines

pub mod dice;
mod error;
pub mod horse;
mod rng;
pub mod roulette;
mod state;

pub use error::GameError;
pub use rng::{seeded_roll, MAX_ROLL};
pub use state::{
    unix_ms, DiceState, GameState, GameVariant, HorseState, RacePhase,
    RouletteState, Seat, SeatLink,
};

/// Events an engine hands back to the room actor for delivery.
pub type Outbound = Vec<(parlor_protocol::Recipient, parlor_protocol::ServerEvent)>;
