//! Room lifecycle management for Parlor.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! [`parlor_game::GameState`]: commands arrive on an mpsc channel and run
//! to completion one at a time, so all mutations of one room's state are
//! atomic relative to each other without locks.
//!
//! # Key types
//!
//! - [`RoomStore`] — creates rooms, routes to them, runs the expiry sweep
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`RoomSettings`] / [`RoomConfig`] — per-room and server-wide knobs
//! - [`Debouncer`] — leading+trailing coalescing for room-list fan-out
//! - [`RoomNotice`] — actor → server notifications (changed/closed/unseated)

mod broadcast;
mod error;
mod room;
mod settings;
mod store;

pub use broadcast::Debouncer;
pub use error::RoomError;
pub use room::{EventSender, JoinOutcome, RoomHandle, RoomNotice, RoomSnapshot};
pub use settings::{RoomConfig, RoomSettings};
pub use store::{visible_rooms, RoomStore};
