//! Connection bookkeeping for Parlor.
//!
//! This crate tracks live connections — who they are (IP, device tag),
//! where they sit (room + display name), how to reach them (outbound
//! sender), and how fast they're allowed to talk (per-connection rate
//! window). Seat-level reconnect state lives with the seats themselves
//! in `parlor-room`; this layer only knows transports.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)   ← seats, grace windows, game state
//!     ↕
//! Session layer (this) ← connection identity, routing, rate limits
//!     ↕
//! Transport (below)    ← raw WebSocket frames
//! ```

mod error;
mod limiter;
mod names;
mod registry;

pub use error::SessionError;
pub use limiter::RateWindow;
pub use names::dedupe_name;
pub use registry::{ConnEntry, ConnectionRegistry, RegistryConfig};
