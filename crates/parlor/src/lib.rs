//! # Parlor
//!
//! A server hosting many concurrent rooms, each running one turn-based
//! mini-game (seeded dice, single-elimination roulette, or a multi-round
//! horse race) for a small group of named participants over WebSocket.
//!
//! This meta crate ties the layers together: transport → protocol →
//! session → room → game.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use parlor::ParlorServerBuilder;
//!
//! # async fn run() -> Result<(), parlor::ParlorError> {
//! let server = ParlorServerBuilder::new()
//!     .bind("0.0.0.0:9000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;
mod transport;

pub use error::ParlorError;
pub use server::{ParlorServer, ParlorServerBuilder, ServerConfig};
pub use transport::{TransportError, WsConn, WsListener};
