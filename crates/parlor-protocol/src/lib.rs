//! Wire protocol for Parlor.
//!
//! This crate defines the "language" that Parlor speaks with its clients:
//!
//! - **Ids and shared types** ([`ConnId`], [`RoomId`], [`GameKind`],
//!   history records, spin/gimmick contracts) — the structures that
//!   travel on the wire.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) — the full event
//!   surface consumed by the browser-side collaborators.
//! - **Codec** ([`encode_event`], [`decode_event`]) — JSON text framing.
//! - **Errors** ([`ProtocolError`], wire [`ErrorKind`] taxonomy).
//!
//! The protocol layer sits below everything else: it knows nothing about
//! connections, rooms, or game rules — only how messages are shaped.

mod codec;
mod error;
mod events;
mod types;

pub use codec::{decode_event, encode_event};
pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use types::{
    ConnId, ErrorKind, FinishRule, GameKind, GimmickEvent, GimmickKind,
    HistoryEntry, RaceRecord, Recipient, RollRecord, RoomId, RoomSummary,
    SpinContract, SpinEffect, SpinEffectKind, SpinRecord, UserEntry, Vehicle,
};
