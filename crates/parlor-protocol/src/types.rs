//! Core protocol types shared between client and server events.
//!
//! Everything here is serialized with camelCase names because the
//! consumers of this surface are browser-side collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a live connection.
///
/// Newtype over `u64` so a connection id can't be confused with any other
/// counter. Assigned by the transport on accept; a reconnecting client
/// gets a fresh `ConnId` and is relinked to its old seat by room + name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c-{}", self.0)
    }
}

/// A room identifier: a short random code like `K7QX2M`.
///
/// Codes are generated server-side on room creation and typed by players
/// joining by hand, so they are short, uppercase, and unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Game kinds
// ---------------------------------------------------------------------------

/// Which mini-game a room runs. Fixed at room creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameKind {
    Dice,
    Roulette,
    HorseRace,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dice => write!(f, "dice"),
            Self::Roulette => write!(f, "roulette"),
            Self::HorseRace => write!(f, "horseRace"),
        }
    }
}

// ---------------------------------------------------------------------------
// Recipient — who should receive a server event?
// ---------------------------------------------------------------------------

/// Specifies who should receive a server event emitted by a game engine.
///
/// Engines return `(Recipient, ServerEvent)` pairs; the room actor
/// resolves recipients against its seat list when dispatching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every linked seat in the room.
    All,
    /// One specific connection.
    Conn(ConnId),
    /// Everyone except the specified connection.
    AllExcept(ConnId),
}

// ---------------------------------------------------------------------------
// Room listings
// ---------------------------------------------------------------------------

/// A summary of a room in `roomsListUpdated` broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub title: String,
    pub game_kind: GameKind,
    pub is_private: bool,
    pub has_password: bool,
    /// Number of occupied seats.
    pub players: usize,
    pub capacity: usize,
}

/// A seated participant as shown in `updateUsers` / `roomJoined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    pub name: String,
    pub is_host: bool,
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// The wire-level error taxonomy.
///
/// Every rejection goes back to the originating connection only, as an
/// `error { kind, message }` event with one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Bad name/id/range/password. No state was mutated.
    Validation,
    /// A non-host attempted a host-only action.
    Permission,
    /// The action is invalid in the room's current state.
    State,
    /// Advisory throttle: the event was dropped.
    RateLimit,
    /// Room or user not found.
    NotFound,
}

// ---------------------------------------------------------------------------
// History records
// ---------------------------------------------------------------------------

/// A single seeded dice roll, kept in the room's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollRecord {
    pub user: String,
    pub result: u32,
    pub min: u32,
    pub max: u32,
    /// The client-supplied seed the result was derived from, kept so the
    /// outcome can be re-derived and audited after the fact.
    pub seed: String,
    /// Unix milliseconds.
    pub time: u64,
    /// `true` if the roll happened inside an active round by a roster member.
    pub in_round: bool,
    /// Set on rolls outside an active round (or by non-roster seats).
    pub not_ready: bool,
}

/// One completed roulette spin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinRecord {
    pub participants: Vec<String>,
    pub winner: String,
    pub time: u64,
}

/// One completed horse-race round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceRecord {
    pub round: u32,
    pub roster: Vec<String>,
    /// name → vehicle index. BTreeMap for a stable wire order.
    pub bets: BTreeMap<String, usize>,
    /// Vehicle indices sorted by finish time, fastest first.
    pub rankings: Vec<usize>,
    pub winners: Vec<String>,
    pub time: u64,
}

/// An entry in a room's append-only result log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HistoryEntry {
    Roll(RollRecord),
    Spin(SpinRecord),
    Race(RaceRecord),
}

// ---------------------------------------------------------------------------
// Roulette spin contract
// ---------------------------------------------------------------------------

/// The finishing flourish a roulette spin ends with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpinEffectKind {
    Normal,
    Bounce,
    Shake,
    SlowCrawl,
}

/// Finishing-effect parameters, randomized per spin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinEffect {
    pub kind: SpinEffectKind,
    pub amplitude: f64,
    pub duration_ms: u64,
}

/// The single shared animation contract for a roulette spin.
///
/// Computed once server-side and broadcast verbatim so every client
/// renders an identical-looking spin landing on the same winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinContract {
    pub duration_ms: u64,
    /// Total rotation in degrees, including the fraction that parks the
    /// wheel on the winner's slot.
    pub total_rotation: f64,
    pub effect: SpinEffect,
}

// ---------------------------------------------------------------------------
// Horse race
// ---------------------------------------------------------------------------

/// The vehicle types a race can assign. 4–6 are drawn per room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Vehicle {
    Horse,
    Pony,
    Donkey,
    Camel,
    Ostrich,
    Zebra,
}

impl Vehicle {
    /// All vehicle types, in assignment-shuffle order.
    pub const ALL: [Vehicle; 6] = [
        Vehicle::Horse,
        Vehicle::Pony,
        Vehicle::Donkey,
        Vehicle::Camel,
        Vehicle::Ostrich,
        Vehicle::Zebra,
    ];
}

/// Which finish rank wins the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinishRule {
    /// The vehicle that finishes first wins.
    First,
    /// The vehicle that finishes last wins.
    Last,
}

/// A cosmetic mid-race animation event for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GimmickKind {
    Stop,
    Slow,
    Sprint,
    Slip,
    Wobble,
}

/// One gimmick occurrence. Generated once server-side and broadcast for
/// client-consistent playback; never affects the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GimmickEvent {
    pub vehicle: usize,
    pub kind: GimmickKind,
    pub at_ms: u64,
    pub duration_ms: u64,
}

// =========================================================================
// Tests
// =========================================================================
