//! The client/server event surface.
//!
//! Both enums are internally tagged (`{"type": "createRoom", ...}`) with
//! camelCase tags and fields — the shape the browser collaborators speak.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{
    ErrorKind, GameKind, GimmickEvent, RollRecord, RoomId, RoomSummary,
    SpinContract, UserEntry, Vehicle,
};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Create a room and seat the sender as host.
    CreateRoom {
        /// The creator's display name.
        name: String,
        title: String,
        is_private: bool,
        #[serde(default)]
        password: Option<String>,
        game_kind: GameKind,
        /// Room lifetime; the expiry sweep deletes the room past this age.
        expiry_hours: u32,
        #[serde(default)]
        single_seat_per_ip: bool,
        #[serde(default)]
        device_id: Option<String>,
    },

    /// Join an existing room by id. A same-name join against a stale seat
    /// within the grace window is a reconnect, not a new seat.
    JoinRoom {
        room_id: RoomId,
        name: String,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        device_id: Option<String>,
    },

    LeaveRoom,

    /// Request an immediate room-list snapshot (also pushed, debounced).
    ListRooms,

    /// Opt in/out of the next round.
    ToggleReady,

    /// Host-only: freeze the ready roster and open a dice round.
    StartGame,

    /// Host-only: finalize the current dice round on demand.
    EndGame,

    /// Roll the dice. Allowed at any time; only in-round rolls by roster
    /// members count toward completion.
    RequestRoll {
        /// Client-supplied commitment the result is derived from.
        seed: String,
        #[serde(default)]
        min: Option<u32>,
        #[serde(default)]
        max: Option<u32>,
    },

    /// Host-only: spin the roulette over the ready roster.
    StartRoulette,

    /// The host's completion report after the spin animation finishes.
    /// Reports from other connections are dropped.
    RouletteResult { winner: String },

    /// Toggle a bet on a vehicle in the current race round.
    SelectHorse { vehicle_index: usize },

    /// Host-only.
    KickPlayer { target: String },

    /// Host-only.
    TransferHost { target: String },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything the server can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    RoomCreated {
        room: RoomSummary,
        /// The name the sender was seated under.
        you: String,
    },

    RoomJoined {
        room: RoomSummary,
        /// The name the sender was seated under (possibly suffixed).
        you: String,
        users: Vec<UserEntry>,
        /// `true` when this join relinked a stale seat.
        reconnected: bool,
        /// The race's fixed vehicle assignment; empty for other game kinds.
        vehicles: Vec<Vehicle>,
    },

    RoomLeft,

    /// The room is being deleted (expiry, or last seat gone).
    RoomDeleted { reason: String },

    /// Debounced room list, filtered per viewer's private-room membership.
    RoomsListUpdated { rooms: Vec<RoomSummary> },

    /// Reply to the sender's own `toggleReady`.
    ReadyStateChanged { is_ready: bool },

    /// Broadcast after any ready-roster change.
    ReadyUsersUpdated { users: Vec<String> },

    /// Broadcast after any seat change (join, leave, kick, eviction).
    UpdateUsers { users: Vec<UserEntry> },

    HostChanged { host: String },

    /// A dice round opened: the frozen roster and its rules.
    GameStarted { players: Vec<String>, max: u32 },

    DiceRolled {
        user: String,
        result: u32,
        min: u32,
        max: u32,
        time: u64,
        not_ready: bool,
    },

    RollProgress {
        rolled: Vec<String>,
        total: usize,
        not_rolled_yet: Vec<String>,
    },

    /// The dice round finalized; history filtered to the frozen roster.
    GameEnded { history: Vec<RollRecord> },

    RouletteStarted {
        participants: Vec<String>,
        winner_index: usize,
        contract: SpinContract,
    },

    RouletteEnded { winner: String },

    HorseSelectionUpdated {
        /// name → vehicle index for the current round.
        bets: BTreeMap<String, usize>,
    },

    /// All contestants bet; the race ran and produced a sole winner.
    HorseRaceStarted {
        round: u32,
        /// Vehicle indices, fastest finish first.
        rankings: Vec<usize>,
        /// Per-vehicle finish times in milliseconds, indexed by vehicle.
        finish_times: Vec<u64>,
        gimmicks: Vec<GimmickEvent>,
        winners: Vec<String>,
    },

    /// The race tied; a new round begins over the tied winners.
    ReraceReady { winners: Vec<String>, round: u32 },

    /// Any rejection, sent to the originating connection only.
    Error { kind: ErrorKind, message: String },
}

// =========================================================================
// Tests
// =========================================================================
