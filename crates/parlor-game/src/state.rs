//! The per-room game state envelope.
//!
//! One `GameState` lives inside each room actor and is never shared
//! across rooms. The envelope carries what every game kind needs (seats,
//! ready roster, frozen round roster, history); the game-specific fields
//! live in the tagged [`GameVariant`] so a dice room can never touch
//! roulette state by accident.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parlor_protocol::{
    ConnId, FinishRule, GameKind, HistoryEntry, UserEntry, Vehicle,
};
use rand::seq::SliceRandom;
use rand::Rng;

/// Current unix time in milliseconds, as recorded on history entries.
pub fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Seats
// ---------------------------------------------------------------------------

/// How a seat is currently attached to the network.
///
/// A seat outlives its connection: on transport disconnect the link
/// becomes `Dropped { since }` and the grace window starts. A same-name
/// rejoin before the deadline relinks the seat to the new connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatLink {
    Linked(ConnId),
    Dropped { since: Instant },
}

/// A named participant slot inside a room.
#[derive(Debug, Clone)]
pub struct Seat {
    pub name: String,
    pub is_host: bool,
    /// Monotonic per-room join sequence; host transfer picks the minimum.
    pub joined_seq: u64,
    /// Source address, kept for the single-seat-per-IP check.
    pub ip: IpAddr,
    pub device: Option<String>,
    pub link: SeatLink,
}

impl Seat {
    /// The live connection occupying this seat, if any.
    pub fn conn(&self) -> Option<ConnId> {
        match self.link {
            SeatLink::Linked(conn) => Some(conn),
            SeatLink::Dropped { .. } => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.link, SeatLink::Linked(_))
    }
}

// ---------------------------------------------------------------------------
// Game-specific sub-state
// ---------------------------------------------------------------------------

/// Dice round state: `idle → active → idle`.
#[derive(Debug, Clone)]
pub struct DiceState {
    /// A round is open.
    pub active: bool,
    /// Checked-and-set when the open round finalizes, so two back-to-back
    /// "last roll" events can't both fire completion.
    pub finalized: bool,
    /// The max used when a roll carries no explicit override (min is 1).
    pub default_max: u32,
    /// Index into `history` where the open round's records begin.
    pub round_start: usize,
}

impl Default for DiceState {
    fn default() -> Self {
        Self {
            active: false,
            finalized: false,
            default_max: 100,
            round_start: 0,
        }
    }
}

/// Roulette round state: `idle → spinning → idle`.
#[derive(Debug, Clone, Default)]
pub struct RouletteState {
    pub spinning: bool,
    /// The roster frozen when the spin started.
    pub participants: Vec<String>,
    /// Index into `participants` picked by the server.
    pub winner_index: usize,
}

/// Horse race phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePhase {
    Selecting,
    Racing,
}

/// Horse race state, including the recursive rerace cycle.
#[derive(Debug, Clone)]
pub struct HorseState {
    pub phase: RacePhase,
    /// Starts at 1; strictly increases across reraces.
    pub round: u32,
    /// The current round's players. Round 1 holds every seated name;
    /// rerace rounds hold the previous round's tied winners.
    pub contestants: Vec<String>,
    /// name → vehicle index for the current round.
    pub bets: BTreeMap<String, usize>,
    /// Fixed on room entry: 4–6 vehicles, shuffled once and held.
    pub vehicles: Vec<Vehicle>,
    pub finish_rule: FinishRule,
}

impl HorseState {
    /// Draws the vehicle count and shuffled assignment for a new room.
    pub fn new(finish_rule: FinishRule, rng: &mut impl Rng) -> Self {
        let count = rng.random_range(4..=6);
        let mut vehicles = Vehicle::ALL.to_vec();
        vehicles.shuffle(rng);
        vehicles.truncate(count);
        Self {
            phase: RacePhase::Selecting,
            round: 1,
            contestants: Vec::new(),
            bets: BTreeMap::new(),
            vehicles,
            finish_rule,
        }
    }
}

/// The game-specific payload, selected by the room's [`GameKind`].
#[derive(Debug, Clone)]
pub enum GameVariant {
    Dice(DiceState),
    Roulette(RouletteState),
    HorseRace(HorseState),
}

impl GameVariant {
    pub fn for_kind(
        kind: GameKind,
        finish_rule: FinishRule,
        rng: &mut impl Rng,
    ) -> Self {
        match kind {
            GameKind::Dice => Self::Dice(DiceState::default()),
            GameKind::Roulette => Self::Roulette(RouletteState::default()),
            GameKind::HorseRace => {
                Self::HorseRace(HorseState::new(finish_rule, rng))
            }
        }
    }

    pub fn kind(&self) -> GameKind {
        match self {
            Self::Dice(_) => GameKind::Dice,
            Self::Roulette(_) => GameKind::Roulette,
            Self::HorseRace(_) => GameKind::HorseRace,
        }
    }
}

// ---------------------------------------------------------------------------
// The envelope
// ---------------------------------------------------------------------------

/// The full mutable state of one room's game.
#[derive(Debug, Clone)]
pub struct GameState {
    pub seats: Vec<Seat>,
    /// Names opted into the next round.
    pub ready: Vec<String>,
    /// The frozen round roster. Empty while idle.
    pub players: Vec<String>,
    /// Names that acted (rolled) in the open round. Always ⊆ `players`.
    pub acted: Vec<String>,
    /// Append-only result log.
    pub history: Vec<HistoryEntry>,
    /// Every name that ever participated in a round here.
    pub ever_played: Vec<String>,
    pub variant: GameVariant,
}

impl GameState {
    pub fn new(variant: GameVariant) -> Self {
        Self {
            seats: Vec::new(),
            ready: Vec::new(),
            players: Vec::new(),
            acted: Vec::new(),
            history: Vec::new(),
            ever_played: Vec::new(),
            variant,
        }
    }

    pub fn seat(&self, name: &str) -> Option<&Seat> {
        self.seats.iter().find(|s| s.name == name)
    }

    pub fn seat_mut(&mut self, name: &str) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|s| s.name == name)
    }

    pub fn seat_by_conn(&self, conn: ConnId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.conn() == Some(conn))
    }

    pub fn host(&self) -> Option<&Seat> {
        self.seats.iter().find(|s| s.is_host)
    }

    /// `true` if `name` currently holds the host seat.
    pub fn is_host(&self, name: &str) -> bool {
        self.seat(name).is_some_and(|s| s.is_host)
    }

    pub fn user_entries(&self) -> Vec<UserEntry> {
        self.seats
            .iter()
            .map(|s| UserEntry {
                name: s.name.clone(),
                is_host: s.is_host,
            })
            .collect()
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.ready.iter().any(|n| n == name)
    }

    /// Rejects `name` with [`GameError::HostOnly`] unless they hold the
    /// host seat. `action` names the attempted operation for the message.
    pub fn require_host(
        &self,
        name: &str,
        action: &'static str,
    ) -> Result<(), crate::GameError> {
        if self.is_host(name) {
            Ok(())
        } else {
            Err(crate::GameError::HostOnly(action))
        }
    }

    /// Adds names to the lifetime participant list, deduplicated.
    pub fn mark_ever_played<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a String>,
    ) {
        for name in names {
            if !self.ever_played.contains(name) {
                self.ever_played.push(name.clone());
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seat(name: &str, is_host: bool, seq: u64) -> Seat {
        Seat {
            name: name.into(),
            is_host,
            joined_seq: seq,
            ip: "127.0.0.1".parse().unwrap(),
            device: None,
            link: SeatLink::Linked(ConnId(seq)),
        }
    }

    #[test]
    fn test_horse_state_new_draws_four_to_six_vehicles() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let state = HorseState::new(FinishRule::First, &mut rng);
            assert!((4..=6).contains(&state.vehicles.len()));
            // Shuffle must not duplicate a vehicle kind.
            let mut kinds = state.vehicles.clone();
            kinds.sort_by_key(|v| format!("{v:?}"));
            kinds.dedup();
            assert_eq!(kinds.len(), state.vehicles.len());
        }
    }

    #[test]
    fn test_variant_for_kind_matches_kind() {
        let mut rng = StdRng::seed_from_u64(1);
        for kind in [GameKind::Dice, GameKind::Roulette, GameKind::HorseRace] {
            let variant = GameVariant::for_kind(kind, FinishRule::First, &mut rng);
            assert_eq!(variant.kind(), kind);
        }
    }

    #[test]
    fn test_is_host_and_host_lookup() {
        let mut state = GameState::new(GameVariant::Dice(DiceState::default()));
        state.seats.push(seat("a", true, 1));
        state.seats.push(seat("b", false, 2));
        assert!(state.is_host("a"));
        assert!(!state.is_host("b"));
        assert_eq!(state.host().unwrap().name, "a");
    }

    #[test]
    fn test_mark_ever_played_deduplicates() {
        let mut state = GameState::new(GameVariant::Dice(DiceState::default()));
        let names: Vec<String> = vec!["a".into(), "b".into()];
        state.mark_ever_played(&names);
        state.mark_ever_played(&names);
        assert_eq!(state.ever_played, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_seat_conn_none_when_dropped() {
        let mut s = seat("a", false, 1);
        assert_eq!(s.conn(), Some(ConnId(1)));
        s.link = SeatLink::Dropped {
            since: Instant::now(),
        };
        assert_eq!(s.conn(), None);
        assert!(!s.is_linked());
    }
}
