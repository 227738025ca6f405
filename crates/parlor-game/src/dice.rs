//! The dice round engine: `idle → active → idle`.
//!
//! Rolling is allowed at any time — rolls outside an active round are
//! recorded with the not-ready flag and never count toward completion.
//! Completion fires exactly once per round, guarded by the checked-and-set
//! `finalized` flag, whether the last roll arrives once or twice.

use parlor_protocol::{HistoryEntry, Recipient, RollRecord, ServerEvent};

use crate::{seeded_roll, GameError, GameState, GameVariant, Outbound};

fn dice_state(state: &GameState) -> Result<&crate::DiceState, GameError> {
    match &state.variant {
        GameVariant::Dice(d) => Ok(d),
        _ => Err(GameError::InvalidState("this is not a dice room".into())),
    }
}

/// Opens a round: snapshots the ready roster as the frozen `players` set.
///
/// Host-only. The ready roster must be non-empty; late joiners cannot
/// enter the round once it is open.
pub fn start(state: &mut GameState, actor: &str) -> Result<Outbound, GameError> {
    state.require_host(actor, "start the game")?;
    let dice = dice_state(state)?;
    if dice.active {
        return Err(GameError::InvalidState(
            "a round is already active".into(),
        ));
    }
    if state.ready.is_empty() {
        return Err(GameError::InvalidState(
            "no players are ready".into(),
        ));
    }

    let players = state.ready.clone();
    let round_start = state.history.len();
    state.players = players.clone();
    state.acted.clear();
    state.mark_ever_played(&players);

    let GameVariant::Dice(dice) = &mut state.variant else {
        unreachable!("variant checked above");
    };
    dice.active = true;
    dice.finalized = false;
    dice.round_start = round_start;
    let max = dice.default_max;

    tracing::info!(roster = players.len(), "dice round started");

    Ok(vec![(
        Recipient::All,
        ServerEvent::GameStarted { players, max },
    )])
}

/// Performs a seeded roll for `user`.
///
/// The range is the explicit per-command override or the room's
/// configured max with min fixed at 1. Only the first in-round roll per
/// roster member counts toward completion; everything is recorded.
pub fn roll(
    state: &mut GameState,
    user: &str,
    seed: &str,
    min: Option<u32>,
    max: Option<u32>,
    now: u64,
) -> Result<Outbound, GameError> {
    let dice = dice_state(state)?;
    if state.seat(user).is_none() {
        return Err(GameError::UserNotFound(user.into()));
    }

    let rmin = min.unwrap_or(1);
    let rmax = max.unwrap_or(dice.default_max);
    // Validates the range; rejection leaves every field untouched.
    let result = seeded_roll(seed, rmin, rmax)?;

    let active = dice.active;
    let in_round = active && state.players.iter().any(|p| p == user);
    let not_ready = !in_round;

    state.history.push(HistoryEntry::Roll(RollRecord {
        user: user.into(),
        result,
        min: rmin,
        max: rmax,
        seed: seed.into(),
        time: now,
        in_round,
        not_ready,
    }));

    let mut out = vec![(
        Recipient::All,
        ServerEvent::DiceRolled {
            user: user.into(),
            result,
            min: rmin,
            max: rmax,
            time: now,
            not_ready,
        },
    )];

    // Only the first in-round roll per user advances the round.
    if in_round && !state.acted.iter().any(|a| a == user) {
        state.acted.push(user.into());
        out.push((Recipient::All, progress(state)));
    }

    out.extend(finalize_if_complete(state));
    Ok(out)
}

/// Host-only: finalizes the open round on demand.
pub fn end(state: &mut GameState, actor: &str) -> Result<Outbound, GameError> {
    state.require_host(actor, "end the game")?;
    let dice = dice_state(state)?;
    if !dice.active {
        return Err(GameError::InvalidState("no round is active".into()));
    }
    Ok(finalize(state))
}

/// Rejects a kick while the target has already rolled in the open round.
pub fn can_remove(state: &GameState, target: &str) -> Result<(), GameError> {
    if let GameVariant::Dice(d) = &state.variant {
        if d.active && state.acted.iter().any(|a| a == target) {
            return Err(GameError::InvalidState(format!(
                "{target} already rolled in the active round"
            )));
        }
    }
    Ok(())
}

/// Removes `name` from the open round's roster after a leave or eviction.
///
/// A not-yet-rolled departure shrinks `players`, which can itself
/// complete the round. A departure after rolling leaves the roster
/// untouched — the recorded roll stands.
pub fn drop_from_round(state: &mut GameState, name: &str) -> Outbound {
    let Ok(dice) = dice_state(state) else {
        return Vec::new();
    };
    if !dice.active || state.acted.iter().any(|a| a == name) {
        return Vec::new();
    }
    let before = state.players.len();
    state.players.retain(|p| p != name);
    if state.players.len() == before {
        return Vec::new();
    }

    let mut out = vec![(Recipient::All, progress(state))];
    out.extend(finalize_if_complete(state));
    out
}

/// Finalizes iff the frozen roster is fully covered by `acted`.
fn finalize_if_complete(state: &mut GameState) -> Outbound {
    let Ok(dice) = dice_state(state) else {
        return Vec::new();
    };
    if !dice.active || dice.finalized {
        return Vec::new();
    }
    let complete = state
        .players
        .iter()
        .all(|p| state.acted.iter().any(|a| a == p));
    if !complete {
        return Vec::new();
    }
    finalize(state)
}

/// Unconditional finalize-and-clear. Idempotent via the `finalized` flag:
/// the second caller in a back-to-back pair gets nothing to broadcast.
fn finalize(state: &mut GameState) -> Outbound {
    let GameVariant::Dice(dice) = &mut state.variant else {
        return Vec::new();
    };
    if !dice.active || dice.finalized {
        return Vec::new();
    }
    dice.finalized = true;
    dice.active = false;
    let round_start = dice.round_start;

    // Only the frozen roster's in-round records belong to the round.
    let history: Vec<RollRecord> = state.history[round_start..]
        .iter()
        .filter_map(|entry| match entry {
            HistoryEntry::Roll(r)
                if r.in_round && state.players.iter().any(|p| *p == r.user) =>
            {
                Some(r.clone())
            }
            _ => None,
        })
        .collect();

    tracing::info!(records = history.len(), "dice round finalized");

    state.players.clear();
    state.acted.clear();
    state.ready.clear();

    vec![
        (Recipient::All, ServerEvent::GameEnded { history }),
        (
            Recipient::All,
            ServerEvent::ReadyUsersUpdated { users: Vec::new() },
        ),
    ]
}

fn progress(state: &GameState) -> ServerEvent {
    ServerEvent::RollProgress {
        rolled: state.acted.clone(),
        total: state.players.len(),
        not_rolled_yet: state
            .players
            .iter()
            .filter(|p| !state.acted.iter().any(|a| a == *p))
            .cloned()
            .collect(),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiceState, Seat, SeatLink};
    use parlor_protocol::ConnId;

    fn dice_room(names: &[&str]) -> GameState {
        let mut state = GameState::new(GameVariant::Dice(DiceState::default()));
        for (i, name) in names.iter().enumerate() {
            state.seats.push(Seat {
                name: (*name).into(),
                is_host: i == 0,
                joined_seq: i as u64,
                ip: "127.0.0.1".parse().unwrap(),
                device: None,
                link: SeatLink::Linked(ConnId(i as u64)),
            });
        }
        state
    }

    fn ready_all(state: &mut GameState) {
        state.ready = state.seats.iter().map(|s| s.name.clone()).collect();
    }

    fn game_ended_count(out: &Outbound) -> usize {
        out.iter()
            .filter(|(_, e)| matches!(e, ServerEvent::GameEnded { .. }))
            .count()
    }

    // =====================================================================
    // start()
    // =====================================================================

    #[test]
    fn test_start_freezes_ready_roster() {
        let mut state = dice_room(&["host", "b", "c"]);
        state.ready = vec!["host".into(), "b".into()];

        let out = start(&mut state, "host").unwrap();

        assert_eq!(state.players, vec!["host".to_string(), "b".to_string()]);
        assert!(state.acted.is_empty());
        assert!(matches!(
            out[0].1,
            ServerEvent::GameStarted { ref players, max: 100 }
                if players.len() == 2
        ));
    }

    #[test]
    fn test_start_non_host_rejected() {
        let mut state = dice_room(&["host", "b"]);
        ready_all(&mut state);
        assert!(matches!(
            start(&mut state, "b"),
            Err(GameError::HostOnly(_))
        ));
        assert!(state.players.is_empty(), "rejection must not mutate");
    }

    #[test]
    fn test_start_empty_ready_rejected() {
        let mut state = dice_room(&["host"]);
        assert!(matches!(
            start(&mut state, "host"),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_start_while_active_rejected() {
        let mut state = dice_room(&["host", "b"]);
        ready_all(&mut state);
        start(&mut state, "host").unwrap();
        assert!(start(&mut state, "host").is_err());
    }

    #[test]
    fn test_start_marks_ever_played() {
        let mut state = dice_room(&["host", "b"]);
        ready_all(&mut state);
        start(&mut state, "host").unwrap();
        assert!(state.ever_played.contains(&"b".to_string()));
    }

    // =====================================================================
    // roll()
    // =====================================================================

    #[test]
    fn test_roll_outside_round_is_recorded_not_ready() {
        let mut state = dice_room(&["host"]);

        let out = roll(&mut state, "host", "seed", None, None, 5).unwrap();

        assert!(matches!(
            out[0].1,
            ServerEvent::DiceRolled { not_ready: true, .. }
        ));
        assert_eq!(state.history.len(), 1);
        assert!(state.acted.is_empty(), "non-round rolls never count");
    }

    #[test]
    fn test_roll_uses_default_max_and_min_one() {
        let mut state = dice_room(&["host"]);
        let out = roll(&mut state, "host", "seed", None, None, 0).unwrap();
        match &out[0].1 {
            ServerEvent::DiceRolled { min, max, result, .. } => {
                assert_eq!(*min, 1);
                assert_eq!(*max, 100);
                assert!((1..=100).contains(result));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_roll_explicit_override_range() {
        let mut state = dice_room(&["host"]);
        let out =
            roll(&mut state, "host", "seed", Some(5), Some(10), 0).unwrap();
        match &out[0].1 {
            ServerEvent::DiceRolled { min, max, result, .. } => {
                assert_eq!((*min, *max), (5, 10));
                assert!((5..=10).contains(result));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_roll_invalid_range_rejected_without_mutation() {
        let mut state = dice_room(&["host"]);
        let result = roll(&mut state, "host", "seed", Some(0), Some(10), 0);
        assert!(matches!(result, Err(GameError::InvalidRange { .. })));
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_roll_unknown_user_rejected() {
        let mut state = dice_room(&["host"]);
        assert!(matches!(
            roll(&mut state, "ghost", "seed", None, None, 0),
            Err(GameError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_roll_only_first_counts_toward_completion() {
        let mut state = dice_room(&["host", "b"]);
        ready_all(&mut state);
        start(&mut state, "host").unwrap();

        roll(&mut state, "host", "s1", None, None, 0).unwrap();
        roll(&mut state, "host", "s2", None, None, 0).unwrap();

        assert_eq!(state.acted, vec!["host".to_string()]);
        // Both rolls are still recorded.
        assert_eq!(state.history.len(), 2);
    }

    #[test]
    fn test_roll_emits_progress() {
        let mut state = dice_room(&["host", "b", "c"]);
        ready_all(&mut state);
        start(&mut state, "host").unwrap();

        let out = roll(&mut state, "b", "s", None, None, 0).unwrap();

        let progress = out
            .iter()
            .find_map(|(_, e)| match e {
                ServerEvent::RollProgress {
                    rolled,
                    total,
                    not_rolled_yet,
                } => Some((rolled.clone(), *total, not_rolled_yet.clone())),
                _ => None,
            })
            .expect("progress event");
        assert_eq!(progress.0, vec!["b".to_string()]);
        assert_eq!(progress.1, 3);
        assert_eq!(
            progress.2,
            vec!["host".to_string(), "c".to_string()]
        );
    }

    // =====================================================================
    // Auto-completion
    // =====================================================================

    #[test]
    fn test_round_completes_exactly_once_when_all_rolled() {
        let mut state = dice_room(&["a", "b", "c"]);
        ready_all(&mut state);
        start(&mut state, "a").unwrap();

        let out_a = roll(&mut state, "a", "sa", None, None, 0).unwrap();
        let out_b = roll(&mut state, "b", "sb", None, None, 0).unwrap();
        assert_eq!(game_ended_count(&out_a) + game_ended_count(&out_b), 0);

        let out_c = roll(&mut state, "c", "sc", None, None, 0).unwrap();
        assert_eq!(game_ended_count(&out_c), 1);

        // History for the round contains exactly the three roster records.
        let history = out_c
            .iter()
            .find_map(|(_, e)| match e {
                ServerEvent::GameEnded { history } => Some(history.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(history.len(), 3);
        let users: Vec<&str> =
            history.iter().map(|r| r.user.as_str()).collect();
        assert_eq!(users, vec!["a", "b", "c"]);

        // State is back to idle.
        assert!(state.players.is_empty());
        assert!(state.acted.is_empty());
        assert!(state.ready.is_empty());
    }

    #[test]
    fn test_duplicate_final_roll_does_not_double_finalize() {
        let mut state = dice_room(&["a", "b"]);
        ready_all(&mut state);
        start(&mut state, "a").unwrap();
        roll(&mut state, "a", "sa", None, None, 0).unwrap();

        let first = roll(&mut state, "b", "sb", None, None, 0).unwrap();
        // The same client submits its "last roll" again right away: the
        // round is idle now, so the roll records as not-ready and no
        // second GameEnded fires.
        let second = roll(&mut state, "b", "sb2", None, None, 0).unwrap();

        assert_eq!(game_ended_count(&first), 1);
        assert_eq!(game_ended_count(&second), 0);
    }

    #[test]
    fn test_completion_excludes_pre_round_and_outsider_records() {
        let mut state = dice_room(&["a", "b", "c"]);
        // A not-ready roll before the round opens.
        roll(&mut state, "c", "warmup", None, None, 0).unwrap();

        state.ready = vec!["a".into(), "b".into()];
        start(&mut state, "a").unwrap();
        roll(&mut state, "a", "sa", None, None, 0).unwrap();
        // c is not on the frozen roster — recorded but never counted.
        roll(&mut state, "c", "sc", None, None, 0).unwrap();
        let out = roll(&mut state, "b", "sb", None, None, 0).unwrap();

        let history = out
            .iter()
            .find_map(|(_, e)| match e {
                ServerEvent::GameEnded { history } => Some(history.clone()),
                _ => None,
            })
            .unwrap();
        let users: Vec<&str> =
            history.iter().map(|r| r.user.as_str()).collect();
        assert_eq!(users, vec!["a", "b"]);
    }

    // =====================================================================
    // end()
    // =====================================================================

    #[test]
    fn test_end_finalizes_on_demand() {
        let mut state = dice_room(&["a", "b"]);
        ready_all(&mut state);
        start(&mut state, "a").unwrap();
        roll(&mut state, "a", "sa", None, None, 0).unwrap();

        let out = end(&mut state, "a").unwrap();

        assert_eq!(game_ended_count(&out), 1);
        assert!(state.players.is_empty());
    }

    #[test]
    fn test_end_non_host_rejected() {
        let mut state = dice_room(&["a", "b"]);
        ready_all(&mut state);
        start(&mut state, "a").unwrap();
        assert!(matches!(end(&mut state, "b"), Err(GameError::HostOnly(_))));
    }

    #[test]
    fn test_end_without_active_round_rejected() {
        let mut state = dice_room(&["a"]);
        assert!(end(&mut state, "a").is_err());
    }

    // =====================================================================
    // drop_from_round()
    // =====================================================================

    #[test]
    fn test_drop_unrolled_player_shrinks_roster() {
        let mut state = dice_room(&["a", "b", "c"]);
        ready_all(&mut state);
        start(&mut state, "a").unwrap();

        let out = drop_from_round(&mut state, "c");

        assert_eq!(state.players, vec!["a".to_string(), "b".to_string()]);
        assert!(out
            .iter()
            .any(|(_, e)| matches!(e, ServerEvent::RollProgress { .. })));
    }

    #[test]
    fn test_drop_last_missing_player_completes_round() {
        let mut state = dice_room(&["a", "b"]);
        ready_all(&mut state);
        start(&mut state, "a").unwrap();
        roll(&mut state, "a", "sa", None, None, 0).unwrap();

        let out = drop_from_round(&mut state, "b");

        assert_eq!(game_ended_count(&out), 1);
    }

    #[test]
    fn test_can_remove_refuses_rolled_player_during_round() {
        let mut state = dice_room(&["a", "b"]);
        ready_all(&mut state);
        start(&mut state, "a").unwrap();
        roll(&mut state, "b", "sb", None, None, 0).unwrap();

        assert!(can_remove(&state, "b").is_err());
        assert!(can_remove(&state, "a").is_ok());
        // The refusal mutated nothing.
        assert_eq!(state.acted, vec!["b".to_string()]);
        assert_eq!(state.players.len(), 2);
    }

    #[test]
    fn test_can_remove_allows_rolled_player_after_round() {
        let mut state = dice_room(&["a", "b"]);
        ready_all(&mut state);
        start(&mut state, "a").unwrap();
        roll(&mut state, "a", "sa", None, None, 0).unwrap();
        roll(&mut state, "b", "sb", None, None, 0).unwrap();
        // Round finalized — history alone doesn't block a kick.
        assert!(can_remove(&state, "b").is_ok());
    }

    #[test]
    fn test_drop_already_rolled_player_is_noop() {
        let mut state = dice_room(&["a", "b"]);
        ready_all(&mut state);
        start(&mut state, "a").unwrap();
        roll(&mut state, "a", "sa", None, None, 0).unwrap();

        let out = drop_from_round(&mut state, "a");

        assert!(out.is_empty());
        assert!(state.players.contains(&"a".to_string()));
    }
}
