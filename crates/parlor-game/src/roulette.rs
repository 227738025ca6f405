//! The roulette round engine: `idle → spinning → idle`.
//!
//! The server picks the winner and a single shared animation contract up
//! front; clients only render. Completion is accepted from the host
//! connection alone, so the flood of per-client "my animation finished"
//! reports can never finalize the round twice.

use parlor_protocol::{
    HistoryEntry, Recipient, ServerEvent, SpinContract, SpinEffect,
    SpinEffectKind, SpinRecord,
};
use rand::Rng;

use crate::{GameError, GameState, GameVariant, Outbound};

/// Starts a spin over the frozen ready roster.
///
/// Host-only; requires at least two ready users; refused while a spin is
/// already running.
pub fn start(
    state: &mut GameState,
    actor: &str,
    rng: &mut impl Rng,
    now: u64,
) -> Result<Outbound, GameError> {
    state.require_host(actor, "start the roulette")?;
    let GameVariant::Roulette(r) = &state.variant else {
        return Err(GameError::InvalidState(
            "this is not a roulette room".into(),
        ));
    };
    if r.spinning {
        return Err(GameError::InvalidState(
            "the roulette is already spinning".into(),
        ));
    }
    if state.ready.len() < 2 {
        return Err(GameError::InvalidState(
            "need at least two ready players".into(),
        ));
    }

    let participants = state.ready.clone();
    let winner_index = rng.random_range(0..participants.len());
    let contract = spin_contract(rng, winner_index, participants.len());

    state.mark_ever_played(&participants);
    state.history.push(HistoryEntry::Spin(SpinRecord {
        participants: participants.clone(),
        winner: participants[winner_index].clone(),
        time: now,
    }));

    let GameVariant::Roulette(r) = &mut state.variant else {
        unreachable!("variant checked above");
    };
    r.spinning = true;
    r.participants = participants.clone();
    r.winner_index = winner_index;

    tracing::info!(
        participants = participants.len(),
        winner_index,
        "roulette spin started"
    );

    Ok(vec![(
        Recipient::All,
        ServerEvent::RouletteStarted {
            participants,
            winner_index,
            contract,
        },
    )])
}

/// Rejects a kick while the target is frozen into the running spin.
pub fn can_remove(state: &GameState, target: &str) -> Result<(), GameError> {
    if let GameVariant::Roulette(r) = &state.variant {
        if r.spinning && r.participants.iter().any(|p| p == target) {
            return Err(GameError::InvalidState(format!(
                "{target} is in the active spin"
            )));
        }
    }
    Ok(())
}

/// Applies a client's completion report.
///
/// Only the host's report finalizes; reports from other connections and
/// duplicate reports after finalization are no-ops, never errors — every
/// client fires one when its local animation ends.
pub fn complete(state: &mut GameState, reporter: &str, claimed: &str) -> Outbound {
    let GameVariant::Roulette(r) = &mut state.variant else {
        return Vec::new();
    };
    if !r.spinning {
        return Vec::new();
    }
    if !state.seats.iter().any(|s| s.name == reporter && s.is_host) {
        tracing::debug!(%reporter, "ignoring roulette result from non-host");
        return Vec::new();
    }

    // The frozen participant array is authoritative, not the report.
    let winner = r.participants[r.winner_index].clone();
    if claimed != winner {
        tracing::debug!(%claimed, %winner, "host-reported winner mismatch");
    }

    r.spinning = false;
    r.participants.clear();
    state.ready.clear();

    tracing::info!(%winner, "roulette round finalized");

    vec![
        (Recipient::All, ServerEvent::RouletteEnded { winner }),
        (
            Recipient::All,
            ServerEvent::ReadyUsersUpdated { users: Vec::new() },
        ),
    ]
}

/// Draws the shared animation contract: spin duration, total rotation
/// parking on the winner's slot, and a finishing flourish with its own
/// randomized amplitude and duration.
fn spin_contract(
    rng: &mut impl Rng,
    winner_index: usize,
    participants: usize,
) -> SpinContract {
    let duration_ms = rng.random_range(4_000..7_000);
    let full_turns = rng.random_range(4..8) as f64;
    let slot = (winner_index as f64 + 0.5) / participants as f64;
    let total_rotation = full_turns * 360.0 + slot * 360.0;

    let effect = match rng.random_range(0..4) {
        0 => SpinEffect {
            kind: SpinEffectKind::Normal,
            amplitude: 0.0,
            duration_ms: 0,
        },
        1 => SpinEffect {
            kind: SpinEffectKind::Bounce,
            amplitude: rng.random_range(8.0..20.0),
            duration_ms: rng.random_range(400..900),
        },
        2 => SpinEffect {
            kind: SpinEffectKind::Shake,
            amplitude: rng.random_range(2.0..6.0),
            duration_ms: rng.random_range(300..700),
        },
        _ => SpinEffect {
            kind: SpinEffectKind::SlowCrawl,
            amplitude: rng.random_range(3.0..10.0),
            duration_ms: rng.random_range(800..1_600),
        },
    };

    SpinContract {
        duration_ms,
        total_rotation,
        effect,
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RouletteState, Seat, SeatLink};
    use parlor_protocol::ConnId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn roulette_room(names: &[&str]) -> GameState {
        let mut state =
            GameState::new(GameVariant::Roulette(RouletteState::default()));
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
        state.ready = names.iter().map(|n| (*n).to_string()).collect();
        state
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn started(out: &Outbound) -> (Vec<String>, usize, SpinContract) {
        out.iter()
            .find_map(|(_, e)| match e {
                ServerEvent::RouletteStarted {
                    participants,
                    winner_index,
                    contract,
                } => Some((participants.clone(), *winner_index, contract.clone())),
                _ => None,
            })
            .expect("rouletteStarted event")
    }

    // =====================================================================
    // start()
    // =====================================================================

    #[test]
    fn test_start_freezes_participants_and_picks_valid_winner() {
        let mut state = roulette_room(&["a", "b", "c"]);
        let out = start(&mut state, "a", &mut rng(), 0).unwrap();

        let (participants, winner_index, _) = started(&out);
        assert_eq!(participants, vec!["a", "b", "c"]);
        assert!(winner_index < participants.len());

        match &state.variant {
            GameVariant::Roulette(r) => {
                assert!(r.spinning);
                assert_eq!(r.participants, participants);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_start_winner_index_always_in_bounds() {
        for seed in 0..200 {
            let mut state = roulette_room(&["a", "b", "c", "d", "e"]);
            let mut rng = StdRng::seed_from_u64(seed);
            let out = start(&mut state, "a", &mut rng, 0).unwrap();
            let (participants, winner_index, contract) = started(&out);
            assert!(winner_index < participants.len());
            assert!((4_000..7_000).contains(&contract.duration_ms));
            assert!(contract.total_rotation > 360.0);
        }
    }

    #[test]
    fn test_start_non_host_rejected() {
        let mut state = roulette_room(&["a", "b"]);
        assert!(matches!(
            start(&mut state, "b", &mut rng(), 0),
            Err(GameError::HostOnly(_))
        ));
    }

    #[test]
    fn test_start_needs_two_ready() {
        let mut state = roulette_room(&["a", "b"]);
        state.ready = vec!["a".into()];
        assert!(matches!(
            start(&mut state, "a", &mut rng(), 0),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_start_while_spinning_rejected() {
        let mut state = roulette_room(&["a", "b"]);
        start(&mut state, "a", &mut rng(), 0).unwrap();
        assert!(start(&mut state, "a", &mut rng(), 0).is_err());
    }

    #[test]
    fn test_start_appends_spin_record() {
        let mut state = roulette_room(&["a", "b"]);
        let out = start(&mut state, "a", &mut rng(), 123).unwrap();
        let (participants, winner_index, _) = started(&out);

        assert_eq!(state.history.len(), 1);
        match &state.history[0] {
            HistoryEntry::Spin(spin) => {
                assert_eq!(spin.winner, participants[winner_index]);
                assert_eq!(spin.time, 123);
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    // =====================================================================
    // complete()
    // =====================================================================

    #[test]
    fn test_complete_host_finalizes_with_authoritative_winner() {
        let mut state = roulette_room(&["a", "b", "c"]);
        let out = start(&mut state, "a", &mut rng(), 0).unwrap();
        let (participants, winner_index, _) = started(&out);
        let expected = participants[winner_index].clone();

        // The host reports a wrong name; the server corrects it.
        let out = complete(&mut state, "a", "nonsense");

        assert!(out.iter().any(|(_, e)| matches!(
            e,
            ServerEvent::RouletteEnded { winner } if *winner == expected
        )));
        assert!(state.ready.is_empty());
        match &state.variant {
            GameVariant::Roulette(r) => assert!(!r.spinning),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_complete_non_host_report_is_noop() {
        let mut state = roulette_room(&["a", "b"]);
        start(&mut state, "a", &mut rng(), 0).unwrap();

        let out = complete(&mut state, "b", "b");

        assert!(out.is_empty());
        match &state.variant {
            GameVariant::Roulette(r) => assert!(r.spinning, "still spinning"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_complete_duplicate_report_is_noop() {
        let mut state = roulette_room(&["a", "b"]);
        start(&mut state, "a", &mut rng(), 0).unwrap();

        let first = complete(&mut state, "a", "a");
        let second = complete(&mut state, "a", "a");

        assert!(!first.is_empty());
        assert!(second.is_empty(), "second report must be a no-op");
    }

    #[test]
    fn test_complete_without_spin_is_noop() {
        let mut state = roulette_room(&["a", "b"]);
        assert!(complete(&mut state, "a", "a").is_empty());
    }
}
