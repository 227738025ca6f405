//! The horse race engine: `selecting → racing → (finished | rerace)`.
//!
//! Every contestant bets a vehicle; when the last bet lands the race runs
//! synchronously: one finish time per vehicle, ranked ascending, winners
//! are the contestants on the target-rank vehicle. A sole winner ends the
//! race; a tie starts a rerace restricted to the tied winners, repeating
//! until one winner remains.

use parlor_protocol::{
    GimmickEvent, GimmickKind, HistoryEntry, RaceRecord, Recipient,
    ServerEvent,
};
use rand::Rng;

use crate::{GameError, GameState, GameVariant, Outbound, RacePhase};

/// Rerace rounds are capped; at the cap the engine draws a uniform winner
/// among the remaining tied contestants instead of looping again.
pub const MAX_RERACE_ROUNDS: u32 = 25;

/// Registers a newly seated player as a round-1 contestant.
///
/// Joiners during a rerace (round > 1) or a running race spectate until
/// the race resolves.
pub fn sync_new_seat(state: &mut GameState, name: &str) {
    let GameVariant::HorseRace(h) = &mut state.variant else {
        return;
    };
    if h.phase == RacePhase::Selecting
        && h.round == 1
        && !h.contestants.iter().any(|c| c == name)
    {
        h.contestants.push(name.to_string());
    }
}

/// Rejects a kick while the target holds a bet in the current round.
pub fn can_remove(state: &GameState, target: &str) -> Result<(), GameError> {
    if let GameVariant::HorseRace(h) = &state.variant {
        if h.bets.contains_key(target) {
            return Err(GameError::InvalidState(format!(
                "{target} already bet this round"
            )));
        }
    }
    Ok(())
}

/// Toggles `user`'s bet on `vehicle_index`.
///
/// Re-selecting the current bet clears it. While there are at least as
/// many vehicles as contestants, a vehicle held by someone else is
/// refused. The bet that completes the round runs the race immediately.
pub fn select(
    state: &mut GameState,
    user: &str,
    vehicle_index: usize,
    rng: &mut impl Rng,
    now: u64,
) -> Result<Outbound, GameError> {
    {
        let GameVariant::HorseRace(h) = &state.variant else {
            return Err(GameError::InvalidState(
                "this is not a horse race room".into(),
            ));
        };
        if state.seat(user).is_none() {
            return Err(GameError::UserNotFound(user.into()));
        }
        if h.phase != RacePhase::Selecting {
            return Err(GameError::InvalidState(
                "the race is already running".into(),
            ));
        }
        if !h.contestants.iter().any(|c| c == user) {
            return Err(GameError::InvalidState(
                "not a contestant in this round".into(),
            ));
        }
        if vehicle_index >= h.vehicles.len() {
            return Err(GameError::InvalidVehicle(vehicle_index));
        }
        let toggling_off = h.bets.get(user) == Some(&vehicle_index);
        if !toggling_off
            && h.vehicles.len() >= h.contestants.len()
            && h.bets.iter().any(|(n, v)| *v == vehicle_index && n != user)
        {
            return Err(GameError::VehicleTaken(vehicle_index));
        }
    }

    let all_bet = {
        let GameVariant::HorseRace(h) = &mut state.variant else {
            unreachable!("variant checked above");
        };
        if h.bets.get(user) == Some(&vehicle_index) {
            h.bets.remove(user);
        } else {
            h.bets.insert(user.to_string(), vehicle_index);
        }
        !h.contestants.is_empty() && h.bets.len() == h.contestants.len()
    };

    let mut out = vec![(Recipient::All, selection_event(state))];
    if all_bet {
        out.extend(run_race(state, rng, now));
    }
    Ok(out)
}

/// Drops a departed player from the round.
///
/// If the remaining contestants have all bet, their race runs right away.
pub fn handle_departure(
    state: &mut GameState,
    name: &str,
    rng: &mut impl Rng,
    now: u64,
) -> Outbound {
    let (changed, all_bet) = {
        let GameVariant::HorseRace(h) = &mut state.variant else {
            return Vec::new();
        };
        let had = h.contestants.iter().any(|c| c == name);
        h.contestants.retain(|c| c != name);
        h.bets.remove(name);
        let all_bet = h.phase == RacePhase::Selecting
            && !h.contestants.is_empty()
            && h.bets.len() == h.contestants.len();
        (had, all_bet)
    };
    if !changed {
        return Vec::new();
    }

    let mut out = vec![(Recipient::All, selection_event(state))];
    if all_bet {
        out.extend(run_race(state, rng, now));
    }
    out
}

/// Runs one race round over the current bets and resolves its outcome.
fn run_race(state: &mut GameState, rng: &mut impl Rng, now: u64) -> Outbound {
    let (round, contestants, bets, vehicle_count, rule) = {
        let GameVariant::HorseRace(h) = &mut state.variant else {
            return Vec::new();
        };
        h.phase = RacePhase::Racing;
        (
            h.round,
            h.contestants.clone(),
            h.bets.clone(),
            h.vehicles.len(),
            h.finish_rule,
        )
    };

    let finish_times: Vec<u64> = (0..vehicle_count)
        .map(|_| rng.random_range(8_000..20_000))
        .collect();
    let mut rankings: Vec<usize> = (0..vehicle_count).collect();
    rankings.sort_by_key(|&i| (finish_times[i], i));

    let target = match rule {
        parlor_protocol::FinishRule::First => rankings[0],
        parlor_protocol::FinishRule::Last => rankings[vehicle_count - 1],
    };

    let mut winners: Vec<String> = contestants
        .iter()
        .filter(|c| bets.get(*c) == Some(&target))
        .cloned()
        .collect();

    // Tie-break bound: past the round cap, draw one winner instead of
    // looping again.
    if winners.len() != 1 && round >= MAX_RERACE_ROUNDS {
        let pool = if winners.is_empty() { &contestants } else { &winners };
        let pick = pool[rng.random_range(0..pool.len())].clone();
        tracing::warn!(round, winner = %pick, "rerace cap reached, drawing winner");
        winners = vec![pick];
    }

    let gimmicks = gen_gimmicks(rng, &finish_times);

    state.mark_ever_played(&contestants);
    state.history.push(HistoryEntry::Race(RaceRecord {
        round,
        roster: contestants.clone(),
        bets: bets.clone(),
        rankings: rankings.clone(),
        winners: winners.clone(),
        time: now,
    }));

    let mut out = vec![(
        Recipient::All,
        ServerEvent::HorseRaceStarted {
            round,
            rankings,
            finish_times,
            gimmicks,
            winners: winners.clone(),
        },
    )];

    if winners.len() == 1 {
        // Finished: the next race starts fresh over everyone seated.
        let seat_names: Vec<String> =
            state.seats.iter().map(|s| s.name.clone()).collect();
        let GameVariant::HorseRace(h) = &mut state.variant else {
            unreachable!("variant checked above");
        };
        h.phase = RacePhase::Selecting;
        h.round = 1;
        h.bets.clear();
        h.contestants = seat_names;
        tracing::info!(round, winner = %winners[0], "horse race finalized");
    } else {
        // Tie (or nobody on the target vehicle): rerace. The tied winners
        // become the next round's contestants; an empty winner set keeps
        // the same roster.
        let next: Vec<String> = if winners.is_empty() {
            contestants
        } else {
            winners
        };
        let GameVariant::HorseRace(h) = &mut state.variant else {
            unreachable!("variant checked above");
        };
        h.contestants = next.clone();
        h.bets.clear();
        h.round = round + 1;
        h.phase = RacePhase::Selecting;
        tracing::info!(
            round = round + 1,
            contestants = next.len(),
            "rerace pending"
        );
        out.push((
            Recipient::All,
            ServerEvent::ReraceReady {
                winners: next,
                round: round + 1,
            },
        ));
    }

    out
}

fn selection_event(state: &GameState) -> ServerEvent {
    match &state.variant {
        GameVariant::HorseRace(h) => ServerEvent::HorseSelectionUpdated {
            bets: h.bets.clone(),
        },
        _ => unreachable!("callers hold a horse race room"),
    }
}

/// Draws the cosmetic mid-race events: up to two per vehicle, each placed
/// well before that vehicle's finish.
fn gen_gimmicks(rng: &mut impl Rng, finish_times: &[u64]) -> Vec<GimmickEvent> {
    const KINDS: [GimmickKind; 5] = [
        GimmickKind::Stop,
        GimmickKind::Slow,
        GimmickKind::Sprint,
        GimmickKind::Slip,
        GimmickKind::Wobble,
    ];

    let mut out = Vec::new();
    for (vehicle, &finish) in finish_times.iter().enumerate() {
        for _ in 0..rng.random_range(0..=2u32) {
            let latest = finish.saturating_sub(1_000);
            out.push(GimmickEvent {
                vehicle,
                kind: KINDS[rng.random_range(0..KINDS.len())],
                at_ms: rng.random_range(500..latest),
                duration_ms: rng.random_range(300..1_200),
            });
        }
    }
    out
}

// =========================================================================
// Tests
// =========================================================================
