//! Room actor: an isolated Tokio task that owns one room's game state.
//!
//! Commands arrive on an mpsc channel and run to completion one at a
//! time, which is what makes the idempotency guards inside the game
//! engines sufficient: two "last roll" events are processed strictly in
//! sequence, and the second sees the finalized flag the first set.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use parlor_game::{
    dice, horse, roulette, unix_ms, GameState, GameVariant, Outbound, Seat,
    SeatLink,
};
use parlor_protocol::{
    ClientEvent, ConnId, GameKind, Recipient, RoomId, RoomSummary,
    ServerEvent, UserEntry, Vehicle,
};
use parlor_session::dedupe_name;
use tokio::sync::{mpsc, oneshot};

use crate::{RoomConfig, RoomError, RoomSettings};

/// Channel sender for delivering server events to one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Notifications a room actor pushes up to the server loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomNotice {
    /// Seat counts or metadata changed — refresh the room list.
    Changed(RoomId),
    /// The actor stopped; prune the store handle.
    Closed(RoomId),
    /// A connection lost its seat without leaving on its own (kick or
    /// grace eviction) — clear its registry binding.
    Unseated { room: RoomId, conn: ConnId },
}

/// What a successful join hands back to the connection handler.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// The name actually seated (possibly suffixed).
    pub you: String,
    /// `true` when the join relinked a dropped seat.
    pub reconnected: bool,
    pub users: Vec<UserEntry>,
    pub summary: RoomSummary,
    /// Horse-race vehicle assignment; empty for other game kinds.
    pub vehicles: Vec<Vehicle>,
}

/// A point-in-time view of room metadata (not the game state itself).
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub summary: RoomSummary,
    pub age: std::time::Duration,
    pub expiry: std::time::Duration,
    pub is_empty: bool,
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Seat a connection (new seat, suffixed seat, or grace reconnect).
    Join {
        conn: ConnId,
        name: String,
        password: Option<String>,
        ip: IpAddr,
        device: Option<String>,
        sender: EventSender,
        reply: oneshot::Sender<Result<JoinOutcome, RoomError>>,
    },

    /// Voluntary leave.
    Leave {
        conn: ConnId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Transport dropped without a leave: start the grace window.
    Disconnected { conn: ConnId },

    /// A game or roster event from a seated connection.
    Apply { conn: ConnId, event: ClientEvent },

    /// Request current metadata.
    Summary {
        reply: oneshot::Sender<RoomSnapshot>,
    },

    /// Notify remaining seats and stop.
    Shutdown { reason: String },
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub async fn join(
        &self,
        conn: ConnId,
        name: String,
        password: Option<String>,
        ip: IpAddr,
        device: Option<String>,
        sender: EventSender,
    ) -> Result<JoinOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                conn,
                name,
                password,
                ip,
                device,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?
    }

    pub async fn leave(&self, conn: ConnId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                conn,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?
    }

    /// Fire-and-forget disconnect notification.
    pub async fn disconnected(&self, conn: ConnId) {
        let _ = self.sender.send(RoomCommand::Disconnected { conn }).await;
    }

    /// Routes a client event into the room (fire-and-forget; rejections
    /// go back to the connection as `error` events).
    pub async fn apply(
        &self,
        conn: ConnId,
        event: ClientEvent,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Apply { conn, event })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    pub async fn summary(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Summary { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    pub async fn shutdown(&self, reason: &str) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown {
                reason: reason.to_string(),
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct RoomActor {
    room_id: RoomId,
    settings: RoomSettings,
    config: RoomConfig,
    created_at: Instant,
    state: GameState,
    next_seat_seq: u64,
    /// Outbound channels for currently linked connections.
    senders: HashMap<ConnId, EventSender>,
    receiver: mpsc::Receiver<RoomCommand>,
    notices: mpsc::UnboundedSender<RoomNotice>,
    done: bool,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, kind = %self.settings.game_kind, "room actor started");
        let mut tick = tokio::time::interval(self.config.maintenance_interval);
        tick.set_missed_tick_behavior(
            tokio::time::MissedTickBehavior::Delay,
        );

        while !self.done {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = tick.tick() => self.evict_stale_seats(),
            }
        }

        let _ = self.notices.send(RoomNotice::Closed(self.room_id.clone()));
        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                conn,
                name,
                password,
                ip,
                device,
                sender,
                reply,
            } => {
                let result =
                    self.handle_join(conn, name, password, ip, device, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { conn, reply } => {
                let _ = reply.send(self.handle_leave(conn));
            }
            RoomCommand::Disconnected { conn } => {
                self.handle_disconnected(conn);
            }
            RoomCommand::Apply { conn, event } => {
                self.handle_apply(conn, event);
            }
            RoomCommand::Summary { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::Shutdown { reason } => {
                tracing::info!(room_id = %self.room_id, %reason, "room shutting down");
                self.dispatch(vec![(
                    Recipient::All,
                    ServerEvent::RoomDeleted { reason },
                )]);
                self.done = true;
            }
        }
    }

    // -- Seating ----------------------------------------------------------

    fn handle_join(
        &mut self,
        conn: ConnId,
        name: String,
        password: Option<String>,
        ip: IpAddr,
        device: Option<String>,
        sender: EventSender,
    ) -> Result<JoinOutcome, RoomError> {
        let name = name.trim().to_string();
        if name.is_empty() || name.len() > 24 {
            return Err(RoomError::InvalidName);
        }

        if let Some(expected) = &self.settings.password {
            if password.as_deref() != Some(expected.as_str()) {
                return Err(RoomError::BadPassword(self.room_id.clone()));
            }
        }

        // A same-name seat whose connection is gone is a reconnect: the
        // seat is relinked, never duplicated.
        if let Some(seat) = self.state.seat_mut(&name) {
            if !seat.is_linked() {
                seat.link = SeatLink::Linked(conn);
                self.senders.insert(conn, sender);
                tracing::info!(
                    room_id = %self.room_id, %conn, %name,
                    "seat relinked within grace window"
                );
                return Ok(self.join_outcome(name, true));
            }
        }

        if self.state.seats.len() >= self.settings.capacity {
            return Err(RoomError::RoomFull(self.room_id.clone()));
        }

        if self.settings.single_seat_per_ip
            && self.state.seats.iter().any(|s| s.ip == ip)
        {
            return Err(RoomError::IpAlreadySeated(self.room_id.clone()));
        }

        // A collision against a live seat suffixes instead of rejecting.
        let taken: Vec<String> =
            self.state.seats.iter().map(|s| s.name.clone()).collect();
        let seated_name = dedupe_name(&name, &taken);

        let is_host = self.state.seats.is_empty();
        let seq = self.next_seat_seq;
        self.next_seat_seq += 1;
        self.state.seats.push(Seat {
            name: seated_name.clone(),
            is_host,
            joined_seq: seq,
            ip,
            device,
            link: SeatLink::Linked(conn),
        });
        self.senders.insert(conn, sender);
        horse::sync_new_seat(&mut self.state, &seated_name);

        tracing::info!(
            room_id = %self.room_id, %conn, name = %seated_name,
            seats = self.state.seats.len(), "player joined"
        );

        self.dispatch(vec![(
            Recipient::AllExcept(conn),
            ServerEvent::UpdateUsers {
                users: self.state.user_entries(),
            },
        )]);
        self.notify_changed();

        Ok(self.join_outcome(seated_name, false))
    }

    fn handle_leave(&mut self, conn: ConnId) -> Result<(), RoomError> {
        let Some(seat) = self.state.seat_by_conn(conn) else {
            return Err(RoomError::NotSeated);
        };
        let name = seat.name.clone();
        tracing::info!(room_id = %self.room_id, %conn, %name, "player left");

        self.send_to(conn, ServerEvent::RoomLeft);
        let out = self.remove_seat(&name);
        self.dispatch(out);
        Ok(())
    }

    fn handle_disconnected(&mut self, conn: ConnId) {
        self.senders.remove(&conn);
        let Some(seat) = self
            .state
            .seats
            .iter_mut()
            .find(|s| s.conn() == Some(conn))
        else {
            return;
        };
        seat.link = SeatLink::Dropped {
            since: Instant::now(),
        };
        tracing::info!(
            room_id = %self.room_id, %conn, name = %seat.name,
            "seat dropped, grace window started"
        );
    }

    /// Evicts seats whose grace window elapsed without a relink.
    fn evict_stale_seats(&mut self) {
        let grace = self.config.reconnect_grace;
        let stale: Vec<String> = self
            .state
            .seats
            .iter()
            .filter(|s| match s.link {
                SeatLink::Dropped { since } => since.elapsed() > grace,
                SeatLink::Linked(_) => false,
            })
            .map(|s| s.name.clone())
            .collect();

        for name in stale {
            tracing::info!(
                room_id = %self.room_id, %name,
                "grace window elapsed, evicting seat"
            );
            let out = self.remove_seat(&name);
            self.dispatch(out);
        }
    }

    /// Shared removal pipeline for leave, kick, and grace eviction.
    ///
    /// Shrinks the active round if the departed player hadn't acted yet
    /// (which can itself complete the round), transfers the host seat to
    /// the next-oldest seat by join order, and closes the room when the
    /// last seat is gone.
    fn remove_seat(&mut self, name: &str) -> Outbound {
        let Some(pos) =
            self.state.seats.iter().position(|s| s.name == name)
        else {
            return Vec::new();
        };
        let seat = self.state.seats.remove(pos);
        if let Some(conn) = seat.conn() {
            self.senders.remove(&conn);
            let _ = self.notices.send(RoomNotice::Unseated {
                room: self.room_id.clone(),
                conn,
            });
        }

        let mut out = Vec::new();

        let was_ready = self.state.is_ready(name);
        self.state.ready.retain(|n| n != name);
        if was_ready {
            out.push((
                Recipient::All,
                ServerEvent::ReadyUsersUpdated {
                    users: self.state.ready.clone(),
                },
            ));
        }

        match self.state.variant.kind() {
            GameKind::Dice => {
                out.extend(dice::drop_from_round(&mut self.state, name));
            }
            GameKind::HorseRace => {
                out.extend(horse::handle_departure(
                    &mut self.state,
                    name,
                    &mut rand::rng(),
                    unix_ms(),
                ));
            }
            GameKind::Roulette => {}
        }

        if seat.is_host {
            if let Some(next) = self
                .state
                .seats
                .iter_mut()
                .min_by_key(|s| s.joined_seq)
            {
                next.is_host = true;
                let host = next.name.clone();
                tracing::info!(room_id = %self.room_id, %host, "host transferred");
                out.push((Recipient::All, ServerEvent::HostChanged { host }));
            }
        }

        out.push((
            Recipient::All,
            ServerEvent::UpdateUsers {
                users: self.state.user_entries(),
            },
        ));
        self.notify_changed();

        if self.state.seats.is_empty() {
            tracing::info!(room_id = %self.room_id, "last seat gone, closing room");
            self.done = true;
        }
        out
    }

    // -- Game and roster events -------------------------------------------

    fn handle_apply(&mut self, conn: ConnId, event: ClientEvent) {
        let Some(seat) = self.state.seat_by_conn(conn) else {
            self.send_to(
                conn,
                ServerEvent::Error {
                    kind: RoomError::NotSeated.kind(),
                    message: RoomError::NotSeated.to_string(),
                },
            );
            return;
        };
        let name = seat.name.clone();

        let result: Result<Outbound, RoomError> = match event {
            ClientEvent::ToggleReady => Ok(self.toggle_ready(conn, &name)),
            ClientEvent::StartGame => {
                dice::start(&mut self.state, &name).map_err(Into::into)
            }
            ClientEvent::EndGame => {
                dice::end(&mut self.state, &name).map_err(Into::into)
            }
            ClientEvent::RequestRoll { seed, min, max } => {
                dice::roll(&mut self.state, &name, &seed, min, max, unix_ms())
                    .map_err(Into::into)
            }
            ClientEvent::StartRoulette => roulette::start(
                &mut self.state,
                &name,
                &mut rand::rng(),
                unix_ms(),
            )
            .map_err(Into::into),
            ClientEvent::RouletteResult { winner } => {
                Ok(roulette::complete(&mut self.state, &name, &winner))
            }
            ClientEvent::SelectHorse { vehicle_index } => horse::select(
                &mut self.state,
                &name,
                vehicle_index,
                &mut rand::rng(),
                unix_ms(),
            )
            .map_err(Into::into),
            ClientEvent::KickPlayer { target } => {
                self.handle_kick(&name, &target)
            }
            ClientEvent::TransferHost { target } => {
                self.handle_transfer(&name, &target)
            }
            other => {
                tracing::debug!(
                    room_id = %self.room_id, %conn, ?other,
                    "ignoring non-room event inside room"
                );
                Ok(Vec::new())
            }
        };

        match result {
            Ok(out) => self.dispatch(out),
            Err(e) => {
                tracing::debug!(
                    room_id = %self.room_id, %conn, error = %e,
                    "event rejected"
                );
                self.send_to(
                    conn,
                    ServerEvent::Error {
                        kind: e.kind(),
                        message: e.to_string(),
                    },
                );
            }
        }
    }

    fn toggle_ready(&mut self, conn: ConnId, name: &str) -> Outbound {
        let is_ready = if self.state.is_ready(name) {
            self.state.ready.retain(|n| n != name);
            false
        } else {
            self.state.ready.push(name.to_string());
            true
        };
        vec![
            (
                Recipient::Conn(conn),
                ServerEvent::ReadyStateChanged { is_ready },
            ),
            (
                Recipient::All,
                ServerEvent::ReadyUsersUpdated {
                    users: self.state.ready.clone(),
                },
            ),
        ]
    }

    fn handle_kick(
        &mut self,
        actor: &str,
        target: &str,
    ) -> Result<Outbound, RoomError> {
        self.state.require_host(actor, "kick players")?;
        if actor == target {
            return Err(RoomError::Game(
                parlor_game::GameError::InvalidState(
                    "the host cannot kick themselves".into(),
                ),
            ));
        }
        let Some(seat) = self.state.seat(target) else {
            return Err(RoomError::Game(
                parlor_game::GameError::UserNotFound(target.into()),
            ));
        };
        let target_conn = seat.conn();

        // Refused while the target already acted in the active round.
        dice::can_remove(&self.state, target)?;
        roulette::can_remove(&self.state, target)?;
        horse::can_remove(&self.state, target)?;

        tracing::info!(room_id = %self.room_id, %actor, %target, "player kicked");
        if let Some(conn) = target_conn {
            self.send_to(conn, ServerEvent::RoomLeft);
        }
        Ok(self.remove_seat(target))
    }

    fn handle_transfer(
        &mut self,
        actor: &str,
        target: &str,
    ) -> Result<Outbound, RoomError> {
        self.state.require_host(actor, "transfer the host seat")?;
        if self.state.seat(target).is_none() {
            return Err(RoomError::Game(
                parlor_game::GameError::UserNotFound(target.into()),
            ));
        }
        if actor == target {
            return Ok(Vec::new());
        }

        for seat in &mut self.state.seats {
            seat.is_host = seat.name == target;
        }
        tracing::info!(room_id = %self.room_id, %actor, %target, "host seat transferred");
        self.notify_changed();
        Ok(vec![
            (
                Recipient::All,
                ServerEvent::HostChanged {
                    host: target.to_string(),
                },
            ),
            (
                Recipient::All,
                ServerEvent::UpdateUsers {
                    users: self.state.user_entries(),
                },
            ),
        ])
    }

    // -- Outbound ----------------------------------------------------------

    fn dispatch(&self, msgs: Outbound) {
        for (recipient, event) in msgs {
            match recipient {
                Recipient::All => {
                    for sender in self.senders.values() {
                        let _ = sender.send(event.clone());
                    }
                }
                Recipient::Conn(conn) => self.send_to(conn, event),
                Recipient::AllExcept(excluded) => {
                    for (conn, sender) in &self.senders {
                        if *conn != excluded {
                            let _ = sender.send(event.clone());
                        }
                    }
                }
            }
        }
    }

    /// Sends to a single connection. Silently drops if the receiver is
    /// gone — the disconnect path will drop the seat shortly.
    fn send_to(&self, conn: ConnId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&conn) {
            let _ = sender.send(event);
        }
    }

    fn notify_changed(&self) {
        let _ = self
            .notices
            .send(RoomNotice::Changed(self.room_id.clone()));
    }

    // -- Views -------------------------------------------------------------

    fn join_outcome(&self, you: String, reconnected: bool) -> JoinOutcome {
        let vehicles = match &self.state.variant {
            GameVariant::HorseRace(h) => h.vehicles.clone(),
            _ => Vec::new(),
        };
        JoinOutcome {
            you,
            reconnected,
            users: self.state.user_entries(),
            summary: self.summary(),
            vehicles,
        }
    }

    fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.room_id.clone(),
            title: self.settings.title.clone(),
            game_kind: self.settings.game_kind,
            is_private: self.settings.is_private,
            has_password: self.settings.has_password(),
            players: self.state.seats.len(),
            capacity: self.settings.capacity,
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            summary: self.summary(),
            age: self.created_at.elapsed(),
            expiry: self.settings.expiry,
            is_empty: self.state.seats.is_empty(),
        }
    }
}

/// Spawns a new room actor task and returns a handle to it.
pub(crate) fn spawn_room(
    room_id: RoomId,
    settings: RoomSettings,
    config: RoomConfig,
    notices: mpsc::UnboundedSender<RoomNotice>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);

    let variant = GameVariant::for_kind(
        settings.game_kind,
        config.finish_rule,
        &mut rand::rng(),
    );
    let actor = RoomActor {
        room_id: room_id.clone(),
        settings,
        config,
        created_at: Instant::now(),
        state: GameState::new(variant),
        next_seat_seq: 0,
        senders: HashMap::new(),
        receiver: rx,
        notices,
        done: false,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
