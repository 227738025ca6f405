//! The room store: creates, tracks, and sweeps rooms.

use std::collections::HashMap;

use parlor_protocol::{RoomId, RoomSummary};
use rand::Rng;
use tokio::sync::mpsc;

use crate::room::{spawn_room, RoomNotice};
use crate::{RoomConfig, RoomError, RoomHandle, RoomSettings, RoomSnapshot};

/// Room-code alphabet: uppercase without the lookalikes (I, L, O, 0, 1).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

/// Tracks every active room.
///
/// Owned by the server state behind a mutex; rooms themselves run as
/// independent actors, so the store is only touched for create, lookup,
/// prune, and the periodic sweeps.
pub struct RoomStore {
    rooms: HashMap<RoomId, RoomHandle>,
    config: RoomConfig,
    notices: mpsc::UnboundedSender<RoomNotice>,
}

impl RoomStore {
    pub fn new(
        config: RoomConfig,
        notices: mpsc::UnboundedSender<RoomNotice>,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            notices,
        }
    }

    /// Creates a room and spawns its actor. The creator is seated by a
    /// regular join on the returned handle — the first seat becomes host.
    pub fn create_room(&mut self, settings: RoomSettings) -> RoomHandle {
        let room_id = self.unused_code();
        let handle = spawn_room(
            room_id.clone(),
            settings,
            self.config.clone(),
            self.notices.clone(),
        );
        self.rooms.insert(room_id.clone(), handle.clone());
        tracing::info!(%room_id, rooms = self.rooms.len(), "room created");
        handle
    }

    pub fn get(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    /// Drops the handle of a room whose actor stopped.
    pub fn prune(&mut self, room_id: &RoomId) {
        if self.rooms.remove(room_id).is_some() {
            tracing::info!(%room_id, rooms = self.rooms.len(), "room pruned");
        }
    }

    /// Collects a snapshot per room. Rooms that fail to respond (already
    /// shutting down) are skipped.
    pub async fn snapshots(&self) -> Vec<RoomSnapshot> {
        let mut out = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if let Ok(snap) = handle.summary().await {
                out.push(snap);
            }
        }
        out
    }

    /// Deletes rooms whose age exceeds their configured expiry.
    ///
    /// Each expired room broadcasts `roomDeleted` to its remaining seats
    /// before its actor stops. Returns the deleted ids. Best-effort: a
    /// missed sweep only delays cleanup.
    pub async fn sweep_expired(&mut self) -> Vec<RoomId> {
        let mut expired = Vec::new();
        for snap in self.snapshots().await {
            if snap.age > snap.expiry {
                expired.push(snap.summary.room_id.clone());
            }
        }
        for room_id in &expired {
            if let Some(handle) = self.rooms.remove(room_id) {
                tracing::info!(%room_id, "room expired, sweeping");
                let _ = handle.shutdown("the room expired").await;
            }
        }
        expired
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn unused_code(&self) -> RoomId {
        let mut rng = rand::rng();
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| {
                    CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]
                        as char
                })
                .collect();
            let id = RoomId(code);
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }
}

/// Filters room summaries for one viewer: public rooms always show;
/// a private room shows only to viewers currently seated in it.
pub fn visible_rooms(
    snapshots: &[RoomSnapshot],
    viewer_room: Option<&RoomId>,
) -> Vec<RoomSummary> {
    snapshots
        .iter()
        .filter(|snap| {
            !snap.summary.is_private
                || viewer_room == Some(&snap.summary.room_id)
        })
        .map(|snap| snap.summary.clone())
        .collect()
}

// =========================================================================
// Tests
// =========================================================================
