//! Room settings and server-wide room configuration.

use std::time::Duration;

use parlor_protocol::{FinishRule, GameKind};

/// Hard cap on seats per room.
pub const MAX_CAPACITY: usize = 50;

/// Longest allowed room lifetime, in hours.
pub const MAX_EXPIRY_HOURS: u32 = 168;

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// Per-room settings, fixed at creation from the `createRoom` request.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub title: String,
    pub is_private: bool,
    pub password: Option<String>,
    pub game_kind: GameKind,
    /// Lifetime; the expiry sweep deletes the room past this age.
    pub expiry: Duration,
    /// Refuse a second seat from the same source address.
    pub single_seat_per_ip: bool,
    pub capacity: usize,
}

impl RoomSettings {
    /// Builds settings from a creation request, clamping out-of-range
    /// values instead of rejecting them.
    pub fn from_request(
        title: String,
        is_private: bool,
        password: Option<String>,
        game_kind: GameKind,
        expiry_hours: u32,
        single_seat_per_ip: bool,
    ) -> Self {
        let hours = expiry_hours.clamp(1, MAX_EXPIRY_HOURS);
        Self {
            title,
            is_private,
            password: password.filter(|p| !p.is_empty()),
            game_kind,
            expiry: Duration::from_secs(u64::from(hours) * 3600),
            single_seat_per_ip,
            capacity: MAX_CAPACITY,
        }
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Server-wide knobs shared by every room actor.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// How long a dropped seat waits for a same-name reconnect before
    /// being evicted.
    pub reconnect_grace: Duration,

    /// Cadence of the actor's internal grace-eviction scan.
    pub maintenance_interval: Duration,

    /// Which finish rank wins a horse race.
    pub finish_rule: FinishRule,

    /// Command channel size per room actor (backpressure bound).
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(4),
            maintenance_interval: Duration::from_secs(1),
            finish_rule: FinishRule::First,
            channel_size: 64,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_request_clamps_expiry() {
        let s = RoomSettings::from_request(
            "t".into(),
            false,
            None,
            GameKind::Dice,
            0,
            false,
        );
        assert_eq!(s.expiry, Duration::from_secs(3600));

        let s = RoomSettings::from_request(
            "t".into(),
            false,
            None,
            GameKind::Dice,
            10_000,
            false,
        );
        assert_eq!(
            s.expiry,
            Duration::from_secs(u64::from(MAX_EXPIRY_HOURS) * 3600)
        );
    }

    #[test]
    fn test_from_request_drops_empty_password() {
        let s = RoomSettings::from_request(
            "t".into(),
            true,
            Some(String::new()),
            GameKind::Roulette,
            1,
            false,
        );
        assert!(!s.has_password());
    }

    #[test]
    fn test_default_config_grace_is_a_short_window() {
        let c = RoomConfig::default();
        assert!(c.reconnect_grace >= Duration::from_secs(3));
        assert!(c.reconnect_grace <= Duration::from_secs(5));
        assert!(c.maintenance_interval < c.reconnect_grace);
    }
}
