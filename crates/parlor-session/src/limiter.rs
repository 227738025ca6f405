//! Per-connection sliding event counter.

use std::time::{Duration, Instant};

/// A fixed-window event counter: the count resets every `window`, and
/// events past `cap` within one window are refused.
///
/// Advisory only — refusal drops the event, nothing else. The counter
/// lives in the connection's registry entry, so a reconnect (new
/// connection id) naturally starts a fresh window.
#[derive(Debug)]
pub struct RateWindow {
    window: Duration,
    cap: u32,
    count: u32,
    window_start: Instant,
}

impl RateWindow {
    pub fn new(window: Duration, cap: u32) -> Self {
        Self {
            window,
            cap,
            count: 0,
            window_start: Instant::now(),
        }
    }

    /// Records one event and returns whether it is within the cap.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Clock-injected variant of [`allow`](Self::allow) for tests.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.count = 0;
        }
        self.count += 1;
        self.count <= self.cap
    }
}

// =========================================================================
// Tests
// =========================================================================
