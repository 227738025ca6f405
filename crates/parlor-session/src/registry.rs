//! The connection registry: every live transport connection and where it
//! currently sits.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is NOT thread-safe by itself — it uses a plain
//! `HashMap` and is owned by the server state behind a higher-level
//! mutex. Keeping it simple here avoids hidden locking overhead.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use parlor_protocol::{ConnId, RoomId};
use tokio::sync::mpsc;

use crate::{RateWindow, SessionError};

/// Configuration for connection bookkeeping.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Rate-limit window length.
    pub rate_window: Duration,
    /// Events allowed per window; the 51st in 10 s is dropped.
    pub rate_cap: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            rate_window: Duration::from_secs(10),
            rate_cap: 50,
        }
    }
}

/// One live connection's bookkeeping entry.
#[derive(Debug)]
pub struct ConnEntry<T> {
    pub conn: ConnId,
    /// Source address, used for single-seat-per-IP room checks.
    pub ip: IpAddr,
    /// Client-supplied device tag, if any.
    pub device: Option<String>,
    /// The room this connection currently sits in.
    pub room: Option<RoomId>,
    /// The display name the connection was seated under.
    pub name: Option<String>,
    /// Outbound event channel to this connection's writer task.
    pub sender: mpsc::UnboundedSender<T>,
    limiter: RateWindow,
}

/// Tracks every live connection on the server.
pub struct ConnectionRegistry<T> {
    conns: HashMap<ConnId, ConnEntry<T>>,
    config: RegistryConfig,
}

impl<T> ConnectionRegistry<T> {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            conns: HashMap::new(),
            config,
        }
    }

    /// Registers a freshly accepted connection.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyBound`] if the id is already known.
    pub fn bind(
        &mut self,
        conn: ConnId,
        ip: IpAddr,
        device: Option<String>,
        sender: mpsc::UnboundedSender<T>,
    ) -> Result<(), SessionError> {
        if self.conns.contains_key(&conn) {
            return Err(SessionError::AlreadyBound(conn));
        }
        self.conns.insert(
            conn,
            ConnEntry {
                conn,
                ip,
                device,
                room: None,
                name: None,
                sender,
                limiter: RateWindow::new(
                    self.config.rate_window,
                    self.config.rate_cap,
                ),
            },
        );
        tracing::debug!(%conn, %ip, "connection bound");
        Ok(())
    }

    /// Removes a closed connection. Returns its entry for final cleanup
    /// (the handler uses the room id to route the disconnect).
    pub fn unbind(&mut self, conn: ConnId) -> Option<ConnEntry<T>> {
        let entry = self.conns.remove(&conn);
        if entry.is_some() {
            tracing::debug!(%conn, "connection unbound");
        }
        entry
    }

    /// Records which room and name the connection was seated under.
    pub fn set_room(
        &mut self,
        conn: ConnId,
        room: RoomId,
        name: String,
    ) -> Result<(), SessionError> {
        let entry = self
            .conns
            .get_mut(&conn)
            .ok_or(SessionError::NotFound(conn))?;
        entry.room = Some(room);
        entry.name = Some(name);
        Ok(())
    }

    /// Clears the seat binding after a leave.
    pub fn clear_room(&mut self, conn: ConnId) {
        if let Some(entry) = self.conns.get_mut(&conn) {
            entry.room = None;
            entry.name = None;
        }
    }

    /// Counts one inbound event against the connection's rate window.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] — unknown connection
    /// - [`SessionError::RateLimited`] — over the cap; drop the event
    pub fn allow_event(&mut self, conn: ConnId) -> Result<(), SessionError> {
        let entry = self
            .conns
            .get_mut(&conn)
            .ok_or(SessionError::NotFound(conn))?;
        if entry.limiter.allow() {
            Ok(())
        } else {
            tracing::warn!(%conn, "event dropped by rate limiter");
            Err(SessionError::RateLimited(conn))
        }
    }

    pub fn get(&self, conn: ConnId) -> Option<&ConnEntry<T>> {
        self.conns.get(&conn)
    }

    /// Sends an event to one connection. Silently drops if the receiver
    /// is gone — the disconnect path will unbind it shortly.
    pub fn send_to(&self, conn: ConnId, event: T) {
        if let Some(entry) = self.conns.get(&conn) {
            let _ = entry.sender.send(event);
        }
    }

    /// Iterates all live entries (room-list fan-out).
    pub fn connections(&self) -> impl Iterator<Item = &ConnEntry<T>> {
        self.conns.values()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
