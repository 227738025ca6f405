//! `ParlorServer` builder and the server loop.
//!
//! Ties the layers together: the accept loop spawns a handler task per
//! connection; side tasks run the expiry sweep, consume room notices,
//! and fan out the debounced room list.

use std::sync::Arc;
use std::time::Duration;

use parlor_protocol::ServerEvent;
use parlor_room::{
    visible_rooms, Debouncer, RoomConfig, RoomNotice, RoomStore,
};
use parlor_session::{ConnectionRegistry, RegistryConfig};
use tokio::sync::{mpsc, Mutex};

use crate::handler::handle_connection;
use crate::transport::WsListener;
use crate::ParlorError;

/// Server-wide configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Cadence of the room expiry sweep. Much shorter than any room's
    /// expiry duration.
    pub sweep_interval: Duration,
    /// Debounce window for room-list broadcasts (leading + trailing).
    pub debounce_window: Duration,
    pub room: RoomConfig,
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9000".into(),
            sweep_interval: Duration::from_secs(60),
            debounce_window: Duration::from_millis(200),
            room: RoomConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) registry: Mutex<ConnectionRegistry<ServerEvent>>,
    pub(crate) store: Mutex<RoomStore>,
    pub(crate) debouncer: Debouncer,
}

/// Builder for configuring and starting a Parlor server.
pub struct ParlorServerBuilder {
    config: ServerConfig,
}

impl ParlorServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and assembles the server state.
    pub async fn build(self) -> Result<ParlorServer, ParlorError> {
        let listener = WsListener::bind(&self.config.bind_addr).await?;
        let (debouncer, fires) = Debouncer::new(self.config.debounce_window);
        let (notice_tx, notices) = mpsc::unbounded_channel();

        let state = Arc::new(ServerState {
            registry: Mutex::new(ConnectionRegistry::new(
                self.config.registry.clone(),
            )),
            store: Mutex::new(RoomStore::new(
                self.config.room.clone(),
                notice_tx,
            )),
            debouncer,
        });

        Ok(ParlorServer {
            listener,
            state,
            notices,
            fires,
            sweep_interval: self.config.sweep_interval,
        })
    }
}

impl Default for ParlorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Parlor server. Call [`run`](Self::run) to start accepting.
pub struct ParlorServer {
    listener: WsListener,
    state: Arc<ServerState>,
    notices: mpsc::UnboundedReceiver<RoomNotice>,
    fires: mpsc::UnboundedReceiver<()>,
    sweep_interval: Duration,
}

impl ParlorServer {
    pub fn builder() -> ParlorServerBuilder {
        ParlorServerBuilder::new()
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop and side tasks until the process terminates.
    pub async fn run(self) -> Result<(), ParlorError> {
        let ParlorServer {
            listener,
            state,
            mut notices,
            mut fires,
            sweep_interval,
        } = self;

        tracing::info!("parlor server running");

        // Expiry sweep: deletes over-age rooms, notifying seats first.
        let sweep_state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(sweep_interval);
            tick.set_missed_tick_behavior(
                tokio::time::MissedTickBehavior::Delay,
            );
            loop {
                tick.tick().await;
                let swept =
                    sweep_state.store.lock().await.sweep_expired().await;
                if !swept.is_empty() {
                    sweep_state.debouncer.trigger();
                }
            }
        });

        // Room notices: list refreshes, handle pruning, seat unbinding.
        let notice_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(notice) = notices.recv().await {
                match notice {
                    RoomNotice::Changed(_) => {
                        notice_state.debouncer.trigger();
                    }
                    RoomNotice::Closed(room_id) => {
                        notice_state.store.lock().await.prune(&room_id);
                        notice_state.debouncer.trigger();
                    }
                    RoomNotice::Unseated { conn, .. } => {
                        notice_state
                            .registry
                            .lock()
                            .await
                            .clear_room(conn);
                    }
                }
            }
        });

        // Debounced room-list fan-out, filtered per viewer.
        let fanout_state = Arc::clone(&state);
        tokio::spawn(async move {
            while fires.recv().await.is_some() {
                broadcast_room_list(&fanout_state).await;
            }
        });

        loop {
            match listener.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Sends each live connection its view of the room list: public rooms
/// plus the private room it currently sits in.
pub(crate) async fn broadcast_room_list(state: &Arc<ServerState>) {
    let snapshots = state.store.lock().await.snapshots().await;
    let registry = state.registry.lock().await;
    for entry in registry.connections() {
        let rooms = visible_rooms(&snapshots, entry.room.as_ref());
        let _ = entry
            .sender
            .send(ServerEvent::RoomsListUpdated { rooms });
    }
}
