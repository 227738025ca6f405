//! WebSocket transport via `tokio-tungstenite`.
//!
//! One concrete transport, so no abstraction seam: the listener accepts
//! TCP, upgrades to WebSocket, stamps a fresh [`ConnId`], and records the
//! peer address — the room layer needs the source IP for its
//! single-seat-per-IP checks.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};

use parlor_protocol::ConnId;
use tokio::net::{TcpListener, TcpStream};

/// Counter for generating unique connection ids.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Errors from the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listen socket failed.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The WebSocket upgrade failed.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),
}

/// Listens for incoming WebSocket connections.
pub struct WsListener {
    listener: TcpListener,
}

impl WsListener {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::Bind)?;
        tracing::info!(addr, "websocket listener bound");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts and upgrades the next connection.
    pub async fn accept(&self) -> Result<WsConn, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let id = ConnId(NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer, "accepted websocket connection");

        Ok(WsConn {
            id,
            peer_ip: peer.ip(),
            ws,
        })
    }
}

/// One accepted connection, before it is handed to its handler task.
///
/// The handler splits `ws` into independent read and write halves, so
/// reads never block the outbound event pump.
pub struct WsConn {
    pub id: ConnId,
    pub peer_ip: IpAddr,
    pub ws: tokio_tungstenite::WebSocketStream<TcpStream>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_on_free_port_reports_addr() {
        let listener = WsListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_bad_addr_errors() {
        let result = WsListener::bind("999.0.0.1:0").await;
        assert!(matches!(result, Err(TransportError::Bind(_))));
    }

    #[tokio::test]
    async fn test_accept_assigns_distinct_conn_ids() {
        let listener = WsListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let a = tokio_tungstenite::connect_async(format!("ws://{addr}"))
                .await
                .unwrap();
            let b = tokio_tungstenite::connect_async(format!("ws://{addr}"))
                .await
                .unwrap();
            (a, b)
        });

        let first = listener.accept().await.unwrap();
        let second = listener.accept().await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(first.peer_ip.is_loopback());
        drop(client);
    }
}
