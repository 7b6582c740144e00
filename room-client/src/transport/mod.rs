//! Transport abstraction for roomlink.
//!
//! The adapter never touches sockets itself. A [`Transport`] is handed to
//! [`NetworkAdapter`](crate::NetworkAdapter) at construction and provides:
//! - `connect()` opens the connection and yields the assigned [`Identity`]
//! - `join_room()` asks to enter a room (acknowledged later via an event)
//! - `send_unicast()` / `send_broadcast()` emit packets
//! - `recv()` yields the next [`TransportEvent`]
//! - `close()` terminates
//!
//! Delivery guarantees are whatever the implementation provides; the adapter
//! adds no acknowledgement or retry layer.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! let me = transport.connect("ws://localhost:8080").await?;
//! transport.send_broadcast(&Packet::broadcast(me, "pos", json!([1, 2]))).await?;
//! let event = transport.recv().await?;
//! ```

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use room_types::{Identity, Packet, TransportEvent};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Room join request could not be sent.
    #[error("join failed: {0}")]
    JoinFailed(String),

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// A bidirectional message transport carrying room traffic.
///
/// Implementations handle the underlying connection mechanism
/// (WebSocket, socket.io-style relay, in-memory mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the server at `endpoint` and return the identity it assigned.
    async fn connect(&self, endpoint: &str) -> Result<Identity, TransportError>;

    /// Request to join `room` within `app`.
    ///
    /// The server answers with [`TransportEvent::JoinAcknowledged`]. Transports
    /// that join implicitly on connect can keep the default no-op.
    async fn join_room(&self, app: &str, room: &str) -> Result<(), TransportError> {
        let _ = (app, room);
        Ok(())
    }

    /// Send an addressed packet.
    async fn send_unicast(&self, packet: &Packet) -> Result<(), TransportError>;

    /// Send a packet to every occupant.
    async fn send_broadcast(&self, packet: &Packet) -> Result<(), TransportError>;

    /// Receive the next transport event.
    ///
    /// Waits until an event is available. Returns
    /// [`TransportError::ConnectionClosed`] once the connection is gone.
    async fn recv(&self) -> Result<TransportEvent, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
