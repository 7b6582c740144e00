//! Mock transport for testing.
//!
//! Captures outbound packets and lets tests inject inbound events.

use super::{Transport, TransportError};
use crate::lock;
use async_trait::async_trait;
use room_types::{Identity, Packet, TransportEvent};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Mock transport for testing.
///
/// Events pushed before `connect()` are queued and delivered once connected.
/// `close()` ends the event stream, so a pending `recv()` returns
/// [`TransportError::ConnectionClosed`].
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    events: Arc<tokio::sync::Mutex<Option<UnboundedReceiver<TransportEvent>>>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    endpoint: Option<String>,
    identity: Option<Identity>,
    next_identity: Option<Identity>,
    joined_rooms: Vec<(String, String)>,
    unicasts: Vec<Packet>,
    broadcasts: Vec<Packet>,
    pending: VecDeque<TransportEvent>,
    events_tx: Option<UnboundedSender<TransportEvent>>,
    fail_next_connect: Option<String>,
    fail_next_join: Option<String>,
    fail_next_send: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `identity` for the next `connect()` instead of a random one.
    pub fn assign_identity(&self, identity: impl Into<Identity>) {
        lock(&self.inner).next_identity = Some(identity.into());
    }

    /// Deliver an inbound event (queued until connected).
    pub fn push_event(&self, event: TransportEvent) {
        let mut inner = lock(&self.inner);
        let undelivered = match &inner.events_tx {
            Some(tx) => tx.send(event).err().map(|e| e.0),
            None => Some(event),
        };
        if let Some(event) = undelivered {
            inner.pending.push_back(event);
        }
    }

    /// Identity assigned by the last successful `connect()`.
    pub fn identity(&self) -> Option<Identity> {
        lock(&self.inner).identity.clone()
    }

    /// Endpoint passed to the last `connect()`.
    pub fn connected_endpoint(&self) -> Option<String> {
        lock(&self.inner).endpoint.clone()
    }

    /// Every `(app, room)` join requested so far.
    pub fn joined_rooms(&self) -> Vec<(String, String)> {
        lock(&self.inner).joined_rooms.clone()
    }

    /// All unicast packets sent.
    pub fn sent_unicasts(&self) -> Vec<Packet> {
        lock(&self.inner).unicasts.clone()
    }

    /// All broadcast packets sent.
    pub fn sent_broadcasts(&self) -> Vec<Packet> {
        lock(&self.inner).broadcasts.clone()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        lock(&self.inner).fail_next_connect = Some(error.to_string());
    }

    /// Cause the next join_room() to fail with the given error.
    pub fn fail_next_join(&self, error: &str) {
        lock(&self.inner).fail_next_join = Some(error.to_string());
    }

    /// Cause the next send to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        lock(&self.inner).fail_next_send = Some(error.to_string());
    }

    fn record_send(&self, packet: &Packet, broadcast: bool) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        // Record what a server would decode, not the caller's value
        let decoded = packet
            .to_json()
            .and_then(|bytes| Packet::from_json(&bytes))
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if broadcast {
            inner.broadcasts.push(decoded);
        } else {
            inner.unicasts.push(decoded);
        }
        Ok(())
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            events: Arc::clone(&self.events),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, endpoint: &str) -> Result<Identity, TransportError> {
        let forced = lock(&self.inner).fail_next_connect.take();
        if let Some(error) = forced {
            return Err(TransportError::ConnectionFailed(error));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().await = Some(rx);

        let mut inner = lock(&self.inner);
        for event in inner.pending.drain(..) {
            // Receiver is alive: it was stored above
            let _ = tx.send(event);
        }
        let identity = inner.next_identity.take().unwrap_or_else(Identity::random);
        inner.connected = true;
        inner.endpoint = Some(endpoint.to_string());
        inner.identity = Some(identity.clone());
        inner.events_tx = Some(tx);
        Ok(identity)
    }

    async fn join_room(&self, app: &str, room: &str) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_join.take() {
            return Err(TransportError::JoinFailed(error));
        }

        inner.joined_rooms.push((app.to_string(), room.to_string()));
        Ok(())
    }

    async fn send_unicast(&self, packet: &Packet) -> Result<(), TransportError> {
        self.record_send(packet, false)
    }

    async fn send_broadcast(&self, packet: &Packet) -> Result<(), TransportError> {
        self.record_send(packet, true)
    }

    async fn recv(&self) -> Result<TransportEvent, TransportError> {
        let mut events = self.events.lock().await;
        let rx = events.as_mut().ok_or(TransportError::NotConnected)?;
        rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        lock(&self.inner).connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = lock(&self.inner);
        inner.connected = false;
        // Dropping the sender ends the event stream
        inner.events_tx = None;
        Ok(())
    }
}
