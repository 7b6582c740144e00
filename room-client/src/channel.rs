//! Packet framing and inbound demultiplexing.
//!
//! There is a single delivery tier. `send_to` and `broadcast` are as reliable
//! as the transport underneath; nothing here acknowledges or retries.

use crate::lock;
use crate::transport::{Transport, TransportError};
use room_types::{Identity, Packet};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// What happened to an outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the transport.
    Sent,
    /// No transport attached yet; the packet was discarded.
    Dropped,
}

/// An inbound packet reduced to what the application listener receives.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Sender identity.
    pub from: Identity,
    /// Application message type.
    pub kind: String,
    /// Application payload.
    pub data: Value,
    /// Sender display name, if the transport attached one.
    pub name: Option<String>,
    /// Sender avatar, if the transport attached one.
    pub avatar_url: Option<String>,
}

/// Frames outbound application payloads for one connection.
///
/// Detached until the transport assigns an identity. Clones share the
/// last-broadcast slot.
pub struct MessageChannel<T> {
    link: Option<(Arc<T>, Identity)>,
    last_broadcast: Arc<Mutex<Option<Value>>>,
}

impl<T> Clone for MessageChannel<T> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            last_broadcast: Arc::clone(&self.last_broadcast),
        }
    }
}

impl<T: Transport> MessageChannel<T> {
    /// A channel with no transport attached.
    pub fn detached() -> Self {
        Self {
            link: None,
            last_broadcast: Arc::new(Mutex::new(None)),
        }
    }

    /// Attach the transport and the identity it assigned.
    pub fn attach(&mut self, transport: Arc<T>, local_id: Identity) {
        self.link = Some((transport, local_id));
    }

    /// Drop the transport; later sends are discarded with a warning.
    pub fn detach(&mut self) {
        self.link = None;
    }

    /// Whether a transport is attached.
    pub fn is_attached(&self) -> bool {
        self.link.is_some()
    }

    /// Local identity, once attached.
    pub fn local_id(&self) -> Option<&Identity> {
        self.link.as_ref().map(|(_, id)| id)
    }

    /// Send `data` to one peer.
    pub async fn send_to(
        &self,
        to: &Identity,
        kind: &str,
        data: Value,
    ) -> Result<Delivery, TransportError> {
        let Some((transport, local_id)) = &self.link else {
            tracing::warn!("No transport attached, dropping {:?} packet to {}", kind, to);
            return Ok(Delivery::Dropped);
        };

        let packet = Packet::unicast(local_id.clone(), to.clone(), kind, data);
        tracing::trace!("Sending {:?} to {}", kind, to);
        transport.send_unicast(&packet).await?;
        Ok(Delivery::Sent)
    }

    /// Send `data` to every occupant.
    ///
    /// The payload is remembered as [`last_broadcast`](Self::last_broadcast)
    /// even when no transport is attached.
    pub async fn broadcast(&self, kind: &str, data: Value) -> Result<Delivery, TransportError> {
        *lock(&self.last_broadcast) = Some(data.clone());

        let Some((transport, local_id)) = &self.link else {
            tracing::warn!("No transport attached, dropping {:?} broadcast", kind);
            return Ok(Delivery::Dropped);
        };

        let packet = Packet::broadcast(local_id.clone(), kind, data);
        tracing::trace!("Broadcasting {:?}", kind);
        transport.send_broadcast(&packet).await?;
        Ok(Delivery::Sent)
    }

    /// Payload of the most recent broadcast.
    pub fn last_broadcast(&self) -> Option<Value> {
        lock(&self.last_broadcast).clone()
    }
}

/// Reduce an inbound packet to listener arguments.
///
/// Unicast and broadcast packets are treated identically.
pub fn demux(packet: Packet) -> InboundMessage {
    InboundMessage {
        from: packet.from,
        kind: packet.kind,
        data: packet.data,
        name: packet.name,
        avatar_url: packet.avatar_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde_json::json;

    async fn attached() -> (MessageChannel<MockTransport>, MockTransport) {
        let transport = MockTransport::new();
        transport.assign_identity("me");
        let me = transport.connect("ws://relay").await.unwrap();

        let mut channel = MessageChannel::detached();
        channel.attach(Arc::new(transport.clone()), me);
        (channel, transport)
    }

    // ===========================================
    // Detached Channel Tests
    // ===========================================

    #[tokio::test]
    async fn send_before_attach_is_dropped() {
        let channel: MessageChannel<MockTransport> = MessageChannel::detached();

        let delivery = channel
            .send_to(&"peer1".into(), "pos", json!({"x": 1}))
            .await
            .unwrap();

        assert_eq!(delivery, Delivery::Dropped);
        assert!(!channel.is_attached());
        assert_eq!(channel.local_id(), None);
    }

    #[tokio::test]
    async fn broadcast_before_attach_still_records_payload() {
        let channel: MessageChannel<MockTransport> = MessageChannel::detached();

        let delivery = channel.broadcast("pos", json!([3, 4])).await.unwrap();

        assert_eq!(delivery, Delivery::Dropped);
        assert_eq!(channel.last_broadcast(), Some(json!([3, 4])));
    }

    // ===========================================
    // Attached Channel Tests
    // ===========================================

    #[tokio::test]
    async fn send_to_frames_unicast_packet() {
        let (channel, transport) = attached().await;

        let delivery = channel
            .send_to(&"peer1".into(), "pos", json!({"x": 1}))
            .await
            .unwrap();

        assert_eq!(delivery, Delivery::Sent);
        let sent = transport.sent_unicasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            serde_json::to_value(&sent[0]).unwrap(),
            json!({"from": "me", "to": "peer1", "type": "pos", "data": {"x": 1}, "sending": true})
        );
        assert!(transport.sent_broadcasts().is_empty());
    }

    #[tokio::test]
    async fn broadcast_frames_packet_without_recipient() {
        let (channel, transport) = attached().await;

        channel.broadcast("pos", json!([1, 2])).await.unwrap();

        let sent = transport.sent_broadcasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, None);
        assert!(sent[0].broadcasting);
        assert_eq!(channel.last_broadcast(), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn transport_failure_is_returned() {
        let (channel, transport) = attached().await;
        transport.fail_next_send("buffer full");

        let result = channel.send_to(&"peer1".into(), "pos", json!(1)).await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));
    }

    #[tokio::test]
    async fn clones_share_last_broadcast() {
        let (channel, _transport) = attached().await;
        let clone = channel.clone();

        clone.broadcast("pos", json!("x")).await.unwrap();
        assert_eq!(channel.last_broadcast(), Some(json!("x")));
    }

    // ===========================================
    // Demux Tests
    // ===========================================

    #[test]
    fn demux_extracts_listener_fields() {
        let packet = Packet::broadcast("a".into(), "chat", json!("hi"))
            .with_profile(Some("Ann".into()), Some("http://x/a.png".into()));

        let message = demux(packet);
        assert_eq!(message.from, Identity::new("a"));
        assert_eq!(message.kind, "chat");
        assert_eq!(message.data, json!("hi"));
        assert_eq!(message.name.as_deref(), Some("Ann"));
        assert_eq!(message.avatar_url.as_deref(), Some("http://x/a.png"));
    }

    #[test]
    fn demux_ignores_delivery_mode() {
        let unicast = Packet::unicast("a".into(), "me".into(), "t", json!(1));
        let broadcast = Packet::broadcast("a".into(), "t", json!(1));
        assert_eq!(demux(unicast), demux(broadcast));
    }
}
