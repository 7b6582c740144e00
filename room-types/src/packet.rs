//! Packet - the envelope for every application message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Identity, WireError};

/// How a packet was framed by its sender.
///
/// Both modes carry the same (transport-defined) reliability. The marker only
/// records whether the packet was addressed or fanned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Addressed to exactly one peer (`to` is set).
    Unicast,
    /// Sent to every occupant (`to` is absent).
    Broadcast,
}

/// The envelope routed by the transport.
///
/// JSON shape:
/// `{from, to?, type, data, name?, avatarUrl?, sending?: true, broadcasting?: true}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Sender identity
    pub from: Identity,
    /// Recipient identity (unicast only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Identity>,
    /// Application message type
    #[serde(rename = "type")]
    pub kind: String,
    /// Application payload (opaque to the adapter)
    #[serde(default)]
    pub data: Value,
    /// Sender display name, when the transport attaches one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sender avatar, when the transport attaches one
    #[serde(
        default,
        rename = "avatarUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<String>,
    /// Set on addressed sends
    #[serde(default, skip_serializing_if = "is_false")]
    pub sending: bool,
    /// Set on broadcasts
    #[serde(default, skip_serializing_if = "is_false")]
    pub broadcasting: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl Packet {
    /// Frame an addressed packet.
    pub fn unicast(from: Identity, to: Identity, kind: impl Into<String>, data: Value) -> Self {
        Self {
            from,
            to: Some(to),
            kind: kind.into(),
            data,
            name: None,
            avatar_url: None,
            sending: true,
            broadcasting: false,
        }
    }

    /// Frame a broadcast packet.
    pub fn broadcast(from: Identity, kind: impl Into<String>, data: Value) -> Self {
        Self {
            from,
            to: None,
            kind: kind.into(),
            data,
            name: None,
            avatar_url: None,
            sending: false,
            broadcasting: true,
        }
    }

    /// Attach sender profile fields.
    pub fn with_profile(mut self, name: Option<String>, avatar_url: Option<String>) -> Self {
        self.name = name;
        self.avatar_url = avatar_url;
        self
    }

    /// The framing this packet was sent with.
    ///
    /// Packets relayed without either marker fall back to the presence of `to`.
    pub fn delivery_mode(&self) -> DeliveryMode {
        if self.sending {
            DeliveryMode::Unicast
        } else if self.broadcasting {
            DeliveryMode::Broadcast
        } else if self.to.is_some() {
            DeliveryMode::Unicast
        } else {
            DeliveryMode::Broadcast
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, WireError> {
        let packet: Packet = serde_json::from_slice(bytes).map_err(WireError::Deserialization)?;
        if packet.sending && packet.broadcasting {
            return Err(WireError::InvalidPacket(
                "packet is marked both sending and broadcasting".into(),
            ));
        }
        Ok(packet)
    }
}
