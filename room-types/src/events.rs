//! Events a transport delivers to the adapter.

use serde::{Deserialize, Serialize};

use crate::{OccupantSnapshot, Packet};

/// Server confirmation that this participant joined a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinAck {
    /// Server-assigned join time (transport clock, ms)
    #[serde(rename = "joinedTime", alias = "joinedTimestamp")]
    pub joined_time: u64,
    /// Canonical room name as the server knows it
    #[serde(rename = "curRoom", alias = "roomName")]
    pub room: String,
}

/// Everything a transport can report.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Underlying connection is up
    Connected,
    /// Room join confirmed
    JoinAcknowledged(JoinAck),
    /// Transport-level error
    Error(String),
    /// New raw occupant snapshot
    OccupantsChanged(OccupantSnapshot),
    /// Addressed packet received
    Unicast(Packet),
    /// Broadcast packet received
    Broadcast(Packet),
}

/// Per-peer stream connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// Peer is not stream-connected
    NotConnected,
    /// Peer is stream-connected
    IsConnected,
}

/// Media streams are not carried by roomlink; this type has no values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStream {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_ack_decodes_server_field_names() {
        let ack: JoinAck =
            serde_json::from_str(r#"{"joinedTime": 5000, "curRoom": "lobby"}"#).unwrap();
        assert_eq!(ack.joined_time, 5000);
        assert_eq!(ack.room, "lobby");
    }

    #[test]
    fn join_ack_accepts_descriptive_aliases() {
        let ack: JoinAck =
            serde_json::from_str(r#"{"joinedTimestamp": 7, "roomName": "hall"}"#).unwrap();
        assert_eq!(ack.joined_time, 7);
        assert_eq!(ack.room, "hall");
    }
}
