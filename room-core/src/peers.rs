//! Stream-connection readiness per peer.
//!
//! Independent of room membership: a peer can be stream-connected without
//! being an occupant and vice versa.

use room_types::{ConnectStatus, Identity};

/// Ordered set of peers considered stream-ready.
///
/// Duplicates are not removed on insert; a duplicate does not change what
/// [`status_of`](Self::status_of) reports, and
/// [`mark_disconnected`](Self::mark_disconnected) drops every copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerConnectionRegistry {
    connected: Vec<Identity>,
}

impl PeerConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a stream to `peer` opened.
    pub fn mark_connected(&mut self, peer: Identity) {
        self.connected.push(peer);
    }

    /// Record that the stream to `peer` closed. Returns how many entries were removed.
    pub fn mark_disconnected(&mut self, peer: &Identity) -> usize {
        let before = self.connected.len();
        self.connected.retain(|id| id != peer);
        before - self.connected.len()
    }

    /// Connectivity of `peer`.
    pub fn status_of(&self, peer: &Identity) -> ConnectStatus {
        if self.connected.contains(peer) {
            ConnectStatus::IsConnected
        } else {
            ConnectStatus::NotConnected
        }
    }

    /// Whether the local side should open a stream to `peer`.
    ///
    /// Every discovered peer is eligible.
    pub fn should_initiate_connection_to(&self, _peer: &Identity) -> bool {
        true
    }

    /// Stream-connected peers in insertion order.
    pub fn connected_peers(&self) -> &[Identity] {
        &self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_peer_is_not_connected() {
        let registry = PeerConnectionRegistry::new();
        assert_eq!(
            registry.status_of(&Identity::new("nobody")),
            ConnectStatus::NotConnected
        );
    }

    #[test]
    fn connect_then_disconnect() {
        let mut registry = PeerConnectionRegistry::new();
        let x = Identity::new("X");

        registry.mark_connected(x.clone());
        assert_eq!(registry.status_of(&x), ConnectStatus::IsConnected);

        registry.mark_disconnected(&x);
        assert_eq!(registry.status_of(&x), ConnectStatus::NotConnected);
    }

    #[test]
    fn duplicate_connect_is_tolerated_and_fully_removed() {
        let mut registry = PeerConnectionRegistry::new();
        let x = Identity::new("X");

        registry.mark_connected(x.clone());
        registry.mark_connected(x.clone());
        assert_eq!(registry.connected_peers().len(), 2);
        assert_eq!(registry.status_of(&x), ConnectStatus::IsConnected);

        assert_eq!(registry.mark_disconnected(&x), 2);
        assert_eq!(registry.status_of(&x), ConnectStatus::NotConnected);
    }

    #[test]
    fn disjoint_peers_do_not_interfere() {
        let mut registry = PeerConnectionRegistry::new();
        let a = Identity::new("A");
        let b = Identity::new("B");

        registry.mark_connected(b.clone());
        registry.mark_connected(a.clone());
        registry.mark_disconnected(&b);

        assert_eq!(registry.status_of(&a), ConnectStatus::IsConnected);
        assert_eq!(registry.status_of(&b), ConnectStatus::NotConnected);
        assert_eq!(registry.connected_peers(), &[a]);
    }

    #[test]
    fn disconnecting_unknown_peer_is_a_no_op() {
        let mut registry = PeerConnectionRegistry::new();
        assert_eq!(registry.mark_disconnected(&Identity::new("ghost")), 0);
    }

    #[test]
    fn every_peer_is_eligible() {
        let registry = PeerConnectionRegistry::new();
        assert!(registry.should_initiate_connection_to(&Identity::new("anyone")));
    }
}
