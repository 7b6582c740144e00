//! Adapter lifecycle state machine.
//!
//! Pure and side-effect free: [`Lifecycle::on_event`] takes an event and
//! returns the next state plus the actions to execute. Probing the clock,
//! talking to the transport and calling listeners are all done by
//! room-client, which interprets the actions.
//!
//! ```text
//! Uninitialized ──ConnectRequested──▶ Connecting ──JoinAcknowledged──▶ Connected
//!                                        │                                │
//!                                  TransportFailed               DisconnectRequested
//!                                        ▼                                ▼
//!                                   Disconnected ◀───────────────────────┘
//! ```

use room_types::Identity;

/// Room name used before a join is acknowledged and after disconnect.
pub const DEFAULT_ROOM: &str = "default";

/// Adapter lifecycle - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Never connected.
    #[default]
    Uninitialized,
    /// Connect in progress.
    Connecting {
        /// Identity once the transport has assigned one.
        identity: Option<Identity>,
    },
    /// Room join acknowledged.
    Connected {
        /// Local identity for this connection.
        identity: Identity,
        /// Server-assigned join time (transport clock, ms).
        joined_at: u64,
        /// Canonical room name.
        room: String,
    },
    /// Torn down or failed; a new connect starts from scratch.
    Disconnected,
}

impl Lifecycle {
    /// Create a new state machine in the Uninitialized state.
    pub fn new() -> Self {
        Self::Uninitialized
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Fresh or torn-down adapters may connect
            (Self::Uninitialized | Self::Disconnected, Event::ConnectRequested) => (
                Self::Connecting { identity: None },
                vec![Action::StartClockSync, Action::OpenTransport],
            ),

            // From Connecting
            (Self::Connecting { identity: None }, Event::IdentityAssigned { identity }) => (
                Self::Connecting {
                    identity: Some(identity),
                },
                vec![Action::JoinRoom],
            ),
            (
                Self::Connecting {
                    identity: Some(identity),
                },
                Event::JoinAcknowledged { joined_at, room },
            ) => (
                Self::Connected {
                    identity: identity.clone(),
                    joined_at,
                    room: room.clone(),
                },
                vec![
                    Action::SetRoom { room, joined_at },
                    Action::EmitEvent(AdapterEvent::Connected { identity }),
                ],
            ),
            (Self::Connecting { .. }, Event::TransportFailed { error }) => (
                Self::Disconnected,
                vec![
                    Action::EmitEvent(AdapterEvent::ConnectionFailed { error }),
                    Action::Teardown,
                ],
            ),

            // From Connected: the server may move us to another room
            (Self::Connected { identity, .. }, Event::JoinAcknowledged { joined_at, room }) => (
                Self::Connected {
                    identity,
                    joined_at,
                    room: room.clone(),
                },
                vec![Action::SetRoom { room, joined_at }],
            ),

            (_, Event::DisconnectRequested) => {
                (Self::Disconnected, vec![Action::ResetRoom, Action::Teardown])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the room join has been acknowledged.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if a connect is in progress.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. })
    }

    /// Local identity, once assigned.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Connecting { identity } => identity.as_ref(),
            Self::Connected { identity, .. } => Some(identity),
            Self::Uninitialized | Self::Disconnected => None,
        }
    }
}

/// Events that drive the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Application called connect.
    ConnectRequested,
    /// Transport connected and assigned an identity.
    IdentityAssigned {
        /// The assigned identity.
        identity: Identity,
    },
    /// Transport confirmed the room join.
    JoinAcknowledged {
        /// Server-assigned join time.
        joined_at: u64,
        /// Canonical room name.
        room: String,
    },
    /// Transport reported an error.
    TransportFailed {
        /// Error description.
        error: String,
    },
    /// Application called disconnect.
    DisconnectRequested,
}

/// Actions to be executed by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run the first clock probe and start the probe loop.
    StartClockSync,
    /// Connect the transport.
    OpenTransport,
    /// Ask the transport to join the configured room.
    JoinRoom,
    /// Adopt the acknowledged room.
    SetRoom {
        /// Canonical room name.
        room: String,
        /// Server-assigned join time.
        joined_at: u64,
    },
    /// Put the room name back to [`DEFAULT_ROOM`].
    ResetRoom,
    /// Stop background tasks and close the transport.
    Teardown,
    /// Notify the application.
    EmitEvent(AdapterEvent),
}

/// Events surfaced to the application's listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    /// Connected to the room.
    Connected {
        /// Local identity.
        identity: Identity,
    },
    /// Connect failed.
    ConnectionFailed {
        /// Error description.
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connecting_with(id: &str) -> Lifecycle {
        Lifecycle::Connecting {
            identity: Some(Identity::new(id)),
        }
    }

    fn lobby_ack() -> Event {
        Event::JoinAcknowledged {
            joined_at: 5000,
            room: "lobby".into(),
        }
    }

    #[test]
    fn starts_uninitialized() {
        assert_eq!(Lifecycle::new(), Lifecycle::Uninitialized);
        assert_eq!(Lifecycle::default(), Lifecycle::Uninitialized);
    }

    #[test]
    fn connect_request_starts_clock_then_transport() {
        let (state, actions) = Lifecycle::new().on_event(Event::ConnectRequested);

        assert_eq!(state, Lifecycle::Connecting { identity: None });
        assert_eq!(actions, vec![Action::StartClockSync, Action::OpenTransport]);
    }

    #[test]
    fn reconnect_from_disconnected_is_allowed() {
        let (state, actions) = Lifecycle::Disconnected.on_event(Event::ConnectRequested);
        assert!(state.is_connecting());
        assert!(!actions.is_empty());
    }

    #[test]
    fn connect_request_while_connected_is_ignored() {
        let state = Lifecycle::Connected {
            identity: "me".into(),
            joined_at: 1,
            room: "lobby".into(),
        };
        let (next, actions) = state.clone().on_event(Event::ConnectRequested);
        assert_eq!(next, state);
        assert!(actions.is_empty());
    }

    #[test]
    fn identity_assignment_requests_join() {
        let (state, actions) = Lifecycle::Connecting { identity: None }.on_event(
            Event::IdentityAssigned {
                identity: "me".into(),
            },
        );

        assert_eq!(state, connecting_with("me"));
        assert_eq!(actions, vec![Action::JoinRoom]);
        assert_eq!(state.identity(), Some(&Identity::new("me")));
    }

    #[test]
    fn join_ack_transitions_to_connected() {
        let (state, actions) = connecting_with("me").on_event(lobby_ack());

        assert!(matches!(
            &state,
            Lifecycle::Connected { identity, joined_at: 5000, room }
                if identity.as_str() == "me" && room == "lobby"
        ));
        assert!(actions.contains(&Action::SetRoom {
            room: "lobby".into(),
            joined_at: 5000
        }));
        assert!(actions.contains(&Action::EmitEvent(AdapterEvent::Connected {
            identity: "me".into()
        })));
    }

    #[test]
    fn join_ack_before_identity_is_ignored() {
        let state = Lifecycle::Connecting { identity: None };
        let (next, actions) = state.clone().on_event(lobby_ack());
        assert_eq!(next, state);
        assert!(actions.is_empty());
    }

    #[test]
    fn transport_failure_while_connecting_emits_failure_once() {
        let (state, actions) = connecting_with("me").on_event(Event::TransportFailed {
            error: "refused".into(),
        });

        assert_eq!(state, Lifecycle::Disconnected);
        let failures = actions
            .iter()
            .filter(|a| matches!(a, Action::EmitEvent(AdapterEvent::ConnectionFailed { .. })))
            .count();
        assert_eq!(failures, 1);
        assert_eq!(actions.last(), Some(&Action::Teardown));
    }

    #[test]
    fn transport_failure_after_connected_keeps_state() {
        let state = Lifecycle::Connected {
            identity: "me".into(),
            joined_at: 5000,
            room: "lobby".into(),
        };
        let (next, actions) = state.clone().on_event(Event::TransportFailed {
            error: "blip".into(),
        });

        assert_eq!(next, state);
        assert!(actions.is_empty());
    }

    #[test]
    fn repeated_join_ack_updates_room() {
        let (state, _) = connecting_with("me").on_event(lobby_ack());
        let (state, actions) = state.on_event(Event::JoinAcknowledged {
            joined_at: 9000,
            room: "hall".into(),
        });

        assert!(matches!(
            &state,
            Lifecycle::Connected { joined_at: 9000, room, .. } if room == "hall"
        ));
        assert_eq!(
            actions,
            vec![Action::SetRoom {
                room: "hall".into(),
                joined_at: 9000
            }]
        );
    }

    #[test]
    fn disconnect_resets_room_and_tears_down() {
        let (state, _) = connecting_with("me").on_event(lobby_ack());
        let (state, actions) = state.on_event(Event::DisconnectRequested);

        assert_eq!(state, Lifecycle::Disconnected);
        assert_eq!(actions, vec![Action::ResetRoom, Action::Teardown]);
        assert_eq!(state.identity(), None);
    }

    #[test]
    fn disconnect_while_connecting_aborts() {
        let (state, actions) = connecting_with("me").on_event(Event::DisconnectRequested);
        assert_eq!(state, Lifecycle::Disconnected);
        assert!(actions.contains(&Action::Teardown));
    }

    #[test]
    fn full_connect_flow() {
        let state = Lifecycle::new();
        let (state, _) = state.on_event(Event::ConnectRequested);
        let (state, _) = state.on_event(Event::IdentityAssigned {
            identity: "abc".into(),
        });
        let (state, _) = state.on_event(lobby_ack());
        assert!(state.is_connected());

        let (state, _) = state.on_event(Event::DisconnectRequested);
        let (state, _) = state.on_event(Event::ConnectRequested);
        assert_eq!(state, Lifecycle::Connecting { identity: None });
    }

    #[test]
    fn helpers() {
        assert!(!Lifecycle::Uninitialized.is_connected());
        assert!(!Lifecycle::Uninitialized.is_connecting());
        assert!(Lifecycle::Connecting { identity: None }.is_connecting());
        assert!(!Lifecycle::Disconnected.is_connected());
    }
}
