//! NetworkAdapter - the application-facing side of roomlink.
//!
//! # Architecture
//!
//! The adapter owns one clock synchronizer, membership tracker, peer registry
//! and message channel per connection (rebuilt on every `connect()`). The
//! lifecycle is a pure state machine from room-core; the adapter interprets
//! its actions and performs the actual I/O.
//!
//! ```text
//! Application ─▶ NetworkAdapter ─▶ Transport ─▶ Network
//!       ▲               │    ▲
//!       │               ▼    │ event pump
//!   listeners    room-core (Lifecycle, ClockState, MembershipTracker, ...)
//! ```
//!
//! Two background tasks run per connection: the clock probe loop and the
//! transport event pump. Both are aborted on disconnect, reconnect, and drop.
//!
//! Send, broadcast and probe failures never surface as errors; they are
//! logged. `connect()` returns an error to the awaiting caller *and* fires the
//! failure listener once.

use crate::channel::{demux, MessageChannel};
use crate::clock::{ClockSynchronizer, TimeSource};
use crate::config::{AdapterConfig, ClockConfig, ConfigError};
use crate::listeners::Listeners;
use crate::lock;
use crate::transport::{Transport, TransportError};
use room_core::{
    Action, AdapterEvent, Event, Lifecycle, MembershipTracker, PeerConnectionRegistry,
    DEFAULT_ROOM,
};
use room_types::{ConnectStatus, Identity, MediaStream, OccupantSnapshot, TransportEvent};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Adapter errors.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Operation not allowed in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Per-connection state, guarded by one lock.
struct Session<T, S> {
    lifecycle: Lifecycle,
    app: String,
    room: String,
    server_url: String,
    room_join_time: Option<u64>,
    membership: MembershipTracker,
    peers: PeerConnectionRegistry,
    channel: MessageChannel<T>,
    clock: ClockSynchronizer<S>,
    tasks: Vec<JoinHandle<()>>,
    /// Incremented by every `connect()`; work from older attempts is discarded.
    attempt: u64,
}

struct Inner<T, S> {
    transport: Arc<T>,
    time_source: Arc<S>,
    clock_config: ClockConfig,
    session: Mutex<Session<T, S>>,
    listeners: Listeners,
}

/// Client network adapter for one participant.
pub struct NetworkAdapter<T: Transport + 'static, S: TimeSource + 'static> {
    inner: Arc<Inner<T, S>>,
}

impl<T: Transport + 'static, S: TimeSource + 'static> NetworkAdapter<T, S> {
    /// Create an adapter. Nothing happens on the network until `connect()`.
    pub fn new(config: AdapterConfig, transport: T, time_source: S) -> Result<Self, AdapterError> {
        config.validate()?;

        let transport = Arc::new(transport);
        let time_source = Arc::new(time_source);
        let clock = ClockSynchronizer::from_config(Arc::clone(&time_source), &config.clock);

        let session = Session {
            lifecycle: Lifecycle::new(),
            app: config.app,
            room: config.room,
            server_url: config.server_url,
            room_join_time: None,
            membership: MembershipTracker::new(),
            peers: PeerConnectionRegistry::new(),
            channel: MessageChannel::detached(),
            clock,
            tasks: Vec::new(),
            attempt: 0,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                time_source,
                clock_config: config.clock,
                session: Mutex::new(session),
                listeners: Listeners::new(),
            }),
        })
    }

    // ===========================================
    // Configuration
    // ===========================================

    /// Set the application name used for the next room join.
    pub fn set_app(&self, app: impl Into<String>) {
        lock(&self.inner.session).app = app.into();
    }

    /// Set the room used for the next room join.
    pub fn set_room(&self, room: impl Into<String>) {
        lock(&self.inner.session).room = room.into();
    }

    /// Set the transport endpoint used by the next `connect()`.
    pub fn set_server_url(&self, url: impl Into<String>) {
        lock(&self.inner.session).server_url = url.into();
    }

    // ===========================================
    // Listener Registration
    // ===========================================

    /// Called with the local identity once the room join is acknowledged.
    pub fn on_connect_success(&self, listener: impl Fn(&Identity) + Send + Sync + 'static) {
        self.inner.listeners.set_connect_success(listener);
    }

    /// Called once when a connect attempt fails.
    pub fn on_connect_failure(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner.listeners.set_connect_failure(listener);
    }

    /// Called with every occupant snapshot (local identity removed).
    pub fn on_occupants_changed(
        &self,
        listener: impl Fn(&OccupantSnapshot) + Send + Sync + 'static,
    ) {
        self.inner.listeners.set_occupants(listener);
    }

    /// Called when a peer's stream is marked open.
    pub fn on_channel_open(&self, listener: impl Fn(&Identity) + Send + Sync + 'static) {
        self.inner.listeners.set_channel_open(listener);
    }

    /// Called when a peer's stream is marked closed.
    pub fn on_channel_closed(&self, listener: impl Fn(&Identity) + Send + Sync + 'static) {
        self.inner.listeners.set_channel_closed(listener);
    }

    /// Called with `(from, type, data, name, avatar_url)` for every inbound packet.
    pub fn on_message(
        &self,
        listener: impl Fn(&Identity, &str, &Value, Option<&str>, Option<&str>)
            + Send
            + Sync
            + 'static,
    ) {
        self.inner.listeners.set_message(listener);
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    /// Connect: prime the clock, open the transport, request the room join.
    ///
    /// Returns once the join has been requested. The success listener fires
    /// later, when the transport acknowledges the join.
    ///
    /// # Errors
    ///
    /// [`AdapterError::InvalidState`] if already connecting or connected, or
    /// if `disconnect()` ran before the join was requested (nothing is left
    /// running in that case); [`AdapterError::Transport`] if the transport
    /// fails (the failure listener has fired by then).
    pub async fn connect(&self) -> Result<(), AdapterError> {
        let (attempt, actions) = {
            let mut session = lock(&self.inner.session);
            if !matches!(
                session.lifecycle,
                Lifecycle::Uninitialized | Lifecycle::Disconnected
            ) {
                return Err(AdapterError::InvalidState(format!(
                    "connect() while {:?}",
                    session.lifecycle
                )));
            }

            self.inner.reset_components(&mut session);
            session.attempt += 1;
            let actions = session.apply(Event::ConnectRequested);
            tracing::info!(
                "Connecting to {} (app {}, room {})",
                session.server_url,
                session.app,
                session.room
            );
            (session.attempt, actions)
        };

        for action in actions {
            match action {
                Action::StartClockSync => self.inner.start_clock(attempt).await?,
                Action::OpenTransport => self.inner.open_transport(attempt).await?,
                other => self.inner.run(vec![other]).await,
            }
        }
        Ok(())
    }

    /// Leave the room: reset the room name, stop background work, close the
    /// transport.
    pub async fn disconnect(&self) {
        tracing::info!("Disconnecting");
        let actions = self.inner.transition(Event::DisconnectRequested);
        self.inner.run(actions).await;
    }

    // ===========================================
    // Messaging
    // ===========================================

    /// Send `data` to one peer. Dropped with a warning if not connected.
    pub async fn send_to(&self, peer: &Identity, kind: &str, data: Value) {
        let channel = lock(&self.inner.session).channel.clone();
        if let Err(e) = channel.send_to(peer, kind, data).await {
            tracing::warn!("Send to {} failed: {}", peer, e);
        }
    }

    /// Send `data` to every occupant. Dropped with a warning if not connected.
    pub async fn broadcast(&self, kind: &str, data: Value) {
        let channel = lock(&self.inner.session).channel.clone();
        if let Err(e) = channel.broadcast(kind, data).await {
            tracing::warn!("Broadcast failed: {}", e);
        }
    }

    /// Payload of the most recent broadcast on this connection.
    pub fn last_broadcast(&self) -> Option<Value> {
        lock(&self.inner.session).channel.last_broadcast()
    }

    // ===========================================
    // Stream Connections
    // ===========================================

    /// Mark the stream to `peer` as open and notify the listener.
    pub fn start_stream_connection(&self, peer: Identity) {
        lock(&self.inner.session).peers.mark_connected(peer.clone());
        tracing::debug!("Stream to {} opened", peer);
        self.inner.listeners.emit_channel_open(&peer);
    }

    /// Mark the stream to `peer` as closed and notify the listener.
    pub fn close_stream_connection(&self, peer: &Identity) {
        lock(&self.inner.session).peers.mark_disconnected(peer);
        tracing::debug!("Stream to {} closed", peer);
        self.inner.listeners.emit_channel_closed(peer);
    }

    /// Stream connectivity of `peer`.
    pub fn connect_status(&self, peer: &Identity) -> ConnectStatus {
        lock(&self.inner.session).peers.status_of(peer)
    }

    /// Whether a stream to `peer` should be opened from this side.
    pub fn should_start_connection_to(&self, peer: &Identity) -> bool {
        lock(&self.inner.session)
            .peers
            .should_initiate_connection_to(peer)
    }

    /// Media streams are not supported.
    pub fn media_stream(&self, _peer: &Identity) -> Option<MediaStream> {
        None
    }

    // ===========================================
    // Clock
    // ===========================================

    /// Estimated server time (Unix ms). Local time until a probe succeeds.
    pub fn server_time(&self) -> i64 {
        lock(&self.inner.session).clock.server_time()
    }

    /// Current average clock offset (ms).
    pub fn avg_time_offset(&self) -> f64 {
        lock(&self.inner.session).clock.avg_offset_ms()
    }

    // ===========================================
    // Accessors (owned copies)
    // ===========================================

    /// Local identity, once the transport assigned one.
    pub fn identity(&self) -> Option<Identity> {
        lock(&self.inner.session).lifecycle.identity().cloned()
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        lock(&self.inner.session).lifecycle.clone()
    }

    /// Application name.
    pub fn app(&self) -> String {
        lock(&self.inner.session).app.clone()
    }

    /// Current room name.
    pub fn room(&self) -> String {
        lock(&self.inner.session).room.clone()
    }

    /// Transport endpoint.
    pub fn server_url(&self) -> String {
        lock(&self.inner.session).server_url.clone()
    }

    /// Server-assigned join time of the current room.
    pub fn room_join_time(&self) -> Option<u64> {
        lock(&self.inner.session).room_join_time
    }

    /// Current occupants (local identity excluded).
    pub fn occupants(&self) -> OccupantSnapshot {
        lock(&self.inner.session).membership.occupants().clone()
    }

    /// Stream-connected peers in the order they were marked.
    pub fn connected_peers(&self) -> Vec<Identity> {
        lock(&self.inner.session).peers.connected_peers().to_vec()
    }

    /// Get a reference to the transport (for testing).
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T: Transport + 'static, S: TimeSource + 'static> Drop for NetworkAdapter<T, S> {
    fn drop(&mut self) {
        for task in lock(&self.inner.session).tasks.drain(..) {
            task.abort();
        }
    }
}

impl<T, S> Session<T, S> {
    /// Whether connect attempt `attempt` is still the one in progress.
    fn is_current(&self, attempt: u64) -> bool {
        self.attempt == attempt && self.lifecycle.is_connecting()
    }

    /// Feed an event to the lifecycle and return the actions to run.
    fn apply(&mut self, event: Event) -> Vec<Action> {
        let (next, actions) = self.lifecycle.clone().on_event(event);
        if next != self.lifecycle {
            tracing::info!("Lifecycle {:?} -> {:?}", self.lifecycle, next);
        }
        self.lifecycle = next;
        actions
    }
}

fn cancelled() -> AdapterError {
    AdapterError::InvalidState("disconnected while connecting".into())
}

impl<T: Transport + 'static, S: TimeSource + 'static> Inner<T, S> {
    fn transition(&self, event: Event) -> Vec<Action> {
        lock(&self.session).apply(event)
    }

    /// Apply `event` only while connect attempt `attempt` is in progress.
    fn transition_if_current(&self, attempt: u64, event: Event) -> Option<Vec<Action>> {
        let mut session = lock(&self.session);
        session.is_current(attempt).then(|| session.apply(event))
    }

    /// Fresh per-connection components; stops any leftover tasks.
    fn reset_components(&self, session: &mut Session<T, S>) {
        for task in session.tasks.drain(..) {
            task.abort();
        }
        session.membership = MembershipTracker::new();
        session.peers = PeerConnectionRegistry::new();
        session.channel = MessageChannel::detached();
        session.clock =
            ClockSynchronizer::from_config(Arc::clone(&self.time_source), &self.clock_config);
        session.room_join_time = None;
    }

    /// Await the first probe, then leave the loop running in the background.
    async fn start_clock(&self, attempt: u64) -> Result<(), AdapterError> {
        let clock = lock(&self.session).clock.clone();
        clock.probe().await;

        let mut session = lock(&self.session);
        if !session.is_current(attempt) {
            return Err(cancelled());
        }
        session.tasks.push(clock.spawn());
        Ok(())
    }

    async fn open_transport(self: &Arc<Self>, attempt: u64) -> Result<(), AdapterError> {
        let server_url = {
            let session = lock(&self.session);
            if !session.is_current(attempt) {
                return Err(cancelled());
            }
            session.server_url.clone()
        };

        let identity = match self.transport.connect(&server_url).await {
            Ok(identity) => identity,
            Err(e) => return Err(self.fail(attempt, e).await),
        };

        // Identity, channel and pump change together or not at all
        let actions = {
            let mut session = lock(&self.session);
            if session.is_current(attempt) {
                let actions = session.apply(Event::IdentityAssigned {
                    identity: identity.clone(),
                });
                session
                    .channel
                    .attach(Arc::clone(&self.transport), identity.clone());
                let pump = tokio::spawn(Arc::clone(self).pump_events(attempt));
                session.tasks.push(pump);
                Some(actions)
            } else {
                None
            }
        };

        let Some(actions) = actions else {
            // A newer connect() owns the transport once the attempt moved on
            let superseded = lock(&self.session).attempt != attempt;
            if !superseded {
                if let Err(e) = self.transport.close().await {
                    tracing::warn!("Transport close failed: {}", e);
                }
            }
            return Err(cancelled());
        };

        tracing::info!("Transport assigned identity {}", identity);
        for action in actions {
            match action {
                Action::JoinRoom => {
                    if let Err(e) = self.join_room().await {
                        return Err(self.fail(attempt, e).await);
                    }
                }
                other => self.run(vec![other]).await,
            }
        }
        Ok(())
    }

    async fn join_room(&self) -> Result<(), TransportError> {
        let (app, room) = {
            let session = lock(&self.session);
            (session.app.clone(), session.room.clone())
        };
        tracing::info!("Joining room {}/{}", app, room);
        self.transport.join_room(&app, &room).await
    }

    /// Report a connect failure and tear down.
    async fn fail(&self, attempt: u64, error: TransportError) -> AdapterError {
        let Some(actions) = self.transition_if_current(
            attempt,
            Event::TransportFailed {
                error: error.to_string(),
            },
        ) else {
            tracing::debug!("Ignoring failure of abandoned attempt: {}", error);
            return cancelled();
        };
        tracing::error!("Connection failed: {}", error);
        self.run(actions).await;
        AdapterError::Transport(error)
    }

    async fn pump_events(self: Arc<Self>, attempt: u64) {
        tracing::debug!("Transport event pump started");
        loop {
            match self.transport.recv().await {
                Ok(event) => self.handle_event(attempt, event).await,
                Err(e) => {
                    let failed = self.transition_if_current(
                        attempt,
                        Event::TransportFailed {
                            error: e.to_string(),
                        },
                    );
                    match failed {
                        Some(actions) => {
                            tracing::error!("Transport closed while connecting: {}", e);
                            self.run(actions).await;
                        }
                        None => tracing::debug!("Transport event stream ended: {}", e),
                    }
                    break;
                }
            }
        }
    }

    async fn handle_event(&self, attempt: u64, event: TransportEvent) {
        match event {
            TransportEvent::Connected => tracing::info!("Transport connected"),
            TransportEvent::JoinAcknowledged(ack) => {
                tracing::debug!("Join acknowledged: {} at {}", ack.room, ack.joined_time);
                let actions = {
                    let mut session = lock(&self.session);
                    if session.attempt != attempt {
                        return;
                    }
                    session.apply(Event::JoinAcknowledged {
                        joined_at: ack.joined_time,
                        room: ack.room,
                    })
                };
                self.run(actions).await;
            }
            TransportEvent::Error(error) => {
                let failed = self.transition_if_current(
                    attempt,
                    Event::TransportFailed {
                        error: error.clone(),
                    },
                );
                match failed {
                    Some(actions) => {
                        tracing::error!("Transport error while connecting: {}", error);
                        self.run(actions).await;
                    }
                    None => tracing::warn!("Transport error: {}", error),
                }
            }
            TransportEvent::OccupantsChanged(raw) => {
                let view = {
                    let mut session = lock(&self.session);
                    if session.attempt != attempt {
                        return;
                    }
                    let local_id = session.lifecycle.identity().cloned();
                    session
                        .membership
                        .apply_snapshot(raw, local_id.as_ref())
                        .clone()
                };
                tracing::debug!("Occupants changed ({} peers)", view.len());
                self.listeners.emit_occupants(&view);
            }
            TransportEvent::Unicast(packet) | TransportEvent::Broadcast(packet) => {
                let message = demux(packet);
                tracing::trace!("Message {:?} from {}", message.kind, message.from);
                self.listeners.emit_message(
                    &message.from,
                    &message.kind,
                    &message.data,
                    message.name.as_deref(),
                    message.avatar_url.as_deref(),
                );
            }
        }
    }

    /// Execute actions in order, including any they produce.
    async fn run(&self, actions: Vec<Action>) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            let follow_up = self.execute(action).await;
            queue.extend(follow_up);
        }
    }

    async fn execute(&self, action: Action) -> Vec<Action> {
        match action {
            Action::StartClockSync | Action::OpenTransport => {
                tracing::debug!("{:?} outside connect(), ignoring", action);
                Vec::new()
            }
            Action::JoinRoom => match self.join_room().await {
                Ok(()) => Vec::new(),
                Err(e) => {
                    tracing::error!("Join request failed: {}", e);
                    self.transition(Event::TransportFailed {
                        error: e.to_string(),
                    })
                }
            },
            Action::SetRoom { room, joined_at } => {
                let mut session = lock(&self.session);
                session.room = room;
                session.room_join_time = Some(joined_at);
                Vec::new()
            }
            Action::ResetRoom => {
                lock(&self.session).room = DEFAULT_ROOM.to_string();
                Vec::new()
            }
            Action::Teardown => {
                if let Err(e) = self.transport.close().await {
                    tracing::warn!("Transport close failed: {}", e);
                }
                let tasks = {
                    let mut session = lock(&self.session);
                    session.channel.detach();
                    std::mem::take(&mut session.tasks)
                };
                // May include the task running this code; it stops at its next await
                for task in tasks {
                    task.abort();
                }
                Vec::new()
            }
            Action::EmitEvent(AdapterEvent::Connected { identity }) => {
                tracing::info!("Connected to room {} as {}", self.room_name(), identity);
                self.listeners.emit_connect_success(&identity);
                Vec::new()
            }
            Action::EmitEvent(AdapterEvent::ConnectionFailed { error }) => {
                tracing::debug!("Reporting connection failure: {}", error);
                self.listeners.emit_connect_failure();
                Vec::new()
            }
        }
    }

    fn room_name(&self) -> String {
        lock(&self.session).room.clone()
    }
}
