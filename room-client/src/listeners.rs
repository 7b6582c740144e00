//! Application callbacks.
//!
//! One listener per slot; registering again replaces the previous one.
//! Listeners are cloned out of the lock before they run, so a callback may
//! call back into the adapter.

use crate::lock;
use room_types::{Identity, OccupantSnapshot};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Called with the local identity once the room join is acknowledged.
pub type ConnectSuccessListener = Arc<dyn Fn(&Identity) + Send + Sync>;
/// Called once when a connect attempt fails.
pub type ConnectFailureListener = Arc<dyn Fn() + Send + Sync>;
/// Called with the filtered occupant snapshot.
pub type OccupantListener = Arc<dyn Fn(&OccupantSnapshot) + Send + Sync>;
/// Called with a peer whose stream opened or closed.
pub type ChannelListener = Arc<dyn Fn(&Identity) + Send + Sync>;
/// Called with `(from, type, data, name, avatar_url)` for every inbound packet.
pub type MessageListener =
    Arc<dyn Fn(&Identity, &str, &Value, Option<&str>, Option<&str>) + Send + Sync>;

#[derive(Default)]
struct Slots {
    connect_success: Option<ConnectSuccessListener>,
    connect_failure: Option<ConnectFailureListener>,
    occupants: Option<OccupantListener>,
    channel_open: Option<ChannelListener>,
    channel_closed: Option<ChannelListener>,
    message: Option<MessageListener>,
}

/// The adapter's listener slots.
#[derive(Default)]
pub struct Listeners {
    slots: Mutex<Slots>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = lock(&self.slots);
        f.debug_struct("Listeners")
            .field("connect_success", &slots.connect_success.is_some())
            .field("connect_failure", &slots.connect_failure.is_some())
            .field("occupants", &slots.occupants.is_some())
            .field("channel_open", &slots.channel_open.is_some())
            .field("channel_closed", &slots.channel_closed.is_some())
            .field("message", &slots.message.is_some())
            .finish()
    }
}

impl Listeners {
    /// Create empty slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the connect-success listener.
    pub fn set_connect_success(&self, listener: impl Fn(&Identity) + Send + Sync + 'static) {
        lock(&self.slots).connect_success = Some(Arc::new(listener));
    }

    /// Register the connect-failure listener.
    pub fn set_connect_failure(&self, listener: impl Fn() + Send + Sync + 'static) {
        lock(&self.slots).connect_failure = Some(Arc::new(listener));
    }

    /// Register the occupants listener.
    pub fn set_occupants(&self, listener: impl Fn(&OccupantSnapshot) + Send + Sync + 'static) {
        lock(&self.slots).occupants = Some(Arc::new(listener));
    }

    /// Register the channel-open listener.
    pub fn set_channel_open(&self, listener: impl Fn(&Identity) + Send + Sync + 'static) {
        lock(&self.slots).channel_open = Some(Arc::new(listener));
    }

    /// Register the channel-closed listener.
    pub fn set_channel_closed(&self, listener: impl Fn(&Identity) + Send + Sync + 'static) {
        lock(&self.slots).channel_closed = Some(Arc::new(listener));
    }

    /// Register the message listener.
    pub fn set_message(
        &self,
        listener: impl Fn(&Identity, &str, &Value, Option<&str>, Option<&str>) + Send + Sync + 'static,
    ) {
        lock(&self.slots).message = Some(Arc::new(listener));
    }

    pub(crate) fn emit_connect_success(&self, identity: &Identity) {
        let listener = lock(&self.slots).connect_success.clone();
        match listener {
            Some(listener) => listener(identity),
            None => tracing::debug!("No connect-success listener registered"),
        }
    }

    pub(crate) fn emit_connect_failure(&self) {
        let listener = lock(&self.slots).connect_failure.clone();
        match listener {
            Some(listener) => listener(),
            None => tracing::debug!("No connect-failure listener registered"),
        }
    }

    pub(crate) fn emit_occupants(&self, occupants: &OccupantSnapshot) {
        let listener = lock(&self.slots).occupants.clone();
        match listener {
            Some(listener) => listener(occupants),
            None => tracing::debug!("No occupants listener registered"),
        }
    }

    pub(crate) fn emit_channel_open(&self, peer: &Identity) {
        let listener = lock(&self.slots).channel_open.clone();
        if let Some(listener) = listener {
            listener(peer);
        }
    }

    pub(crate) fn emit_channel_closed(&self, peer: &Identity) {
        let listener = lock(&self.slots).channel_closed.clone();
        if let Some(listener) = listener {
            listener(peer);
        }
    }

    pub(crate) fn emit_message(
        &self,
        from: &Identity,
        kind: &str,
        data: &Value,
        name: Option<&str>,
        avatar_url: Option<&str>,
    ) {
        let listener = lock(&self.slots).message.clone();
        match listener {
            Some(listener) => listener(from, kind, data, name, avatar_url),
            None => tracing::debug!("No message listener registered, dropping {:?}", kind),
        }
    }
}
