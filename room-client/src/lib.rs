//! # room-client
//!
//! Client network adapter for roomlink multi-party rooms.
//!
//! This is the library that applications use to join a room, exchange
//! messages with the other occupants, and read a shared server clock.
//!
//! ## Features
//!
//! - **Clock Sync**: averaged round-trip offset against an HTTP time authority
//! - **Presence**: occupant snapshots with the local participant filtered out
//! - **Messaging**: addressed and broadcast packets over any [`Transport`]
//! - **Pure State Machine**: Uses room-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use room_client::{AdapterConfig, HttpTimeSource, NetworkAdapter};
//!
//! let config = AdapterConfig::from_file("roomlink.toml".as_ref())?;
//! let time = HttpTimeSource::from_config(&config.clock)?;
//! let adapter = NetworkAdapter::new(config, my_transport, time)?;
//!
//! adapter.on_connect_success(|me| println!("joined as {me}"));
//! adapter.on_message(|from, kind, data, _, _| println!("{from} {kind} {data}"));
//! adapter.connect().await?;
//!
//! adapter.broadcast("pos", json!({"x": 1})).await;
//! let now = adapter.server_time();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod channel;
pub mod clock;
pub mod config;
pub mod listeners;
pub mod transport;

pub use adapter::{AdapterError, NetworkAdapter};
pub use channel::{demux, Delivery, InboundMessage, MessageChannel};
pub use clock::{
    local_now_ms, parse_http_date, ClockError, ClockSynchronizer, HttpTimeSource, MockTimeSource,
    TimeSource,
};
pub use config::{AdapterConfig, ClockConfig, ConfigError};
pub use listeners::Listeners;
pub use transport::{MockTransport, Transport, TransportError};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a listener panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
