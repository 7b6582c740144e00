//! # room-types
//!
//! Wire types shared by every roomlink crate.
//!
//! - [`Identity`] - transport-assigned participant id
//! - [`Packet`] - the addressed / broadcast envelope
//! - [`TransportEvent`] - everything a transport can push to the adapter
//! - [`OccupantSnapshot`] - who is currently in the room
//! - [`WireError`] - encode/decode failures

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;
mod packet;

pub use error::WireError;
pub use events::{ConnectStatus, JoinAck, MediaStream, TransportEvent};
pub use ids::{Identity, OccupantSnapshot};
pub use packet::{DeliveryMode, Packet};
