//! # room-core
//!
//! Pure logic for roomlink (no I/O, instant tests).
//!
//! This crate implements the clock-offset estimator, the occupant and
//! stream-connection tables, and the adapter lifecycle state machine without
//! any network access or timers.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (transport, HTTP time probes, timers) is performed by
//! `room-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod membership;
pub mod peers;
pub mod state;

pub use clock::{
    ClockState, OffsetSamples, ProbeOutcome, ProbeTiming, SyncPhase, DEFAULT_CONVERGE_PROBES,
    DEFAULT_MAX_SAMPLES, DEFAULT_PRECISION_MS, DEFAULT_STEADY_INTERVAL,
};
pub use membership::{MembershipTracker, OccupantDelta};
pub use peers::PeerConnectionRegistry;
pub use state::{Action, AdapterEvent, Event, Lifecycle, DEFAULT_ROOM};
