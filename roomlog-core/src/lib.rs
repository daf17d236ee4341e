//! # roomlog-core
//!
//! Pure logic for the room-state output log (no I/O, instant tests).
//!
//! This crate implements the algorithms both ends of the log rely on:
//! - [`delta`] - minimal state deltas between two state sets
//! - [`sequence`] - producer-side per-room sequencing and record building
//! - [`snapshot`] - consumer-side continuity checking
//! - [`redaction`] - redaction validation and emission ordering
//! - [`invite`] - invite activation and retirement
//!
//! ## Design Philosophy
//!
//! Every type here takes input and returns output without side effects.
//! The producer and consumer crates own the I/O (appending to the log,
//! querying state, persisting events) and drive these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod delta;
pub mod invite;
pub mod redaction;
pub mod sequence;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use delta::{StateDelta, StateSet};
pub use invite::{InviteError, InviteState, InviteTracker, InviteTransition};
pub use redaction::{RedactionHistory, RedactionState, RedactionTracker};
pub use sequence::{AcceptedEvent, RoomSequence, SequenceError};
pub use snapshot::{Continuity, RoomSnapshot, DEFAULT_REDELIVERY_WINDOW};
