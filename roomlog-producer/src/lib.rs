//! # roomlog-producer
//!
//! Room server side of the room-state output log.
//!
//! This crate turns upstream triggers into log records:
//! - An event accepted by state resolution becomes a `NewRoomEvent` carrying
//!   the minimal state delta and the room's continuity pointer
//! - A validated redaction becomes a `RedactedEvent`, always after the
//!   target's `NewRoomEvent`
//! - Invite transitions become `NewInviteEvent` / `RetireInviteEvent`
//!
//! ## Architecture
//!
//! ```text
//! state resolution ──► OutputProducer ──append──► OutputLog ──read──► consumers
//!                        │
//!                        ├─ room A: Mutex<RoomStream>  (sequence, redactions, outbox)
//!                        └─ room B: Mutex<RoomStream>
//! ```
//!
//! Emission is serialized per room; different rooms proceed in parallel.
//! The log itself is defined in `roomlog-log`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod producer;

pub use config::Config;
pub use error::ProducerError;
pub use metrics::{MetricsSnapshot, ProducerMetrics};
pub use producer::{OutputProducer, Published};
