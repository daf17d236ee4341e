//! # roomlog-types
//!
//! Record model for the room-state output log.
//!
//! This crate provides the foundational types shared by the producer and
//! every consumer of the log:
//! - [`EventId`], [`RoomId`], [`UserId`], [`ServerName`], [`RoomVersion`],
//!   [`LogOffset`] - Identity and ordering types
//! - [`RoomEvent`] - The event body carried inside records
//! - [`OutputEvent`] - The four record variants
//! - [`Codec`] - JSON and MessagePack encodings of a record
//! - [`RecordError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod error;
mod event;
mod ids;
mod records;
mod wire;

pub use envelope::{Codec, OutputEvent, OutputType};
pub use error::RecordError;
pub use event::{RoomEvent, Unsigned, EVENT_TYPE_MEMBER, EVENT_TYPE_REDACTION};
pub use ids::{EventId, LogOffset, RoomId, RoomVersion, ServerName, UserId};
pub use records::{
    Membership, NewInviteEvent, NewRoomEvent, RedactedEvent, RetireInviteEvent, TransactionId,
};
