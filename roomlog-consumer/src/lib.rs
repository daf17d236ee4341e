//! # roomlog-consumer
//!
//! Reader side of the room-state output log.
//!
//! Each consumer pulls the log from its own offset and keeps a local view of
//! every room it has seen:
//! - `NewRoomEvent` deltas are applied while the continuity chain holds; a
//!   break triggers a full state fetch through [`StateQuery`]
//! - `RedactedEvent` strips a stored event through [`Redactor`] and records
//!   the redaction in the event's `unsigned` section
//! - Invite records drive an invite tracker that ignores invalid transitions
//!
//! ## Example
//!
//! ```ignore
//! use roomlog_consumer::{ConsumerConfig, RoomStateConsumer};
//!
//! let config = ConsumerConfig::from_file(path)?;
//! let mut consumer = RoomStateConsumer::new(
//!     config.consumer,
//!     config.log.codec,
//!     state_query,
//!     event_store,
//!     redactor,
//! );
//! loop {
//!     for event in consumer.poll_once(&log).await? {
//!         // hand new events downstream
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collab;
pub mod config;
pub mod consumer;
pub mod error;

pub use collab::{
    CollaboratorError, EventStore, MemoryEventStore, MemoryStateQuery, Redactor, StateQuery,
    StripContent,
};
pub use config::{ConsumerConfig, ConsumerSettings, ErrorPolicy};
pub use consumer::{ConsumerEvent, RoomStateConsumer};
pub use error::ConsumerError;
