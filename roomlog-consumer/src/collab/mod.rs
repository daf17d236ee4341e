//! Collaborators the consumer relies on.
//!
//! State resolution, event storage and the redaction algorithm live outside
//! this crate. The consumer reaches them through these traits; in-memory
//! implementations are provided for tests and embedding.

mod memory;

pub use memory::{MemoryEventStore, MemoryStateQuery, StripContent};

use async_trait::async_trait;
use roomlog_core::StateSet;
use roomlog_types::{EventId, RoomEvent, RoomId};
use thiserror::Error;

/// Collaborator errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The collaborator could not serve the request right now.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator has no answer for the request.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Resolves the full current state of a room.
#[async_trait]
pub trait StateQuery: Send + Sync {
    /// State event IDs of the room after `latest_event_ids`.
    async fn current_state(
        &self,
        room_id: &RoomId,
        latest_event_ids: &[EventId],
    ) -> Result<StateSet, CollaboratorError>;
}

/// Persistent event storage.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Store events. Events already stored are left unchanged.
    async fn store_events(&self, events: Vec<RoomEvent>) -> Result<(), CollaboratorError>;

    /// Fetch a stored event.
    async fn get_event(&self, event_id: &EventId) -> Result<Option<RoomEvent>, CollaboratorError>;

    /// Overwrite a stored event with a new version of itself.
    async fn replace_event(&self, event: RoomEvent) -> Result<(), CollaboratorError>;
}

/// Strips an event down to what survives redaction.
#[async_trait]
pub trait Redactor: Send + Sync {
    /// Return the redacted form of `event`.
    async fn redact(&self, event: RoomEvent) -> Result<RoomEvent, CollaboratorError>;
}
