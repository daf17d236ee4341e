//! Error types for the consumer.

use crate::collab::CollaboratorError;
use roomlog_log::LogError;
use roomlog_types::{EventId, RecordError, RoomId};

/// Main error type for consumer operations.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// The record could not be decoded or its envelope is invalid.
    #[error("malformed record: {0}")]
    Malformed(#[from] RecordError),

    /// A `RedactedEvent` named an event this consumer never stored.
    #[error("redaction target {event_id} in {room_id} is not stored")]
    UnknownRedactionTarget {
        /// The missing target.
        event_id: EventId,
        /// Room of the redaction.
        room_id: RoomId,
    },

    /// A collaborator failed.
    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// The log could not be read.
    #[error("log error: {0}")]
    Log(#[from] LogError),
}

impl ConsumerError {
    /// Whether the error concerns one record, as opposed to the
    /// consumer's environment.
    ///
    /// Only record errors are subject to the error policy; anything else is
    /// always returned with the offset left on the failing record.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            ConsumerError::Malformed(_) | ConsumerError::UnknownRedactionTarget { .. }
        )
    }
}

/// Result type alias for consumer operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_errors() {
        assert!(ConsumerError::from(RecordError::UnknownType("x".into())).is_record_error());
        assert!(ConsumerError::UnknownRedactionTarget {
            event_id: "$e".into(),
            room_id: "!r:example.org".into(),
        }
        .is_record_error());
        assert!(!ConsumerError::from(LogError::Closed).is_record_error());
        assert!(
            !ConsumerError::from(CollaboratorError::Unavailable("down".into())).is_record_error()
        );
    }

    #[test]
    fn error_display() {
        let err = ConsumerError::UnknownRedactionTarget {
            event_id: "$e".into(),
            room_id: "!r:example.org".into(),
        };
        assert_eq!(
            err.to_string(),
            "redaction target $e in !r:example.org is not stored"
        );
    }
}
