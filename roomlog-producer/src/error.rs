//! Error types for the producer.

use roomlog_core::{InviteError, SequenceError};
use roomlog_log::LogError;
use roomlog_types::RecordError;

/// Main error type for producer operations.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The log rejected an append.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// A record could not be encoded.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Upstream handed over an event the room sequence cannot output.
    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),

    /// Upstream requested an invalid invite transition.
    #[error("invalid invite transition: {0}")]
    Invite(#[from] InviteError),
}

/// Result type alias for producer operations.
pub type Result<T> = std::result::Result<T, ProducerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use roomlog_types::EventId;

    #[test]
    fn error_display() {
        let err = ProducerError::from(SequenceError::MissingStateEvent {
            event_id: EventId::from("$x"),
        });
        assert_eq!(
            err.to_string(),
            "sequence error: added state event $x has no body"
        );
        assert_eq!(
            ProducerError::from(LogError::Closed).to_string(),
            "log error: log closed"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProducerError>();
    }
}
