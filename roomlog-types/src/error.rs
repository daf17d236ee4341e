//! Error types for the record model.

use thiserror::Error;

/// Errors that can occur while encoding or decoding log records.
///
/// Every decode failure is a malformed record from the consumer's point of
/// view; [`RecordError::is_malformed`] groups them.
#[derive(Debug, Error)]
pub enum RecordError {
    /// JSON serialization failed
    #[error("json serialization failed: {0}")]
    JsonEncode(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("json deserialization failed: {0}")]
    JsonDecode(#[source] serde_json::Error),

    /// MessagePack serialization failed
    #[error("msgpack serialization failed: {0}")]
    MsgPackEncode(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("msgpack deserialization failed: {0}")]
    MsgPackDecode(#[source] rmp_serde::decode::Error),

    /// Discriminator is not one of the four record types
    #[error("unknown record type: {0:?}")]
    UnknownType(String),

    /// Envelope did not carry exactly one payload
    #[error("record must carry exactly one payload, found {count}")]
    PayloadCount {
        /// Number of populated payload fields.
        count: usize,
    },

    /// The populated payload does not match the discriminator
    #[error("record of type {expected} carries a different payload")]
    PayloadMismatch {
        /// The discriminator on the envelope.
        expected: &'static str,
    },
}

impl RecordError {
    /// Whether this error means the bytes on the log are not a valid record.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::JsonEncode(_) | Self::MsgPackEncode(_))
    }
}
