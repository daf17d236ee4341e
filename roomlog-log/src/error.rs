//! Error types for the log transport.

/// Log transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    /// The log cannot accept or serve records right now.
    #[error("log unavailable: {0}")]
    Unavailable(String),

    /// The log has been closed.
    #[error("log closed")]
    Closed,
}

/// Result type alias for log operations.
pub type LogResult<T> = std::result::Result<T, LogError>;
