//! Output log transport.
//!
//! The log is append-only: the producer appends encoded records and every
//! consumer reads them back in order from its own offset. Delivery and
//! offset commits of a real transport live behind [`OutputLog`];
//! [`MemoryLog`](crate::MemoryLog) keeps everything in process.

use crate::error::LogResult;
use async_trait::async_trait;
use roomlog_types::LogOffset;

/// A record as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Log-assigned position.
    pub offset: LogOffset,
    /// Encoded record bytes.
    pub payload: Vec<u8>,
}

/// Trait for output log backends.
#[async_trait]
pub trait OutputLog: Send + Sync {
    /// Append an encoded record.
    ///
    /// Returns the offset assigned to it.
    async fn append(&self, payload: Vec<u8>) -> LogResult<LogOffset>;

    /// Read records after the given offset, oldest first.
    ///
    /// Returns at most `limit` entries.
    async fn read(&self, after: LogOffset, limit: usize) -> LogResult<Vec<LogEntry>>;

    /// Offset of the newest record, or `LogOffset::zero()` if empty.
    async fn head(&self) -> LogResult<LogOffset>;
}
