//! In-process output log.
//!
//! Also used by tests to inject append failures and to redeliver records.

use crate::error::LogError;
use crate::transport::{LogEntry, OutputLog};
use async_trait::async_trait;
use roomlog_types::LogOffset;
use std::sync::Mutex;
use tokio::sync::RwLock;

/// Append-only log held in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: RwLock<Vec<LogEntry>>,
    fail_appends: Mutex<usize>,
    closed: Mutex<bool>,
}

impl MemoryLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cause the next `count` appends to fail.
    pub fn fail_next_appends(&self, count: usize) {
        if let Ok(mut fail) = self.fail_appends.lock() {
            *fail = count;
        }
    }

    /// Close the log; later appends and reads fail.
    pub fn close(&self) {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
    }

    /// Number of records in the log.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the log holds no records.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Append a copy of an existing record, as an at-least-once transport
    /// may do.
    pub async fn redeliver(&self, offset: LogOffset) -> Result<LogOffset, LogError> {
        let payload = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .find(|entry| entry.offset == offset)
                .map(|entry| entry.payload.clone())
                .ok_or_else(|| LogError::Unavailable(format!("no record at offset {offset}")))?
        };
        self.append(payload).await
    }

    fn check_open(&self) -> Result<(), LogError> {
        match self.closed.lock() {
            Ok(closed) if !*closed => Ok(()),
            _ => Err(LogError::Closed),
        }
    }

    fn take_failure(&self) -> bool {
        match self.fail_appends.lock() {
            Ok(mut fail) if *fail > 0 => {
                *fail -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl OutputLog for MemoryLog {
    async fn append(&self, payload: Vec<u8>) -> Result<LogOffset, LogError> {
        self.check_open()?;
        if self.take_failure() {
            return Err(LogError::Unavailable("injected append failure".into()));
        }
        let mut entries = self.entries.write().await;
        let offset = LogOffset::new(entries.len() as u64 + 1);
        entries.push(LogEntry { offset, payload });
        Ok(offset)
    }

    async fn read(&self, after: LogOffset, limit: usize) -> Result<Vec<LogEntry>, LogError> {
        self.check_open()?;
        let entries = self.entries.read().await;
        // Offsets start at 1 and are contiguous, so offset N sits at index N-1.
        let start = usize::try_from(after.value())
            .unwrap_or(usize::MAX)
            .min(entries.len());
        Ok(entries[start..].iter().take(limit).cloned().collect())
    }

    async fn head(&self) -> Result<LogOffset, LogError> {
        self.check_open()?;
        let entries = self.entries.read().await;
        Ok(entries.last().map(|e| e.offset).unwrap_or_else(LogOffset::zero))
    }
}
