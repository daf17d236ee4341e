//! Producer counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational metrics for monitoring producer activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct ProducerMetrics {
    /// `NewRoomEvent` records appended.
    pub new_room_events: AtomicU64,
    /// `NewInviteEvent` records appended.
    pub new_invite_events: AtomicU64,
    /// `RetireInviteEvent` records appended.
    pub retire_invite_events: AtomicU64,
    /// `RedactedEvent` records appended.
    pub redacted_events: AtomicU64,
    /// Triggers ignored because the event was already output.
    pub duplicates_skipped: AtomicU64,
    /// Appends rejected by the log.
    pub append_failures: AtomicU64,
    /// Invite transitions refused as invalid.
    pub invalid_invite_transitions: AtomicU64,
}

/// Point-in-time copy of [`ProducerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// `NewRoomEvent` records appended.
    pub new_room_events: u64,
    /// `NewInviteEvent` records appended.
    pub new_invite_events: u64,
    /// `RetireInviteEvent` records appended.
    pub retire_invite_events: u64,
    /// `RedactedEvent` records appended.
    pub redacted_events: u64,
    /// Triggers ignored because the event was already output.
    pub duplicates_skipped: u64,
    /// Appends rejected by the log.
    pub append_failures: u64,
    /// Invite transitions refused as invalid.
    pub invalid_invite_transitions: u64,
}

impl ProducerMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            new_room_events: self.new_room_events.load(Ordering::Relaxed),
            new_invite_events: self.new_invite_events.load(Ordering::Relaxed),
            retire_invite_events: self.retire_invite_events.load(Ordering::Relaxed),
            redacted_events: self.redacted_events.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            append_failures: self.append_failures.load(Ordering::Relaxed),
            invalid_invite_transitions: self.invalid_invite_transitions.load(Ordering::Relaxed),
        }
    }
}
