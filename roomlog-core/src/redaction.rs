//! Redaction validation for one room.
//!
//! A redaction is validated once both the redaction event and the event it
//! redacts have been output. Either can arrive first:
//!
//! - target, then redaction: validated when the redaction is observed.
//! - redaction, then target: the redaction waits as pending, possibly
//!   forever, and is validated when the target is observed.
//!
//! The tracker is fed events in the order their `NewRoomEvent` records were
//! appended, so every validation it reports follows the target's record.
//!
//! The tracker lives in memory and remembers every event output in its room
//! for as long as it exists. A producer that restarts exports it with
//! [`RedactionTracker::history`] and rebuilds it with
//! [`RedactionTracker::resume`].

use std::collections::{HashMap, HashSet};

use roomlog_types::{EventId, RedactedEvent, RoomEvent};

/// State of a (target, redaction) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionState {
    /// Only one side is known.
    Pending,
    /// Both sides are known; the `RedactedEvent` has been issued.
    Validated,
}

/// Persisted redaction state of one room.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedactionHistory {
    /// Events whose `NewRoomEvent` has been output.
    pub output: Vec<EventId>,
    /// Redactions still waiting for their target.
    pub pending: Vec<RoomEvent>,
    /// Targets whose `RedactedEvent` has been output.
    pub validated: Vec<EventId>,
}

/// Tracks output events and redactions of one room.
#[derive(Debug, Default)]
pub struct RedactionTracker {
    /// Every event observed so far. Grows with the room.
    seen: HashSet<EventId>,
    /// Redactions whose target has not been observed, keyed by target.
    pending: HashMap<EventId, RoomEvent>,
    /// Targets that have been validated.
    validated: HashSet<EventId>,
}

impl RedactionTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tracker from persisted history.
    ///
    /// Pending redactions whose target is already in `output` are validated
    /// immediately and returned for emission. Redactions of a target that
    /// was already validated are dropped.
    pub fn resume(history: RedactionHistory) -> (Self, Vec<RedactedEvent>) {
        let mut tracker = Self {
            seen: history.output.into_iter().collect(),
            pending: HashMap::new(),
            validated: history.validated.into_iter().collect(),
        };

        let mut ready = Vec::new();
        for redaction in history.pending {
            tracker.seen.insert(redaction.event_id.clone());
            let Some(target) = redaction.redaction_target().cloned() else {
                continue;
            };
            if tracker.validated.contains(&target) {
                continue;
            }
            if tracker.seen.contains(&target) {
                tracker.validated.insert(target.clone());
                ready.push(RedactedEvent {
                    redacted_event_id: target,
                    redacted_because: redaction,
                });
            } else {
                tracker.pending.entry(target).or_insert(redaction);
            }
        }
        (tracker, ready)
    }

    /// Export the tracker's state for persistence.
    ///
    /// Lists are sorted so the same state always exports the same way.
    pub fn history(&self) -> RedactionHistory {
        let mut output: Vec<EventId> = self.seen.iter().cloned().collect();
        output.sort();
        let mut pending: Vec<RoomEvent> = self.pending.values().cloned().collect();
        pending.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        let mut validated: Vec<EventId> = self.validated.iter().cloned().collect();
        validated.sort();
        RedactionHistory {
            output,
            pending,
            validated,
        }
    }

    /// Whether an event has already been observed.
    pub fn has_seen(&self, event_id: &EventId) -> bool {
        self.seen.contains(event_id)
    }

    /// Number of redactions waiting for their target.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// State of the redaction pair for a target, if any redaction of it is
    /// known.
    pub fn state(&self, target: &EventId) -> Option<RedactionState> {
        if self.validated.contains(target) {
            Some(RedactionState::Validated)
        } else if self.pending.contains_key(target) {
            Some(RedactionState::Pending)
        } else {
            None
        }
    }

    /// Record that an event's `NewRoomEvent` has been output.
    ///
    /// Returns the redactions this event validated, in emission order.
    /// Observing the same event twice returns nothing the second time.
    pub fn observe(&mut self, event: &RoomEvent) -> Vec<RedactedEvent> {
        if !self.seen.insert(event.event_id.clone()) {
            return Vec::new();
        }

        let mut validated = Vec::new();

        // A redaction was waiting for this event.
        if let Some(redaction) = self.pending.remove(&event.event_id) {
            self.validated.insert(event.event_id.clone());
            validated.push(RedactedEvent {
                redacted_event_id: event.event_id.clone(),
                redacted_because: redaction,
            });
        }

        // Targets already redacted by an earlier redaction are skipped.
        let target = event
            .redaction_target()
            .filter(|target| !self.validated.contains(*target));
        if let Some(target) = target {
            if self.seen.contains(target) {
                self.validated.insert(target.clone());
                validated.push(RedactedEvent {
                    redacted_event_id: target.clone(),
                    redacted_because: event.clone(),
                });
            } else {
                // First redaction wins while the target is unknown.
                self.pending
                    .entry(target.clone())
                    .or_insert_with(|| event.clone());
            }
        }

        validated
    }
}
