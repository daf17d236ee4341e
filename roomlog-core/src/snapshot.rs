//! Consumer-side continuity tracking for one room.
//!
//! A consumer keeps the ID of the last event it applied (its cursor) and the
//! current state set. A `NewRoomEvent` can only be applied incrementally if
//! its `last_sent_event_id` equals the cursor; otherwise the consumer has
//! missed records and must fetch the full state again.

use std::collections::{HashSet, VecDeque};

use roomlog_types::{EventId, NewRoomEvent};

use crate::delta::{StateDelta, StateSet};

/// How many recently applied event IDs are remembered to recognise
/// redelivered records.
pub const DEFAULT_REDELIVERY_WINDOW: usize = 1024;

/// Outcome of offering a record to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuity {
    /// The delta was applied.
    Applied {
        /// State immediately before the record's event.
        state_before: StateSet,
    },
    /// The record was applied before; nothing changed.
    Redelivered,
    /// The record does not follow the cursor. Nothing changed; the caller
    /// must resync.
    Mismatch {
        /// The cursor the record should have named.
        expected: Option<EventId>,
        /// What the record named instead.
        received: Option<EventId>,
    },
}

/// Local view of one room's current state.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    cursor: Option<EventId>,
    current: StateSet,
    suspect: bool,
    recent: VecDeque<EventId>,
    recent_set: HashSet<EventId>,
    window: usize,
}

impl RoomSnapshot {
    /// An empty snapshot for a room nothing has been received for.
    pub fn new() -> Self {
        Self::with_state(None, StateSet::new())
    }

    /// A snapshot seeded from persisted state.
    pub fn with_state(cursor: Option<EventId>, current: StateSet) -> Self {
        let mut snapshot = Self {
            cursor: None,
            current,
            suspect: false,
            recent: VecDeque::new(),
            recent_set: HashSet::new(),
            window: DEFAULT_REDELIVERY_WINDOW,
        };
        if let Some(cursor) = cursor {
            snapshot.remember(cursor.clone());
            snapshot.cursor = Some(cursor);
        }
        snapshot
    }

    /// Set how many applied event IDs are remembered for redelivery checks.
    pub fn with_redelivery_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self.trim();
        self
    }

    /// The last applied event.
    pub fn cursor(&self) -> Option<&EventId> {
        self.cursor.as_ref()
    }

    /// The current state set.
    pub fn current(&self) -> &StateSet {
        &self.current
    }

    /// Whether local data loss was detected for this room.
    pub fn is_suspect(&self) -> bool {
        self.suspect
    }

    /// Flag the snapshot for reconciliation.
    pub fn mark_suspect(&mut self) {
        self.suspect = true;
    }

    /// Offer a record.
    ///
    /// Records already applied (within the redelivery window) are skipped.
    /// Records following the cursor have their removes then adds applied.
    /// Anything else is a mismatch and leaves the snapshot untouched.
    pub fn apply(&mut self, record: &NewRoomEvent) -> Continuity {
        let event_id = &record.event.event_id;
        if self.recent_set.contains(event_id) {
            return Continuity::Redelivered;
        }
        if record.last_sent_event_id != self.cursor {
            return Continuity::Mismatch {
                expected: self.cursor.clone(),
                received: record.last_sent_event_id.clone(),
            };
        }

        StateDelta::new(
            record.adds_state_event_ids.clone(),
            record.removes_state_event_ids.clone(),
        )
        .apply_to(&mut self.current);
        self.advance(event_id.clone());

        Continuity::Applied {
            state_before: self.state_before(record),
        }
    }

    /// Replace the snapshot wholesale after fetching the full state.
    ///
    /// Clears the suspect flag.
    pub fn reset(&mut self, cursor: EventId, current: StateSet) {
        self.current = current;
        self.suspect = false;
        self.advance(cursor);
    }

    /// The state before a record's event, derived from the current state.
    ///
    /// Only meaningful while `record` is the record the current state
    /// reflects.
    pub fn state_before(&self, record: &NewRoomEvent) -> StateSet {
        StateDelta::new(
            record.state_before_adds_event_ids.clone(),
            record.state_before_removes_event_ids.clone(),
        )
        .applied(&self.current)
    }

    fn advance(&mut self, cursor: EventId) {
        self.remember(cursor.clone());
        self.cursor = Some(cursor);
    }

    fn remember(&mut self, id: EventId) {
        if self.recent_set.insert(id.clone()) {
            self.recent.push_back(id);
            self.trim();
        }
    }

    fn trim(&mut self) {
        while self.recent.len() > self.window {
            if let Some(old) = self.recent.pop_front() {
                self.recent_set.remove(&old);
            }
        }
    }
}

impl Default for RoomSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{AcceptedEvent, RoomSequence};
    use crate::testing::{message, state, ROOM};

    fn set(ids: &[&str]) -> StateSet {
        ids.iter().map(|id| EventId::from(*id)).collect()
    }

    fn record(id: &str, last: Option<&str>, adds: &[&str], removes: &[&str]) -> NewRoomEvent {
        NewRoomEvent {
            event: state(id, "m.room.topic"),
            historical: false,
            latest_event_ids: vec![id.into()],
            adds_state_event_ids: adds.iter().map(|i| EventId::from(*i)).collect(),
            adds_state_events: vec![],
            removes_state_event_ids: removes.iter().map(|i| EventId::from(*i)).collect(),
            last_sent_event_id: last.map(EventId::from),
            state_before_adds_event_ids: vec![],
            state_before_removes_event_ids: vec![],
            send_as_server: None,
            transaction_id: None,
        }
    }

    #[test]
    fn first_record_applies_to_empty_snapshot() {
        let mut snap = RoomSnapshot::new();
        let outcome = snap.apply(&record("$e1", None, &["$e1"], &[]));
        assert!(matches!(outcome, Continuity::Applied { .. }));
        assert_eq!(snap.cursor(), Some(&EventId::from("$e1")));
        assert_eq!(snap.current(), &set(&["$e1"]));
    }

    #[test]
    fn chain_applies_in_order() {
        let mut snap = RoomSnapshot::new();
        let chain = [
            record("$e1", None, &["$e1"], &[]),
            record("$e2", Some("$e1"), &["$e2"], &[]),
            record("$e3", Some("$e2"), &["$e3"], &["$e1"]),
            record("$e4", Some("$e3"), &["$e4"], &["$e3"]),
        ];
        for r in &chain {
            assert!(matches!(snap.apply(r), Continuity::Applied { .. }));
        }
        assert_eq!(snap.current(), &set(&["$e2", "$e4"]));
        assert_eq!(snap.cursor(), Some(&EventId::from("$e4")));
    }

    #[test]
    fn out_of_sequence_record_is_mismatch() {
        let mut snap = RoomSnapshot::with_state(Some("$e1".into()), set(&["$e1"]));
        let outcome = snap.apply(&record("$e3", Some("$e2"), &["$e3"], &["$e1"]));
        assert_eq!(
            outcome,
            Continuity::Mismatch {
                expected: Some("$e1".into()),
                received: Some("$e2".into()),
            }
        );
        // untouched
        assert_eq!(snap.current(), &set(&["$e1"]));
        assert_eq!(snap.cursor(), Some(&EventId::from("$e1")));
    }

    #[test]
    fn fresh_consumer_mid_stream_mismatches() {
        let mut snap = RoomSnapshot::new();
        assert!(matches!(
            snap.apply(&record("$e5", Some("$e4"), &[], &[])),
            Continuity::Mismatch { expected: None, .. }
        ));
    }

    #[test]
    fn redelivered_records_are_skipped() {
        let mut snap = RoomSnapshot::new();
        let r1 = record("$e1", None, &["$e1"], &[]);
        let r2 = record("$e2", Some("$e1"), &["$e2"], &["$e1"]);
        snap.apply(&r1);
        snap.apply(&r2);

        assert_eq!(snap.apply(&r2), Continuity::Redelivered);
        assert_eq!(snap.apply(&r1), Continuity::Redelivered);
        assert_eq!(snap.current(), &set(&["$e2"]));
        assert_eq!(snap.cursor(), Some(&EventId::from("$e2")));
    }

    #[test]
    fn redelivery_window_is_bounded() {
        let mut snap = RoomSnapshot::new().with_redelivery_window(2);
        let r1 = record("$e1", None, &[], &[]);
        snap.apply(&r1);
        snap.apply(&record("$e2", Some("$e1"), &[], &[]));
        snap.apply(&record("$e3", Some("$e2"), &[], &[]));
        // $e1 fell out of the window, so it now looks out of sequence
        assert!(matches!(snap.apply(&r1), Continuity::Mismatch { .. }));
    }

    #[test]
    fn reset_replaces_state_and_clears_suspect() {
        let mut snap = RoomSnapshot::with_state(Some("$e1".into()), set(&["$e1"]));
        snap.mark_suspect();
        snap.reset("$e9".into(), set(&["$a", "$b"]));
        assert!(!snap.is_suspect());
        assert_eq!(snap.cursor(), Some(&EventId::from("$e9")));
        assert_eq!(snap.current(), &set(&["$a", "$b"]));
        assert!(matches!(
            snap.apply(&record("$e10", Some("$e9"), &["$c"], &[])),
            Continuity::Applied { .. }
        ));
    }

    #[test]
    fn state_before_applies_after_current_delta() {
        let mut snap = RoomSnapshot::with_state(Some("$e1".into()), set(&["$a", "$old"]));
        let mut r = record("$new", Some("$e1"), &["$new"], &["$old"]);
        r.state_before_adds_event_ids = vec!["$old".into()];
        r.state_before_removes_event_ids = vec!["$new".into()];

        let Continuity::Applied { state_before } = snap.apply(&r) else {
            panic!("expected Applied");
        };
        assert_eq!(snap.current(), &set(&["$a", "$new"]));
        assert_eq!(state_before, set(&["$a", "$old"]));
    }

    #[test]
    fn producer_and_consumer_agree() {
        let mut seq = RoomSequence::new(ROOM.into());
        let mut snap = RoomSnapshot::new();
        let states = [
            set(&["$create"]),
            set(&["$create", "$name"]),
            set(&["$create", "$name"]),
            set(&["$create", "$name2"]),
        ];
        let events = [
            state("$create", "m.room.create"),
            state("$name", "m.room.name"),
            message("$msg"),
            state("$name2", "m.room.name"),
        ];
        let mut before = StateSet::new();
        for (event, current) in events.into_iter().zip(states) {
            let mut accepted = AcceptedEvent::new(event, current.clone());
            accepted.state_before = before.clone();
            let rec = seq.prepare(&accepted).unwrap();
            seq.commit(&rec);

            let Continuity::Applied { state_before } = snap.apply(&rec) else {
                panic!("expected Applied");
            };
            assert_eq!(snap.current(), &current);
            assert_eq!(state_before, before);
            before = current;
        }
    }
}
