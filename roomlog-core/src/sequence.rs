//! Producer-side sequencing of `NewRoomEvent` records for one room.
//!
//! All records for a room form one chain: each carries the ID of the event
//! output before it. The sequence also remembers the state set it last
//! published so the next record can carry a minimal delta.
//!
//! Building a record and advancing the sequence are separate steps. The
//! producer appends the record to the log in between and only commits once
//! the append succeeded, so a failed append never leaves a gap in the chain.

use roomlog_types::{EventId, NewRoomEvent, RoomEvent, RoomId, ServerName, TransactionId};
use thiserror::Error;

use crate::delta::{StateDelta, StateSet};

/// Errors building a record from an accepted event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// The state delta adds an event whose body upstream did not supply.
    #[error("added state event {event_id} has no body")]
    MissingStateEvent {
        /// The added state event.
        event_id: EventId,
    },

    /// The event belongs to a different room than this sequence.
    #[error("event for room {actual} offered to sequence for {expected}")]
    WrongRoom {
        /// The room this sequence serves.
        expected: RoomId,
        /// The room named by the event.
        actual: RoomId,
    },
}

/// An event admitted by state resolution, with the state it produced.
///
/// This is what the upstream process hands to the producer.
#[derive(Debug, Clone)]
pub struct AcceptedEvent {
    /// The accepted event.
    pub event: RoomEvent,
    /// Backfilled rather than live.
    pub historical: bool,
    /// Forward extremities of the room after the event.
    pub latest_event_ids: Vec<EventId>,
    /// Authoritative current state after admitting the event.
    pub current_state: StateSet,
    /// State as of the event's `prev_events`.
    pub state_before: StateSet,
    /// Bodies for state events that may be newly added. May include the
    /// event itself and events that turn out not to be added.
    pub state_events: Vec<RoomEvent>,
    /// Identity to federate the event as.
    pub send_as_server: Option<ServerName>,
    /// Local client transaction, if the event came from one.
    pub transaction_id: Option<TransactionId>,
}

impl AcceptedEvent {
    /// An accepted event that changes no state, with the given state as
    /// both current state and state before.
    pub fn new(event: RoomEvent, state: StateSet) -> Self {
        let latest_event_ids = vec![event.event_id.clone()];
        Self {
            event,
            historical: false,
            latest_event_ids,
            current_state: state.clone(),
            state_before: state,
            state_events: Vec::new(),
            send_as_server: None,
            transaction_id: None,
        }
    }
}

/// Per-room output chain.
#[derive(Debug, Clone)]
pub struct RoomSequence {
    room_id: RoomId,
    last_sent: Option<EventId>,
    published: StateSet,
}

impl RoomSequence {
    /// A room nothing has been output for yet.
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            last_sent: None,
            published: StateSet::new(),
        }
    }

    /// Resume a chain from a persisted position.
    pub fn resume(room_id: RoomId, last_sent: Option<EventId>, published: StateSet) -> Self {
        Self {
            room_id,
            last_sent,
            published,
        }
    }

    /// The room this sequence serves.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// The event of the last committed record.
    pub fn last_sent(&self) -> Option<&EventId> {
        self.last_sent.as_ref()
    }

    /// The current state set as last published.
    pub fn published(&self) -> &StateSet {
        &self.published
    }

    /// Build the record for an accepted event without advancing the chain.
    pub fn prepare(&self, accepted: &AcceptedEvent) -> Result<NewRoomEvent, SequenceError> {
        let event = &accepted.event;
        if event.room_id != self.room_id {
            return Err(SequenceError::WrongRoom {
                expected: self.room_id.clone(),
                actual: event.room_id.clone(),
            });
        }

        let current = StateDelta::between(&self.published, &accepted.current_state);
        let before = StateDelta::between(&accepted.current_state, &accepted.state_before);

        let mut adds_state_events = Vec::new();
        for id in current.adds.iter().filter(|id| **id != event.event_id) {
            let body = accepted
                .state_events
                .iter()
                .find(|e| e.event_id == *id)
                .ok_or_else(|| SequenceError::MissingStateEvent {
                    event_id: id.clone(),
                })?;
            adds_state_events.push(body.clone());
        }

        Ok(NewRoomEvent {
            event: event.clone(),
            historical: accepted.historical,
            latest_event_ids: accepted.latest_event_ids.clone(),
            adds_state_event_ids: current.adds,
            adds_state_events,
            removes_state_event_ids: current.removes,
            last_sent_event_id: self.last_sent.clone(),
            state_before_adds_event_ids: before.adds,
            state_before_removes_event_ids: before.removes,
            send_as_server: accepted.send_as_server.clone(),
            transaction_id: accepted.transaction_id.clone(),
        })
    }

    /// Advance the chain past a record that has been appended to the log.
    pub fn commit(&mut self, record: &NewRoomEvent) {
        StateDelta::new(
            record.adds_state_event_ids.clone(),
            record.removes_state_event_ids.clone(),
        )
        .apply_to(&mut self.published);
        self.last_sent = Some(record.event.event_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{message, state, ROOM};

    fn set(ids: &[&str]) -> StateSet {
        ids.iter().map(|id| EventId::from(*id)).collect()
    }

    fn ids(ids: &[&str]) -> Vec<EventId> {
        ids.iter().map(|id| EventId::from(*id)).collect()
    }

    #[test]
    fn first_record_has_no_last_sent() {
        let seq = RoomSequence::new(ROOM.into());
        let create = state("$create", "m.room.create");
        let mut accepted = AcceptedEvent::new(create.clone(), set(&["$create"]));
        accepted.state_before = StateSet::new();

        let record = seq.prepare(&accepted).unwrap();
        assert_eq!(record.last_sent_event_id, None);
        assert_eq!(record.adds_state_event_ids, ids(&["$create"]));
        assert!(
            record.adds_state_events.is_empty(),
            "primary event is not duplicated"
        );
        assert_eq!(record.adds_state(), vec![create]);
        assert_eq!(record.state_before_removes_event_ids, ids(&["$create"]));
    }

    #[test]
    fn commit_chains_records() {
        let mut seq = RoomSequence::new(ROOM.into());
        let r1 = seq
            .prepare(&AcceptedEvent::new(message("$e1"), StateSet::new()))
            .unwrap();
        seq.commit(&r1);
        let r2 = seq
            .prepare(&AcceptedEvent::new(message("$e2"), StateSet::new()))
            .unwrap();
        assert_eq!(r2.last_sent_event_id, Some("$e1".into()));
    }

    #[test]
    fn prepare_does_not_advance() {
        let seq = RoomSequence::new(ROOM.into());
        let accepted = AcceptedEvent::new(state("$s", "m.room.name"), set(&["$s"]));
        let _ = seq.prepare(&accepted).unwrap();
        assert!(seq.last_sent().is_none());
        assert!(seq.published().is_empty());
    }

    #[test]
    fn delta_is_against_published_state() {
        let mut seq = RoomSequence::resume(ROOM.into(), Some("$e1".into()), set(&["$a", "$b"]));
        let name = state("$c", "m.room.name");
        let mut accepted = AcceptedEvent::new(name, set(&["$b", "$c"]));
        accepted.state_before = set(&["$a", "$b"]);

        let record = seq.prepare(&accepted).unwrap();
        assert_eq!(record.adds_state_event_ids, ids(&["$c"]));
        assert_eq!(record.removes_state_event_ids, ids(&["$a"]));
        assert_eq!(record.state_before_adds_event_ids, ids(&["$a"]));
        assert_eq!(record.state_before_removes_event_ids, ids(&["$c"]));

        seq.commit(&record);
        assert_eq!(seq.published(), &set(&["$b", "$c"]));
        assert_eq!(seq.last_sent(), Some(&EventId::from("$c")));
    }

    #[test]
    fn forked_merge_carries_extra_state_bodies() {
        let seq = RoomSequence::resume(ROOM.into(), Some("$e1".into()), set(&["$a"]));
        let merge = message("$merge");
        let mut accepted = AcceptedEvent::new(merge, set(&["$a", "$x", "$y"]));
        accepted.state_events = vec![
            state("$y", "m.room.topic"),
            state("$x", "m.room.name"),
            state("$unused", "m.room.avatar"),
        ];

        let record = seq.prepare(&accepted).unwrap();
        let bodies: Vec<_> = record
            .adds_state_events
            .iter()
            .map(|e| e.event_id.as_str())
            .collect();
        assert_eq!(bodies, vec!["$x", "$y"]);
        // the message itself is not state, so it is not appended
        assert_eq!(record.adds_state().len(), 2);
    }

    #[test]
    fn missing_state_body_is_an_error() {
        let seq = RoomSequence::new(ROOM.into());
        let accepted = AcceptedEvent::new(message("$m"), set(&["$x"]));
        assert_eq!(
            seq.prepare(&accepted).unwrap_err(),
            SequenceError::MissingStateEvent {
                event_id: "$x".into()
            }
        );
    }

    #[test]
    fn wrong_room_is_rejected() {
        let seq = RoomSequence::new("!other:example.org".into());
        let accepted = AcceptedEvent::new(message("$m"), StateSet::new());
        assert!(matches!(
            seq.prepare(&accepted),
            Err(SequenceError::WrongRoom { .. })
        ));
    }

    #[test]
    fn options_pass_through() {
        let seq = RoomSequence::new(ROOM.into());
        let mut accepted = AcceptedEvent::new(message("$m"), StateSet::new());
        accepted.historical = true;
        accepted.send_as_server = Some("example.org".into());
        accepted.latest_event_ids = ids(&["$m", "$other"]);

        let record = seq.prepare(&accepted).unwrap();
        assert!(record.historical);
        assert!(record.should_federate());
        assert_eq!(record.latest_event_ids, ids(&["$m", "$other"]));
        assert!(record.transaction_id.is_none());
    }
}
