//! Applying output log records.
//!
//! A `RoomStateConsumer` reads the log from its own offset and keeps, per
//! room, a snapshot of the current state. Records are applied strictly in
//! log order. Every handler tolerates redelivery of records it has already
//! applied.

use crate::collab::{EventStore, Redactor, StateQuery};
use crate::config::{ConsumerSettings, ErrorPolicy};
use crate::error::{ConsumerError, Result};
use roomlog_core::{Continuity, InviteTracker, InviteTransition, RoomSnapshot, StateSet};
use roomlog_log::OutputLog;
use roomlog_types::{
    Codec, EventId, LogOffset, NewInviteEvent, NewRoomEvent, OutputEvent, RedactedEvent,
    RetireInviteEvent, RoomEvent, RoomId,
};
use std::collections::{HashMap, HashSet};

/// What applying a record did.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerEvent {
    /// A live event, ready for downstream processing. Not reported for
    /// historical records.
    NewEvent {
        /// The record that carried it.
        record: Box<NewRoomEvent>,
        /// State immediately before the event.
        state_before: StateSet,
    },
    /// A record's state delta was applied.
    Applied {
        /// Room of the record.
        room_id: RoomId,
        /// Event of the record.
        event_id: EventId,
    },
    /// The record did not follow the room's cursor, so the full current
    /// state was fetched instead of applying the delta.
    Resynced {
        /// Room of the record.
        room_id: RoomId,
        /// Event of the record, now the room's cursor.
        event_id: EventId,
    },
    /// A stored event was redacted.
    Redacted {
        /// The redacted event.
        event_id: EventId,
        /// The redaction event.
        redacted_because: EventId,
    },
    /// An invite became active.
    InviteActivated(NewInviteEvent),
    /// An invite was retired.
    InviteRetired(RetireInviteEvent),
    /// The record had been applied before.
    Duplicate {
        /// Event the record refers to.
        event_id: EventId,
    },
    /// The record describes a transition this consumer cannot apply and was
    /// ignored.
    Ignored {
        /// Event the record refers to.
        event_id: EventId,
        /// Why it was ignored.
        reason: String,
    },
    /// A bad record was passed over under [`ErrorPolicy::Skip`].
    Skipped {
        /// Offset of the record.
        offset: LogOffset,
        /// The error it caused.
        reason: String,
    },
}

/// Consumer view of one room.
#[derive(Debug, Clone)]
struct RoomView {
    snapshot: RoomSnapshot,
    latest_event_ids: Vec<EventId>,
}

impl RoomView {
    fn empty(window: usize) -> Self {
        Self {
            snapshot: RoomSnapshot::new().with_redelivery_window(window),
            latest_event_ids: Vec::new(),
        }
    }
}

/// Reads the output log and keeps room state, stored events and invites up
/// to date.
pub struct RoomStateConsumer<S, E, R> {
    settings: ConsumerSettings,
    codec: Codec,
    state_query: S,
    store: E,
    redactor: R,
    rooms: HashMap<RoomId, RoomView>,
    invites: InviteTracker,
    offset: LogOffset,
}

impl<S, E, R> std::fmt::Debug for RoomStateConsumer<S, E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomStateConsumer")
            .field("name", &self.settings.name)
            .field("codec", &self.codec)
            .field("offset", &self.offset)
            .field("rooms_count", &self.rooms.len())
            .finish_non_exhaustive()
    }
}

impl<S, E, R> RoomStateConsumer<S, E, R>
where
    S: StateQuery,
    E: EventStore,
    R: Redactor,
{
    /// Create a consumer that starts reading at the beginning of the log.
    pub fn new(
        settings: ConsumerSettings,
        codec: Codec,
        state_query: S,
        store: E,
        redactor: R,
    ) -> Self {
        tracing::info!(consumer = %settings.name, codec = %codec, "Consumer created");
        Self {
            settings,
            codec,
            state_query,
            store,
            redactor,
            rooms: HashMap::new(),
            invites: InviteTracker::new(),
            offset: LogOffset::zero(),
        }
    }

    /// Resume reading after a persisted offset.
    pub fn with_offset(mut self, offset: LogOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Seed a room from persisted state.
    pub fn restore_room(
        &mut self,
        room_id: RoomId,
        cursor: Option<EventId>,
        current: StateSet,
        latest_event_ids: Vec<EventId>,
    ) {
        let snapshot = RoomSnapshot::with_state(cursor, current)
            .with_redelivery_window(self.settings.redelivery_window);
        self.rooms.insert(
            room_id,
            RoomView {
                snapshot,
                latest_event_ids,
            },
        );
    }

    /// Offset of the last record handled.
    pub fn offset(&self) -> LogOffset {
        self.offset
    }

    /// Snapshot of a room, if any record for it was applied.
    pub fn snapshot(&self, room_id: &RoomId) -> Option<&RoomSnapshot> {
        self.rooms.get(room_id).map(|view| &view.snapshot)
    }

    /// Rooms flagged for reconciliation.
    pub fn suspect_rooms(&self) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter(|(_, view)| view.snapshot.is_suspect())
            .map(|(room_id, _)| room_id.clone())
            .collect()
    }

    /// The invite tracker.
    pub fn invites(&self) -> &InviteTracker {
        &self.invites
    }

    /// The event store.
    pub fn store(&self) -> &E {
        &self.store
    }

    /// Read and apply the next batch of records.
    ///
    /// Returns what was applied. An empty result means the consumer has
    /// caught up with the log.
    ///
    /// # Errors
    ///
    /// Log and collaborator failures are returned with the offset left
    /// before the failing record. Record errors are logged and skipped
    /// under [`ErrorPolicy::Skip`] and returned under [`ErrorPolicy::Halt`].
    /// Records applied earlier in the batch are kept; an error hit after
    /// some records succeeded is reported by the next call.
    pub async fn poll_once<L: OutputLog + ?Sized>(&mut self, log: &L) -> Result<Vec<ConsumerEvent>> {
        let entries = log.read(self.offset, self.settings.batch_size.max(1)).await?;
        let mut events = Vec::new();
        let mut handled = 0;

        for entry in entries {
            let outcome = match OutputEvent::decode(self.codec, &entry.payload) {
                Ok(record) => self.handle(record).await,
                Err(e) => Err(e.into()),
            };

            match outcome {
                Ok(applied) => events.extend(applied),
                Err(e) if e.is_record_error() && self.settings.error_policy == ErrorPolicy::Skip => {
                    tracing::warn!(
                        consumer = %self.settings.name,
                        offset = %entry.offset,
                        "Skipping record: {}",
                        e
                    );
                    events.push(ConsumerEvent::Skipped {
                        offset: entry.offset,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        consumer = %self.settings.name,
                        offset = %entry.offset,
                        "Stopping at record: {}",
                        e
                    );
                    if handled == 0 {
                        return Err(e);
                    }
                    return Ok(events);
                }
            }
            self.offset = entry.offset;
            handled += 1;
        }

        if handled > 0 {
            tracing::debug!(
                consumer = %self.settings.name,
                records = handled,
                offset = %self.offset,
                "Batch applied"
            );
        }
        Ok(events)
    }

    /// Apply one record.
    ///
    /// Does not move the read offset.
    pub async fn handle(&mut self, record: OutputEvent) -> Result<Vec<ConsumerEvent>> {
        match record {
            OutputEvent::NewRoomEvent(record) => self.on_new_room_event(record).await,
            OutputEvent::NewInviteEvent(invite) => self.on_new_invite_event(invite).await,
            OutputEvent::RetireInviteEvent(retire) => Ok(self.on_retire_invite_event(retire)),
            OutputEvent::RedactedEvent(redacted) => self.on_redacted_event(redacted).await,
        }
    }

    /// Fetch the full current state of every suspect room.
    ///
    /// Returns the rooms that were reconciled. Rooms without a cursor stay
    /// suspect until a record for them arrives.
    pub async fn reconcile(&mut self) -> Result<Vec<RoomId>> {
        let mut reconciled = Vec::new();
        for room_id in self.suspect_rooms() {
            let Some(view) = self.rooms.get_mut(&room_id) else {
                continue;
            };
            let Some(cursor) = view.snapshot.cursor().cloned() else {
                continue;
            };
            let state = self
                .state_query
                .current_state(&room_id, &view.latest_event_ids)
                .await?;
            view.snapshot.reset(cursor, state);
            tracing::info!(
                consumer = %self.settings.name,
                room_id = %room_id,
                "Suspect room reconciled"
            );
            reconciled.push(room_id);
        }
        Ok(reconciled)
    }

    async fn on_new_room_event(&mut self, record: NewRoomEvent) -> Result<Vec<ConsumerEvent>> {
        let room_id = record.event.room_id.clone();
        let event_id = record.event.event_id.clone();

        // Stored before the snapshot moves so a failed store is retried on
        // redelivery. The store ignores events it already has.
        self.store.store_events(events_to_store(&record)).await?;

        let window = self.settings.redelivery_window;
        let view = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| RoomView::empty(window));

        let mut events = Vec::new();
        let state_before = match view.snapshot.apply(&record) {
            Continuity::Redelivered => {
                tracing::debug!(room_id = %room_id, event_id = %event_id, "Record redelivered");
                return Ok(vec![ConsumerEvent::Duplicate { event_id }]);
            }
            Continuity::Applied { state_before } => {
                tracing::debug!(
                    consumer = %self.settings.name,
                    room_id = %room_id,
                    event_id = %event_id,
                    "Applied state delta"
                );
                events.push(ConsumerEvent::Applied {
                    room_id: room_id.clone(),
                    event_id: event_id.clone(),
                });
                state_before
            }
            Continuity::Mismatch { expected, received } => {
                tracing::warn!(
                    consumer = %self.settings.name,
                    room_id = %room_id,
                    expected = ?expected,
                    received = ?received,
                    "Record does not follow cursor, fetching full state"
                );
                let state = self
                    .state_query
                    .current_state(&room_id, &record.latest_event_ids)
                    .await?;
                view.snapshot.reset(event_id.clone(), state);
                events.push(ConsumerEvent::Resynced {
                    room_id: room_id.clone(),
                    event_id: event_id.clone(),
                });
                view.snapshot.state_before(&record)
            }
        };
        view.latest_event_ids = record.latest_event_ids.clone();

        if !record.historical {
            events.push(ConsumerEvent::NewEvent {
                record: Box::new(record),
                state_before,
            });
        }
        Ok(events)
    }

    async fn on_redacted_event(&mut self, redacted: RedactedEvent) -> Result<Vec<ConsumerEvent>> {
        let because = redacted.redacted_because;
        let target_id = redacted.redacted_event_id;

        let Some(target) = self.store.get_event(&target_id).await? else {
            tracing::error!(
                consumer = %self.settings.name,
                room_id = %because.room_id,
                event_id = %target_id,
                "Redaction target was never stored, marking room suspect"
            );
            // Rooms without a view get an empty one that resyncs on its
            // next record.
            let window = self.settings.redelivery_window;
            self.rooms
                .entry(because.room_id.clone())
                .or_insert_with(|| RoomView::empty(window))
                .snapshot
                .mark_suspect();
            return Err(ConsumerError::UnknownRedactionTarget {
                event_id: target_id,
                room_id: because.room_id,
            });
        };

        if target.is_redacted() {
            tracing::debug!(event_id = %target_id, "Event already redacted");
            return Ok(vec![ConsumerEvent::Duplicate {
                event_id: target_id,
            }]);
        }

        let mut stripped = self.redactor.redact(target).await?;
        stripped.unsigned.redacted_because = Some(Box::new(because.clone()));
        self.store.replace_event(stripped).await?;

        tracing::debug!(
            consumer = %self.settings.name,
            event_id = %target_id,
            redacted_because = %because.event_id,
            "Event redacted"
        );
        Ok(vec![ConsumerEvent::Redacted {
            event_id: target_id,
            redacted_because: because.event_id,
        }])
    }

    async fn on_new_invite_event(&mut self, invite: NewInviteEvent) -> Result<Vec<ConsumerEvent>> {
        let event_id = invite.event.event_id.clone();
        match self.invites.check_activate(&invite.event) {
            Ok(InviteTransition::Duplicate) => Ok(vec![ConsumerEvent::Duplicate { event_id }]),
            Ok(_) => {
                self.store.store_events(vec![invite.event.clone()]).await?;
                self.invites.activate(&invite.event).ok();
                tracing::debug!(
                    consumer = %self.settings.name,
                    room_id = %invite.event.room_id,
                    event_id = %event_id,
                    "Invite activated"
                );
                Ok(vec![ConsumerEvent::InviteActivated(invite)])
            }
            Err(e) => Ok(vec![self.ignore(event_id, e.to_string())]),
        }
    }

    fn on_retire_invite_event(&mut self, retire: RetireInviteEvent) -> Vec<ConsumerEvent> {
        let event_id = retire.event_id.clone();
        match self.invites.retire(&retire) {
            Ok(InviteTransition::Duplicate) => vec![ConsumerEvent::Duplicate { event_id }],
            Ok(_) => {
                tracing::debug!(
                    consumer = %self.settings.name,
                    event_id = %event_id,
                    membership = %retire.membership,
                    "Invite retired"
                );
                vec![ConsumerEvent::InviteRetired(retire)]
            }
            Err(e) => vec![self.ignore(event_id, e.to_string())],
        }
    }

    fn ignore(&self, event_id: EventId, reason: String) -> ConsumerEvent {
        tracing::warn!(
            consumer = %self.settings.name,
            event_id = %event_id,
            "Ignoring invalid invite transition: {}",
            reason
        );
        ConsumerEvent::Ignored { event_id, reason }
    }
}

/// The record's event and every added state event, once each.
fn events_to_store(record: &NewRoomEvent) -> Vec<RoomEvent> {
    let mut seen = HashSet::new();
    std::iter::once(&record.event)
        .chain(record.adds_state_events.iter())
        .filter(|event| seen.insert(event.event_id.clone()))
        .cloned()
        .collect()
}
