//! Record emission.
//!
//! `OutputProducer` owns one [`RoomStream`] per room. Every operation on a
//! room holds that room's async mutex from the moment it reads the sequence
//! until the records are appended, so a room's records reach the log in the
//! order they were produced. Rooms never wait on each other.

use crate::config::Config;
use crate::error::{ProducerError, Result};
use crate::metrics::ProducerMetrics;
use dashmap::DashMap;
use roomlog_core::{
    AcceptedEvent, InviteTracker, InviteTransition, RedactionHistory, RedactionTracker,
    RoomSequence,
};
use roomlog_log::OutputLog;
use roomlog_types::{
    Codec, EventId, LogOffset, NewInviteEvent, OutputEvent, RedactedEvent, RetireInviteEvent,
    RoomEvent, RoomId, RoomVersion,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Output state of one room.
#[derive(Debug)]
struct RoomStream {
    sequence: RoomSequence,
    redactions: RedactionTracker,
    /// Validated redactions not yet appended, oldest first.
    outbox: VecDeque<RedactedEvent>,
}

impl RoomStream {
    fn new(sequence: RoomSequence) -> Self {
        Self {
            sequence,
            redactions: RedactionTracker::new(),
            outbox: VecDeque::new(),
        }
    }

    fn resume(sequence: RoomSequence, history: RedactionHistory) -> Self {
        let (redactions, ready) = RedactionTracker::resume(history);
        Self {
            sequence,
            redactions,
            outbox: ready.into(),
        }
    }
}

/// Result of publishing an accepted event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Published {
    /// Offset of the `NewRoomEvent`, or `None` if the event had already
    /// been output.
    pub offset: Option<LogOffset>,
    /// `RedactedEvent` records appended by this call.
    pub redactions_emitted: usize,
    /// Validated redactions still waiting in the room's outbox.
    pub redactions_queued: usize,
}

/// Turns upstream triggers into output log records.
pub struct OutputProducer<L: OutputLog> {
    log: Arc<L>,
    codec: Codec,
    rooms: DashMap<RoomId, Arc<Mutex<RoomStream>>>,
    /// Invites are not scoped to rooms the server is in, so one tracker
    /// covers all of them.
    invites: Mutex<InviteTracker>,
    metrics: ProducerMetrics,
}

impl<L: OutputLog> std::fmt::Debug for OutputProducer<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputProducer")
            .field("codec", &self.codec)
            .field("rooms_count", &self.rooms.len())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl<L: OutputLog> OutputProducer<L> {
    /// Create a producer writing to `log`.
    pub fn new(log: Arc<L>, config: &Config) -> Self {
        tracing::info!(codec = %config.log.codec, "Output producer started");
        Self {
            log,
            codec: config.log.codec,
            rooms: DashMap::new(),
            invites: Mutex::new(InviteTracker::new()),
            metrics: ProducerMetrics::new(),
        }
    }

    /// Get the operational metrics.
    pub fn metrics(&self) -> &ProducerMetrics {
        &self.metrics
    }

    /// Get the log this producer appends to.
    pub fn log(&self) -> &Arc<L> {
        &self.log
    }

    /// Continue a room's output from persisted state, replacing any
    /// in-memory state for the room.
    ///
    /// `history` restores which events were already output and which
    /// redactions are waiting. Redactions it shows as ready are queued and
    /// go out with the room's next operation or
    /// [`flush_room`](Self::flush_room).
    pub fn resume_room(&self, sequence: RoomSequence, history: RedactionHistory) {
        let stream = RoomStream::resume(sequence, history);
        tracing::info!(
            room_id = %stream.sequence.room_id(),
            last_sent = ?stream.sequence.last_sent(),
            pending = stream.redactions.pending_count(),
            queued = stream.outbox.len(),
            "Resuming room output"
        );
        self.rooms.insert(
            stream.sequence.room_id().clone(),
            Arc::new(Mutex::new(stream)),
        );
    }

    /// Export a room's redaction state for a later
    /// [`resume_room`](Self::resume_room).
    ///
    /// Validated redactions still in the outbox are exported as pending so
    /// they are validated again on resume.
    pub async fn room_history(&self, room_id: &RoomId) -> Option<RedactionHistory> {
        let stream = self.rooms.get(room_id).map(|entry| Arc::clone(entry.value()))?;
        let stream = stream.lock().await;
        let mut history = stream.redactions.history();
        for queued in &stream.outbox {
            history
                .validated
                .retain(|target| *target != queued.redacted_event_id);
            history.pending.push(queued.redacted_because.clone());
        }
        Some(history)
    }

    /// The event of the last `NewRoomEvent` output for a room.
    pub async fn last_sent(&self, room_id: &RoomId) -> Option<EventId> {
        let stream = self.rooms.get(room_id).map(|entry| Arc::clone(entry.value()))?;
        let stream = stream.lock().await;
        stream.sequence.last_sent().cloned()
    }

    /// Number of redactions in a room still waiting for their target.
    pub async fn pending_redactions(&self, room_id: &RoomId) -> usize {
        match self.rooms.get(room_id).map(|entry| Arc::clone(entry.value())) {
            Some(stream) => stream.lock().await.redactions.pending_count(),
            None => 0,
        }
    }

    /// Output an event accepted by state resolution.
    ///
    /// Appends its `NewRoomEvent`, then any `RedactedEvent` records it
    /// validated. An event that was already output is ignored.
    ///
    /// # Errors
    ///
    /// Fails if the record cannot be built or appended; the room's chain is
    /// left unchanged so the trigger can be retried. A failure appending
    /// the follow-up redactions is not an error: they stay queued and go
    /// out with the room's next operation or [`flush_room`](Self::flush_room).
    pub async fn publish_event(&self, accepted: AcceptedEvent) -> Result<Published> {
        let stream = self.room(&accepted.event.room_id);
        let mut stream = stream.lock().await;

        let mut published = Published::default();
        let flushed = self
            .flush_outbox(&mut stream, &mut published.redactions_emitted)
            .await;
        if let Err(e) = flushed {
            tracing::warn!(
                room_id = %accepted.event.room_id,
                queued = stream.outbox.len(),
                "Failed to flush queued redactions: {}",
                e
            );
        }

        let event_id = &accepted.event.event_id;
        if stream.redactions.has_seen(event_id) {
            ProducerMetrics::incr(&self.metrics.duplicates_skipped);
            tracing::debug!(event_id = %event_id, "Event already output, skipping");
            published.redactions_queued = stream.outbox.len();
            return Ok(published);
        }

        let record = stream.sequence.prepare(&accepted)?;
        let offset = self
            .append(OutputEvent::NewRoomEvent(record.clone()))
            .await?;

        stream.sequence.commit(&record);
        ProducerMetrics::incr(&self.metrics.new_room_events);
        tracing::debug!(
            room_id = %record.event.room_id,
            event_id = %record.event.event_id,
            offset = %offset,
            adds = record.adds_state_event_ids.len(),
            removes = record.removes_state_event_ids.len(),
            historical = record.historical,
            "Appended new room event"
        );
        published.offset = Some(offset);

        let validated = stream.redactions.observe(&record.event);
        if !validated.is_empty() {
            tracing::debug!(
                room_id = %record.event.room_id,
                count = validated.len(),
                "Redactions validated"
            );
        }
        stream.outbox.extend(validated);

        let flushed = self
            .flush_outbox(&mut stream, &mut published.redactions_emitted)
            .await;
        if let Err(e) = flushed {
            tracing::warn!(
                room_id = %record.event.room_id,
                queued = stream.outbox.len(),
                "Failed to append redactions, queued for retry: {}",
                e
            );
        }
        published.redactions_queued = stream.outbox.len();

        Ok(published)
    }

    /// Append any queued `RedactedEvent` records for a room.
    ///
    /// Returns the number appended.
    pub async fn flush_room(&self, room_id: &RoomId) -> Result<usize> {
        let Some(stream) = self.rooms.get(room_id).map(|entry| Arc::clone(entry.value())) else {
            return Ok(0);
        };
        let mut stream = stream.lock().await;
        let mut emitted = 0;
        self.flush_outbox(&mut stream, &mut emitted).await?;
        Ok(emitted)
    }

    /// Output a newly active invite.
    ///
    /// Returns `None` if the invite is already active.
    ///
    /// # Errors
    ///
    /// Refuses invalid transitions (not an invite, already retired, another
    /// invite active for the same user and room) without appending.
    pub async fn publish_invite(
        &self,
        room_version: RoomVersion,
        event: RoomEvent,
    ) -> Result<Option<LogOffset>> {
        let mut invites = self.invites.lock().await;
        match invites.check_activate(&event) {
            Ok(InviteTransition::Duplicate) => {
                ProducerMetrics::incr(&self.metrics.duplicates_skipped);
                tracing::debug!(event_id = %event.event_id, "Invite already active, skipping");
                return Ok(None);
            }
            Ok(_) => {}
            Err(e) => {
                ProducerMetrics::incr(&self.metrics.invalid_invite_transitions);
                tracing::warn!(event_id = %event.event_id, "Refusing invite: {}", e);
                return Err(e.into());
            }
        }

        let offset = self
            .append(OutputEvent::NewInviteEvent(NewInviteEvent {
                room_version,
                event: event.clone(),
            }))
            .await?;
        invites.activate(&event)?;
        ProducerMetrics::incr(&self.metrics.new_invite_events);
        tracing::debug!(
            room_id = %event.room_id,
            event_id = %event.event_id,
            offset = %offset,
            "Appended new invite event"
        );
        Ok(Some(offset))
    }

    /// Output the retirement of an active invite.
    ///
    /// Returns `None` if the invite was already retired the same way.
    ///
    /// # Errors
    ///
    /// Refuses retiring an unknown invite, naming the wrong target user, or
    /// changing the membership of a retired invite.
    pub async fn retire_invite(&self, retire: RetireInviteEvent) -> Result<Option<LogOffset>> {
        let mut invites = self.invites.lock().await;
        match invites.check_retire(&retire) {
            Ok(InviteTransition::Duplicate) => {
                ProducerMetrics::incr(&self.metrics.duplicates_skipped);
                tracing::debug!(event_id = %retire.event_id, "Invite already retired, skipping");
                return Ok(None);
            }
            Ok(_) => {}
            Err(e) => {
                ProducerMetrics::incr(&self.metrics.invalid_invite_transitions);
                tracing::warn!(event_id = %retire.event_id, "Refusing invite retirement: {}", e);
                return Err(e.into());
            }
        }

        let offset = self
            .append(OutputEvent::RetireInviteEvent(retire.clone()))
            .await?;
        invites.retire(&retire)?;
        ProducerMetrics::incr(&self.metrics.retire_invite_events);
        tracing::debug!(
            event_id = %retire.event_id,
            membership = %retire.membership,
            offset = %offset,
            "Appended retire invite event"
        );
        Ok(Some(offset))
    }

    fn room(&self, room_id: &RoomId) -> Arc<Mutex<RoomStream>> {
        let entry = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::debug!(room_id = %room_id, "Starting output for new room");
            Arc::new(Mutex::new(RoomStream::new(RoomSequence::new(room_id.clone()))))
        });
        Arc::clone(entry.value())
    }

    async fn append(&self, record: OutputEvent) -> Result<LogOffset> {
        let payload = record.encode(self.codec)?;
        self.log.append(payload).await.map_err(|e| {
            ProducerMetrics::incr(&self.metrics.append_failures);
            ProducerError::from(e)
        })
    }

    /// Append queued redactions in order. On failure the failed record
    /// goes back to the front of the outbox.
    async fn flush_outbox(&self, stream: &mut RoomStream, emitted: &mut usize) -> Result<()> {
        while let Some(redacted) = stream.outbox.pop_front() {
            match self.append(OutputEvent::RedactedEvent(redacted.clone())).await {
                Ok(offset) => {
                    *emitted += 1;
                    ProducerMetrics::incr(&self.metrics.redacted_events);
                    tracing::debug!(
                        redacted_event_id = %redacted.redacted_event_id,
                        redacted_because = %redacted.redacted_because.event_id,
                        offset = %offset,
                        "Appended redacted event"
                    );
                }
                Err(e) => {
                    stream.outbox.push_front(redacted);
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}
