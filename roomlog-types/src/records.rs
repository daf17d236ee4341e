//! Record payloads for the output log.
//!
//! Each payload is carried by exactly one [`OutputEvent`](crate::OutputEvent)
//! variant.
//!
//! When we talk about the state of a room we mean the state after a set of
//! events. The current state is the state after the room's latest event IDs;
//! the state before an event is the state after its `prev_events`.

use serde::{Deserialize, Serialize};

use crate::ids::empty_as_none;
use crate::{EventId, RoomEvent, RoomVersion, ServerName, UserId};

/// Written when the room server accepts a new event.
///
/// Carries the event and enough information for a consumer to maintain the
/// current state of the room and to derive the state before the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoomEvent {
    /// The event
    pub event: RoomEvent,
    /// Backfilled rather than live. Consumers apply the state delta but must
    /// not treat the event as if it just arrived.
    #[serde(default)]
    pub historical: bool,
    /// Forward extremities of the room after this event.
    ///
    /// Used as `prev_events` for new events and to fetch the full current
    /// state when a consumer has to resync.
    #[serde(default)]
    pub latest_event_ids: Vec<EventId>,
    /// State event IDs added to the current state by this event.
    #[serde(default)]
    pub adds_state_event_ids: Vec<EventId>,
    /// Bodies of added state events other than `event`.
    ///
    /// Forks being merged can make several state events valid at once, so
    /// this may hold more than one entry. Use [`NewRoomEvent::adds_state`]
    /// to get the complete list.
    #[serde(default)]
    pub adds_state_events: Vec<RoomEvent>,
    /// State event IDs removed from the current state by this event.
    #[serde(default)]
    pub removes_state_event_ids: Vec<EventId>,
    /// The event output for this room immediately before this one, or none
    /// if this is the first.
    ///
    /// If it does not match what a consumer last applied, the delta above
    /// cannot be used and the consumer must fetch the full current state
    /// using `latest_event_ids`.
    #[serde(default, with = "empty_as_none")]
    pub last_sent_event_id: Option<EventId>,
    /// State event IDs in the state before the event but not in the
    /// current state. Applied after the current-state delta.
    #[serde(default)]
    pub state_before_adds_event_ids: Vec<EventId>,
    /// State event IDs in the current state but not in the state before
    /// the event.
    #[serde(default)]
    pub state_before_removes_event_ids: Vec<EventId>,
    /// Server identity to federate the event as; none means do not send
    /// the event to other servers.
    #[serde(default, with = "empty_as_none")]
    pub send_as_server: Option<ServerName>,
    /// Transaction of the local client request that sent the event, if any.
    #[serde(default)]
    pub transaction_id: Option<TransactionId>,
}

impl NewRoomEvent {
    /// All state events added by this record.
    ///
    /// `adds_state_events` omits `event` to save space, so `event` is
    /// appended here when its ID is listed in `adds_state_event_ids`.
    pub fn adds_state(&self) -> Vec<RoomEvent> {
        let mut added = self.adds_state_events.clone();
        if self.adds_state_event_ids.contains(&self.event.event_id) {
            added.push(self.event.clone());
        }
        added
    }

    /// Whether the event should be sent over federation.
    pub fn should_federate(&self) -> bool {
        self.send_as_server.is_some()
    }
}

/// Client transaction that produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    /// Session (device login) the request came from
    pub session_id: i64,
    /// Client-chosen transaction identifier
    #[serde(rename = "id")]
    pub transaction_id: String,
}

/// Written whenever an invite becomes active.
///
/// Invites can arrive for rooms the server is not in, so they are tracked
/// separately from room state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInviteEvent {
    /// Version of the invited room
    pub room_version: RoomVersion,
    /// The `m.room.member` invite event
    pub event: RoomEvent,
}

/// Written whenever an active invite stops being active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireInviteEvent {
    /// ID of the `m.room.member` invite event
    pub event_id: EventId,
    /// User the invite targeted
    pub target_user_id: UserId,
    /// The membership event that replaced the invite. Absent when the
    /// invite was rejected locally without reaching the inviting server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_by_event_id: Option<EventId>,
    /// Membership of the user after the invite was retired
    pub membership: Membership,
}

/// Terminal membership reached when an invite is retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    /// The user accepted the invite
    Join,
    /// The invite was rejected or withdrawn
    Leave,
    /// The user was banned
    Ban,
}

impl Membership {
    /// The wire literal.
    pub fn as_str(&self) -> &'static str {
        match self {
            Membership::Join => "join",
            Membership::Leave => "leave",
            Membership::Ban => "ban",
        }
    }
}

impl std::fmt::Display for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Written whenever a redaction has been validated, meaning both the
/// redaction and the event it redacts are known.
///
/// The redacted event is guaranteed to have been output before. Consumers
/// that stored its JSON must redact their copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactedEvent {
    /// The event that was redacted
    pub redacted_event_id: EventId,
    /// The redaction event, stored as `unsigned.redacted_because`
    pub redacted_because: RoomEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Unsigned;
    use serde_json::json;

    fn state_event(id: &str) -> RoomEvent {
        RoomEvent {
            event_id: id.into(),
            room_id: "!r:example.org".into(),
            sender: "@alice:example.org".into(),
            event_type: "m.room.topic".into(),
            state_key: Some(String::new()),
            content: json!({ "topic": id }),
            redacts: None,
            prev_events: vec![],
            origin_server_ts: 0,
            unsigned: Unsigned::default(),
        }
    }

    fn new_room_event(primary: &str, adds: &[&str], extra: &[&str]) -> NewRoomEvent {
        NewRoomEvent {
            event: state_event(primary),
            historical: false,
            latest_event_ids: vec![primary.into()],
            adds_state_event_ids: adds.iter().map(|id| EventId::from(*id)).collect(),
            adds_state_events: extra.iter().map(|id| state_event(id)).collect(),
            removes_state_event_ids: vec![],
            last_sent_event_id: None,
            state_before_adds_event_ids: vec![],
            state_before_removes_event_ids: vec![],
            send_as_server: None,
            transaction_id: None,
        }
    }

    #[test]
    fn adds_state_appends_primary_last() {
        let ore = new_room_event("$p", &["$e1", "$e2", "$p"], &["$e1", "$e2"]);
        let ids: Vec<_> = ore
            .adds_state()
            .into_iter()
            .map(|e| e.event_id.to_string())
            .collect();
        assert_eq!(ids, vec!["$e1", "$e2", "$p"]);
    }

    #[test]
    fn adds_state_without_primary_is_unchanged() {
        let ore = new_room_event("$p", &["$e1", "$e2"], &["$e1", "$e2"]);
        assert_eq!(ore.adds_state(), ore.adds_state_events);
    }

    #[test]
    fn adds_state_is_deterministic() {
        let ore = new_room_event("$p", &["$p"], &[]);
        assert_eq!(ore.adds_state(), ore.adds_state());
        assert_eq!(ore.adds_state().len(), 1);
        // derivation never mutates the record
        assert!(ore.adds_state_events.is_empty());
    }

    #[test]
    fn empty_send_as_server_means_no_federation() {
        let mut ore = new_room_event("$p", &[], &[]);
        assert!(!ore.should_federate());
        let json = serde_json::to_value(&ore).unwrap();
        assert_eq!(json["send_as_server"], "");
        assert_eq!(json["last_sent_event_id"], "");
        assert!(json["transaction_id"].is_null());

        ore.send_as_server = Some("example.org".into());
        assert!(ore.should_federate());
    }

    #[test]
    fn membership_wire_literals() {
        for (m, lit) in [
            (Membership::Join, "\"join\""),
            (Membership::Leave, "\"leave\""),
            (Membership::Ban, "\"ban\""),
        ] {
            assert_eq!(serde_json::to_string(&m).unwrap(), lit);
            assert_eq!(serde_json::from_str::<Membership>(lit).unwrap(), m);
        }
        assert!(serde_json::from_str::<Membership>("\"invite\"").is_err());
    }

    #[test]
    fn retired_by_absent_is_omitted() {
        let retire = RetireInviteEvent {
            event_id: "$inv".into(),
            target_user_id: "@bob:example.org".into(),
            retired_by_event_id: None,
            membership: Membership::Leave,
        };
        let json = serde_json::to_value(&retire).unwrap();
        assert!(json.get("retired_by_event_id").is_none());
        assert_eq!(json["membership"], "leave");
    }

    #[test]
    fn transaction_id_wire_shape() {
        let txn = TransactionId {
            session_id: 7,
            transaction_id: "m123".into(),
        };
        let json = serde_json::to_value(&txn).unwrap();
        assert_eq!(json, json!({ "session_id": 7, "id": "m123" }));
    }
}
