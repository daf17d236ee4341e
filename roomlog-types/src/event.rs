//! Room event bodies carried inside log records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EventId, RoomId, UserId};

/// Event type of a redaction.
pub const EVENT_TYPE_REDACTION: &str = "m.room.redaction";

/// Event type of a membership change.
pub const EVENT_TYPE_MEMBER: &str = "m.room.member";

/// A full room event as accepted by the room server.
///
/// Authorization and signatures have already been checked upstream; the log
/// treats the body as opaque apart from the few helpers below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Stable event identifier
    pub event_id: EventId,
    /// Room the event belongs to
    pub room_id: RoomId,
    /// User that sent the event
    pub sender: UserId,
    /// Event type, e.g. `m.room.message`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Present for state events only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Event content (arbitrary JSON)
    #[serde(default)]
    pub content: Value,
    /// Target of a redaction event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacts: Option<EventId>,
    /// Direct predecessors in the room DAG
    #[serde(default)]
    pub prev_events: Vec<EventId>,
    /// Origin server timestamp in milliseconds
    #[serde(default)]
    pub origin_server_ts: u64,
    /// Data added by the local server, not covered by signatures
    #[serde(default, skip_serializing_if = "Unsigned::is_empty")]
    pub unsigned: Unsigned,
}

/// The `unsigned` section of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unsigned {
    /// The redaction event that redacted this event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_because: Option<Box<RoomEvent>>,
    /// Milliseconds since the event was sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u64>,
    /// Client transaction ID, echoed to the sending device only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl Unsigned {
    /// Whether no unsigned data is present.
    pub fn is_empty(&self) -> bool {
        self.redacted_because.is_none() && self.age.is_none() && self.transaction_id.is_none()
    }
}

impl RoomEvent {
    /// Whether this is a state event (carries a state key).
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// The event this event redacts, if it is a redaction.
    pub fn redaction_target(&self) -> Option<&EventId> {
        if self.event_type == EVENT_TYPE_REDACTION {
            self.redacts.as_ref()
        } else {
            None
        }
    }

    /// Whether this is a redaction event with a target.
    pub fn is_redaction(&self) -> bool {
        self.redaction_target().is_some()
    }

    /// The `membership` of an `m.room.member` event.
    pub fn membership(&self) -> Option<&str> {
        if self.event_type != EVENT_TYPE_MEMBER {
            return None;
        }
        self.content.get("membership").and_then(Value::as_str)
    }

    /// Whether this is an invite membership event.
    pub fn is_invite(&self) -> bool {
        self.membership() == Some("invite")
    }

    /// The user targeted by a membership event (its state key).
    pub fn target_user(&self) -> Option<UserId> {
        if self.event_type != EVENT_TYPE_MEMBER {
            return None;
        }
        self.state_key.as_deref().map(UserId::from)
    }

    /// Whether this event has already been redacted.
    pub fn is_redacted(&self) -> bool {
        self.unsigned.redacted_because.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(membership: &str) -> RoomEvent {
        RoomEvent {
            event_id: "$m".into(),
            room_id: "!r:example.org".into(),
            sender: "@alice:example.org".into(),
            event_type: EVENT_TYPE_MEMBER.into(),
            state_key: Some("@bob:example.org".into()),
            content: json!({ "membership": membership }),
            redacts: None,
            prev_events: vec![],
            origin_server_ts: 0,
            unsigned: Unsigned::default(),
        }
    }

    #[test]
    fn invite_helpers() {
        let invite = member("invite");
        assert!(invite.is_invite());
        assert!(invite.is_state());
        assert_eq!(invite.target_user(), Some(UserId::from("@bob:example.org")));
        assert!(!member("join").is_invite());
    }

    #[test]
    fn redaction_requires_type_and_target() {
        let mut ev = member("join");
        ev.redacts = Some("$x".into());
        assert!(!ev.is_redaction(), "member events never redact");

        ev.event_type = EVENT_TYPE_REDACTION.into();
        ev.state_key = None;
        assert_eq!(ev.redaction_target(), Some(&EventId::from("$x")));
    }

    #[test]
    fn empty_unsigned_is_omitted() {
        let json = serde_json::to_value(member("join")).unwrap();
        assert!(json.get("unsigned").is_none());
        assert_eq!(json["type"], "m.room.member");
    }

    #[test]
    fn redacted_because_nests() {
        let mut target = member("join");
        let because = member("leave");
        target.unsigned.redacted_because = Some(Box::new(because.clone()));

        let json = serde_json::to_string(&target).unwrap();
        let restored: RoomEvent = serde_json::from_str(&json).unwrap();
        assert!(restored.is_redacted());
        assert_eq!(restored.unsigned.redacted_because.as_deref(), Some(&because));
    }
}
