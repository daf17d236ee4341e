//! Event builders shared by the unit tests in this crate.

use roomlog_types::{RoomEvent, Unsigned, EVENT_TYPE_MEMBER, EVENT_TYPE_REDACTION};
use serde_json::json;

pub const ROOM: &str = "!room:example.org";

pub fn message(id: &str) -> RoomEvent {
    RoomEvent {
        event_id: id.into(),
        room_id: ROOM.into(),
        sender: "@alice:example.org".into(),
        event_type: "m.room.message".into(),
        state_key: None,
        content: json!({ "body": id }),
        redacts: None,
        prev_events: vec![],
        origin_server_ts: 0,
        unsigned: Unsigned::default(),
    }
}

pub fn state(id: &str, event_type: &str) -> RoomEvent {
    RoomEvent {
        event_type: event_type.into(),
        state_key: Some(String::new()),
        ..message(id)
    }
}

pub fn redaction(id: &str, target: &str) -> RoomEvent {
    RoomEvent {
        event_type: EVENT_TYPE_REDACTION.into(),
        redacts: Some(target.into()),
        content: json!({}),
        ..message(id)
    }
}

pub fn invite(id: &str, room: &str, user: &str) -> RoomEvent {
    RoomEvent {
        room_id: room.into(),
        event_type: EVENT_TYPE_MEMBER.into(),
        state_key: Some(user.into()),
        content: json!({ "membership": "invite" }),
        ..message(id)
    }
}
