//! Wire shape of a record: a `type` discriminator plus one named payload.
//!
//! Kept separate from [`OutputEvent`] so decoding can report the exact
//! structural problem instead of a generic serde error.

use serde::{Deserialize, Serialize};

use crate::{NewInviteEvent, NewRoomEvent, RedactedEvent, RetireInviteEvent};

#[derive(Serialize)]
pub(crate) struct WireRecordRef<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_room_event: Option<&'a NewRoomEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_invite_event: Option<&'a NewInviteEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retire_invite_event: Option<&'a RetireInviteEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacted_event: Option<&'a RedactedEvent>,
}

#[derive(Deserialize)]
pub(crate) struct WireRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub new_room_event: Option<NewRoomEvent>,
    #[serde(default)]
    pub new_invite_event: Option<NewInviteEvent>,
    #[serde(default)]
    pub retire_invite_event: Option<RetireInviteEvent>,
    #[serde(default)]
    pub redacted_event: Option<RedactedEvent>,
}

impl WireRecord {
    pub fn payload_count(&self) -> usize {
        [
            self.new_room_event.is_some(),
            self.new_invite_event.is_some(),
            self.retire_invite_event.is_some(),
            self.redacted_event.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}
