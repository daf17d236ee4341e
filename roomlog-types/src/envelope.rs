//! OutputEvent - the envelope for every record on the output log.

use serde::{Deserialize, Serialize};

use crate::wire::{WireRecord, WireRecordRef};
use crate::{
    EventId, NewInviteEvent, NewRoomEvent, RecordError, RedactedEvent, RetireInviteEvent, RoomId,
};

/// Record type discriminator, serialized as the envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputType {
    /// A new event was accepted into a room
    NewRoomEvent,
    /// An invite became active
    NewInviteEvent,
    /// An invite stopped being active
    RetireInviteEvent,
    /// A redaction was validated.
    ///
    /// Emitted when the room server receives either a redaction for an
    /// event it already has, or an event for which it already holds a
    /// redaction. Either way the target's `NewRoomEvent` comes first.
    RedactedEvent,
}

impl OutputType {
    /// The wire name of this record type.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::NewRoomEvent => "new_room_event",
            OutputType::NewInviteEvent => "new_invite_event",
            OutputType::RetireInviteEvent => "retire_invite_event",
            OutputType::RedactedEvent => "redacted_event",
        }
    }
}

impl TryFrom<&str> for OutputType {
    type Error = RecordError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "new_room_event" => Ok(OutputType::NewRoomEvent),
            "new_invite_event" => Ok(OutputType::NewInviteEvent),
            "retire_invite_event" => Ok(OutputType::RetireInviteEvent),
            "redacted_event" => Ok(OutputType::RedactedEvent),
            other => Err(RecordError::UnknownType(other.to_owned())),
        }
    }
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry in the room server output log.
///
/// Consumers match on the variant; the wire discriminator is only checked
/// once, while decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// A new room event with its state delta
    NewRoomEvent(NewRoomEvent),
    /// An invite became active
    NewInviteEvent(NewInviteEvent),
    /// An invite was retired
    RetireInviteEvent(RetireInviteEvent),
    /// A previously output event must be redacted
    RedactedEvent(RedactedEvent),
}

impl OutputEvent {
    /// The discriminator for this record.
    pub fn output_type(&self) -> OutputType {
        match self {
            OutputEvent::NewRoomEvent(_) => OutputType::NewRoomEvent,
            OutputEvent::NewInviteEvent(_) => OutputType::NewInviteEvent,
            OutputEvent::RetireInviteEvent(_) => OutputType::RetireInviteEvent,
            OutputEvent::RedactedEvent(_) => OutputType::RedactedEvent,
        }
    }

    /// Room the record concerns, where the record carries one.
    ///
    /// Retirements only name the invite event, so they have no room.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            OutputEvent::NewRoomEvent(ore) => Some(&ore.event.room_id),
            OutputEvent::NewInviteEvent(inv) => Some(&inv.event.room_id),
            OutputEvent::RetireInviteEvent(_) => None,
            OutputEvent::RedactedEvent(red) => Some(&red.redacted_because.room_id),
        }
    }

    /// The event ID the record is about.
    pub fn event_id(&self) -> &EventId {
        match self {
            OutputEvent::NewRoomEvent(ore) => &ore.event.event_id,
            OutputEvent::NewInviteEvent(inv) => &inv.event.event_id,
            OutputEvent::RetireInviteEvent(ret) => &ret.event_id,
            OutputEvent::RedactedEvent(red) => &red.redacted_event_id,
        }
    }

    /// Encode with the given codec.
    pub fn encode(&self, codec: Codec) -> Result<Vec<u8>, RecordError> {
        codec.encode(self)
    }

    /// Decode with the given codec.
    pub fn decode(codec: Codec, bytes: &[u8]) -> Result<Self, RecordError> {
        codec.decode(bytes)
    }

    fn to_wire(&self) -> WireRecordRef<'_> {
        let mut wire = WireRecordRef {
            kind: self.output_type().as_str(),
            new_room_event: None,
            new_invite_event: None,
            retire_invite_event: None,
            redacted_event: None,
        };
        match self {
            OutputEvent::NewRoomEvent(p) => wire.new_room_event = Some(p),
            OutputEvent::NewInviteEvent(p) => wire.new_invite_event = Some(p),
            OutputEvent::RetireInviteEvent(p) => wire.retire_invite_event = Some(p),
            OutputEvent::RedactedEvent(p) => wire.redacted_event = Some(p),
        }
        wire
    }
}

impl TryFrom<WireRecord> for OutputEvent {
    type Error = RecordError;

    fn try_from(wire: WireRecord) -> Result<Self, Self::Error> {
        let kind = OutputType::try_from(wire.kind.as_str())?;
        let count = wire.payload_count();
        if count != 1 {
            return Err(RecordError::PayloadCount { count });
        }
        let mismatch = RecordError::PayloadMismatch {
            expected: kind.as_str(),
        };
        match kind {
            OutputType::NewRoomEvent => wire.new_room_event.map(Self::NewRoomEvent),
            OutputType::NewInviteEvent => wire.new_invite_event.map(Self::NewInviteEvent),
            OutputType::RetireInviteEvent => wire.retire_invite_event.map(Self::RetireInviteEvent),
            OutputType::RedactedEvent => wire.redacted_event.map(Self::RedactedEvent),
        }
        .ok_or(mismatch)
    }
}

/// Byte encoding of records on the log.
///
/// Producer and consumers of one log must use the same codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// JSON documents (wire-stable field names)
    #[default]
    Json,
    /// MessagePack with named fields
    #[serde(rename = "msgpack")]
    MessagePack,
}

impl Codec {
    /// Serialize a record.
    pub fn encode(&self, record: &OutputEvent) -> Result<Vec<u8>, RecordError> {
        let wire = record.to_wire();
        match self {
            Codec::Json => serde_json::to_vec(&wire).map_err(RecordError::JsonEncode),
            Codec::MessagePack => rmp_serde::to_vec_named(&wire).map_err(RecordError::MsgPackEncode),
        }
    }

    /// Deserialize a record, rejecting malformed envelopes.
    pub fn decode(&self, bytes: &[u8]) -> Result<OutputEvent, RecordError> {
        let wire: WireRecord = match self {
            Codec::Json => serde_json::from_slice(bytes).map_err(RecordError::JsonDecode)?,
            Codec::MessagePack => {
                rmp_serde::from_slice(bytes).map_err(RecordError::MsgPackDecode)?
            }
        };
        OutputEvent::try_from(wire)
    }

    /// The configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::MessagePack => "msgpack",
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
