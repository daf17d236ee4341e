//! Invite lifecycle tracking.
//!
//! Invites can reach a server before it knows anything about the room, so
//! they are tracked per invite event rather than through room state:
//!
//! ```text
//! no-invite ──NewInviteEvent──► active ──RetireInviteEvent──► retired(join|leave|ban)
//! ```
//!
//! Retirement is terminal, and at most one invite can be active for a
//! (room, user) pair. The producer checks transitions before emitting them;
//! consumers use the same tracker to detect and ignore invalid records.

use std::collections::HashMap;

use roomlog_types::{EventId, Membership, RetireInviteEvent, RoomEvent, RoomId, UserId};
use thiserror::Error;

/// An invalid invite transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InviteError {
    /// The event is not an `m.room.member` invite with a target user.
    #[error("event {event_id} is not an invite")]
    NotAnInvite {
        /// The offending event.
        event_id: EventId,
    },

    /// A retired invite cannot become active again.
    #[error("invite {event_id} was already retired")]
    AlreadyRetired {
        /// The retired invite.
        event_id: EventId,
    },

    /// Another invite is active for the same room and user.
    #[error("user {user_id} already has active invite {active} in {room_id}")]
    AlreadyActive {
        /// Room of the invite.
        room_id: RoomId,
        /// Invited user.
        user_id: UserId,
        /// The invite that is active.
        active: EventId,
    },

    /// Retirement of an invite that never became active.
    #[error("invite {event_id} is not active")]
    NotActive {
        /// The unknown invite.
        event_id: EventId,
    },

    /// Retirement names a different target user than the invite.
    #[error("invite {event_id} targets {expected}, retirement names {actual}")]
    TargetMismatch {
        /// The invite.
        event_id: EventId,
        /// User the invite targeted.
        expected: UserId,
        /// User named in the retirement.
        actual: UserId,
    },

    /// The invite was already retired with a different membership.
    #[error("invite {event_id} already retired as {previous}, not {requested}")]
    ConflictingRetirement {
        /// The invite.
        event_id: EventId,
        /// Membership it was retired with.
        previous: Membership,
        /// Membership in the new retirement.
        requested: Membership,
    },
}

/// Lifecycle state of one invite event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteState {
    /// The invite is pending the user's response.
    Active,
    /// The invite is no longer active.
    Retired(Membership),
}

/// Result of a valid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteTransition {
    /// no-invite → active
    Activated,
    /// active → retired
    Retired,
    /// The same transition was already applied (redelivery).
    Duplicate,
}

#[derive(Debug, Clone)]
struct InviteEntry {
    room_id: RoomId,
    user_id: UserId,
    state: InviteState,
}

/// Tracks invite events by ID.
#[derive(Debug, Default)]
pub struct InviteTracker {
    invites: HashMap<EventId, InviteEntry>,
    active: HashMap<(RoomId, UserId), EventId>,
}

impl InviteTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of an invite event.
    pub fn state(&self, event_id: &EventId) -> Option<InviteState> {
        self.invites.get(event_id).map(|entry| entry.state)
    }

    /// The active invite for a user in a room.
    pub fn active_invite(&self, room_id: &RoomId, user_id: &UserId) -> Option<&EventId> {
        self.active.get(&(room_id.clone(), user_id.clone()))
    }

    /// Number of currently active invites.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Check whether an invite event may become active, without changing
    /// anything.
    pub fn check_activate(&self, event: &RoomEvent) -> Result<InviteTransition, InviteError> {
        let user_id = match event.target_user() {
            Some(user_id) if event.is_invite() => user_id,
            _ => {
                return Err(InviteError::NotAnInvite {
                    event_id: event.event_id.clone(),
                })
            }
        };

        match self.invites.get(&event.event_id).map(|entry| entry.state) {
            Some(InviteState::Active) => return Ok(InviteTransition::Duplicate),
            Some(InviteState::Retired(_)) => {
                return Err(InviteError::AlreadyRetired {
                    event_id: event.event_id.clone(),
                })
            }
            None => {}
        }

        if let Some(active) = self.active_invite(&event.room_id, &user_id) {
            return Err(InviteError::AlreadyActive {
                room_id: event.room_id.clone(),
                user_id,
                active: active.clone(),
            });
        }

        Ok(InviteTransition::Activated)
    }

    /// Activate an invite event.
    pub fn activate(&mut self, event: &RoomEvent) -> Result<InviteTransition, InviteError> {
        let transition = self.check_activate(event)?;
        if transition == InviteTransition::Activated {
            // check_activate guarantees a target user
            if let Some(user_id) = event.target_user() {
                self.active.insert(
                    (event.room_id.clone(), user_id.clone()),
                    event.event_id.clone(),
                );
                self.invites.insert(
                    event.event_id.clone(),
                    InviteEntry {
                        room_id: event.room_id.clone(),
                        user_id,
                        state: InviteState::Active,
                    },
                );
            }
        }
        Ok(transition)
    }

    /// Check whether an invite may be retired, without changing anything.
    pub fn check_retire(
        &self,
        retire: &RetireInviteEvent,
    ) -> Result<InviteTransition, InviteError> {
        let entry = self
            .invites
            .get(&retire.event_id)
            .ok_or_else(|| InviteError::NotActive {
                event_id: retire.event_id.clone(),
            })?;

        if entry.user_id != retire.target_user_id {
            return Err(InviteError::TargetMismatch {
                event_id: retire.event_id.clone(),
                expected: entry.user_id.clone(),
                actual: retire.target_user_id.clone(),
            });
        }

        match entry.state {
            InviteState::Active => Ok(InviteTransition::Retired),
            InviteState::Retired(previous) if previous == retire.membership => {
                Ok(InviteTransition::Duplicate)
            }
            InviteState::Retired(previous) => Err(InviteError::ConflictingRetirement {
                event_id: retire.event_id.clone(),
                previous,
                requested: retire.membership,
            }),
        }
    }

    /// Retire an active invite.
    pub fn retire(&mut self, retire: &RetireInviteEvent) -> Result<InviteTransition, InviteError> {
        let transition = self.check_retire(retire)?;
        if transition == InviteTransition::Retired {
            if let Some(entry) = self.invites.get_mut(&retire.event_id) {
                entry.state = InviteState::Retired(retire.membership);
                self.active
                    .remove(&(entry.room_id.clone(), entry.user_id.clone()));
            }
        }
        Ok(transition)
    }
}
