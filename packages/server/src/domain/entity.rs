//! Domain entities: rooms and participants.

use std::collections::BTreeSet;

use super::value_object::{Identity, RoomName, Timestamp};

/// What happens to a room once its last member leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomRetention {
    /// Retire the room (it is re-created on the next join)
    #[default]
    DestroyEmpty,
    /// Keep the room as a standing channel
    RetainEmpty,
}

/// A named channel and its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub name: RoomName,
    pub members: BTreeSet<Identity>,
}

impl Room {
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            members: BTreeSet::new(),
        }
    }

    /// Add a member. Returns `false` if the identity was already a member.
    pub fn add_member(&mut self, identity: Identity) -> bool {
        self.members.insert(identity)
    }

    /// Remove a member. Returns `false` if the identity was not a member.
    pub fn remove_member(&mut self, identity: &Identity) -> bool {
        self.members.remove(identity)
    }

    pub fn is_member(&self, identity: &Identity) -> bool {
        self.members.contains(identity)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Presence view of one online identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub identity: Identity,
    pub connected_at: Timestamp,
    pub rooms: Vec<RoomName>,
}
