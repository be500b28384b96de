//! Room directory: room ID to member set.
//!
//! Rooms exist only while they have members.

use common::types::{ClientId, RoomId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Result of adding a member to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
}

#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, BTreeSet<ClientId>>,
}

impl RoomDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `client_id` to `room_id`, creating the room if needed.
    #[must_use]
    pub fn join(&mut self, room_id: RoomId, client_id: ClientId) -> JoinOutcome {
        if self.rooms.entry(room_id).or_default().insert(client_id) {
            JoinOutcome::Joined
        } else {
            JoinOutcome::AlreadyMember
        }
    }

    /// Remove `client_id` from `room_id`. Returns whether it was a member.
    ///
    /// The room is dropped once its last member leaves.
    pub fn leave(&mut self, room_id: &RoomId, client_id: &ClientId) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let removed = members.remove(client_id);
        if members.is_empty() {
            self.rooms.remove(room_id);
        }
        removed
    }

    /// Owned snapshot of a room's members, sorted by client ID.
    #[must_use]
    pub fn members_of(&self, room_id: &RoomId) -> Vec<ClientId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Every room with its sorted members.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<RoomId, Vec<ClientId>> {
        self.rooms
            .iter()
            .map(|(room_id, members)| (room_id.clone(), members.iter().cloned().collect()))
            .collect()
    }
}
