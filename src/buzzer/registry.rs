use std::collections::HashMap;

use super::types::{BuzzerError, ConnectionId, DisplayName, Participant, RoomId};

/// Connected participants and the room each one belongs to.
#[derive(Debug, Default)]
pub struct MembershipRegistry {
    participants: HashMap<ConnectionId, Participant>,
    /// Members of each room in join order.
    members: HashMap<RoomId, Vec<ConnectionId>>,
}

impl MembershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `name` and `room` and registers the participant.
    pub fn add_participant(
        &mut self,
        id: ConnectionId,
        name: &str,
        room: &str,
        is_admin: bool,
    ) -> Result<&Participant, BuzzerError> {
        let name = DisplayName::normalize(name)
            .ok_or(BuzzerError::InvalidInput("username is required"))?;
        let room =
            RoomId::normalize(room).ok_or(BuzzerError::InvalidInput("room is required"))?;

        if self.participants_in_room(&room).any(|p| p.name == name) {
            return Err(BuzzerError::DuplicateName { room, name });
        }
        if self.participants.contains_key(&id) {
            return Err(BuzzerError::DuplicateConnection(id));
        }

        self.members.entry(room.clone()).or_default().push(id);
        let participant = Participant {
            id,
            name,
            room,
            is_admin,
        };
        Ok(self.participants.entry(id).or_insert(participant))
    }

    /// Idempotent: an unknown id is a no-op.
    pub fn remove_participant(&mut self, id: &ConnectionId) -> Option<Participant> {
        let participant = self.participants.remove(id)?;
        if let Some(members) = self.members.get_mut(&participant.room) {
            members.retain(|member| member != id);
            if members.is_empty() {
                self.members.remove(&participant.room);
            }
        }
        Some(participant)
    }

    pub fn get_participant(&self, id: &ConnectionId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Participants of `room` in join order.
    pub fn participants_in_room<'a>(
        &'a self,
        room: &RoomId,
    ) -> impl Iterator<Item = &'a Participant> + use<'a> {
        self.members
            .get(room)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.participants.get(id))
    }

    pub fn room_size(&self, room: &RoomId) -> usize {
        self.members.get(room).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
