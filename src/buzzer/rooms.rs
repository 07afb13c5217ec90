use std::collections::HashMap;

use super::types::{BuzzerError, DisplayName, Room, RoomId};

/// Admin secret and buzzer lock of every open room.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<RoomId, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unlocked room.
    pub fn create_room(
        &mut self,
        id: RoomId,
        admin_secret: impl Into<String>,
    ) -> Result<&Room, BuzzerError> {
        if self.rooms.contains_key(&id) {
            return Err(BuzzerError::AlreadyExists(id));
        }
        let room = Room {
            id: id.clone(),
            admin_secret: admin_secret.into(),
            holder: None,
        };
        Ok(self.rooms.entry(id).or_insert(room))
    }

    pub fn get_room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// Idempotent: an unknown id is a no-op.
    pub fn remove_room(&mut self, id: &RoomId) -> Option<Room> {
        self.rooms.remove(id)
    }

    /// Overwrites the lock. `Some(holder)` locks, `None` unlocks and clears the holder.
    pub fn set_lock(
        &mut self,
        id: &RoomId,
        holder: Option<DisplayName>,
    ) -> Result<&Room, BuzzerError> {
        let room = self
            .rooms
            .get_mut(id)
            .ok_or_else(|| BuzzerError::NotFound(format!("room {id}")))?;
        room.holder = holder;
        Ok(&*room)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(raw: &str) -> RoomId {
        RoomId::normalize(raw).unwrap()
    }

    fn name(raw: &str) -> DisplayName {
        DisplayName::normalize(raw).unwrap()
    }

    #[test]
    fn create_room_starts_unlocked() {
        let mut store = RoomStore::new();
        let created = store.create_room(room("quiz"), "secret").unwrap();
        assert_eq!(created.admin_secret, "secret");
        assert!(!created.is_locked());
        assert_eq!(created.locked_by(), "");
    }

    #[test]
    fn create_room_rejects_duplicate() {
        let mut store = RoomStore::new();
        store.create_room(room("quiz"), "a").unwrap();
        let err = store.create_room(room("QUIZ"), "b").unwrap_err();
        assert_eq!(err, BuzzerError::AlreadyExists(room("quiz")));
        assert_eq!(store.get_room(&room("quiz")).unwrap().admin_secret, "a");
    }

    #[test]
    fn set_lock_overwrites_both_fields() {
        let mut store = RoomStore::new();
        store.create_room(room("quiz"), "a").unwrap();

        let locked = store.set_lock(&room("quiz"), Some(name("bob"))).unwrap();
        assert!(locked.is_locked());
        assert_eq!(locked.locked_by(), "bob");

        let unlocked = store.set_lock(&room("quiz"), None).unwrap();
        assert!(!unlocked.is_locked());
        assert_eq!(unlocked.locked_by(), "");
    }

    #[test]
    fn set_lock_on_missing_room_is_not_found() {
        let mut store = RoomStore::new();
        let err = store.set_lock(&room("ghost"), Some(name("bob"))).unwrap_err();
        assert!(matches!(err, BuzzerError::NotFound(_)));
    }

    #[test]
    fn remove_room_is_idempotent() {
        let mut store = RoomStore::new();
        store.create_room(room("quiz"), "a").unwrap();
        assert!(store.remove_room(&room("quiz")).is_some());
        assert!(store.remove_room(&room("quiz")).is_none());
        assert!(store.is_empty());
    }
}
