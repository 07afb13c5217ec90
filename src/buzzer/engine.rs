//! Coordination engine: validates each inbound event against the membership
//! registry and the room store, mutates them, and returns the events to fan
//! out. It performs no I/O, so callers decide how dispatches are delivered.

use tracing::{debug, info};

use super::messages::{ClientMessage, RoomUpdate, ServerMessage};
use super::registry::MembershipRegistry;
use super::rooms::RoomStore;
use super::types::{BuzzerError, ConnectionId, Participant, RoomId};

/// Secret stored for rooms whose creator supplied no password
pub const DEFAULT_ADMIN_SECRET: &str = "admin";

/// Engine settings shared with the room manager actor
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_admin_secret: String,
    /// Send an `error` event to the connection whose event was rejected
    pub report_errors: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_admin_secret: DEFAULT_ADMIN_SECRET.to_string(),
            report_errors: true,
        }
    }
}

/// Who receives a dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every current member of the room
    Room(RoomId),
    /// A single connection
    Connection(ConnectionId),
}

/// One outbound event for the dispatcher to deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub target: Target,
    pub message: ServerMessage,
}

impl Dispatch {
    pub fn to_room(room: RoomId, message: ServerMessage) -> Self {
        Self {
            target: Target::Room(room),
            message,
        }
    }

    pub fn to_connection(id: ConnectionId, message: ServerMessage) -> Self {
        Self {
            target: Target::Connection(id),
            message,
        }
    }
}

/// Sole owner and mutator of the membership registry and the room store.
///
/// Every method runs validate, mutate and compute-broadcast to completion, so
/// events handled one after another are totally ordered.
#[derive(Debug)]
pub struct CoordinationEngine {
    registry: MembershipRegistry,
    rooms: RoomStore,
    default_admin_secret: String,
}

impl Default for CoordinationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ADMIN_SECRET)
    }
}

impl CoordinationEngine {
    pub fn new(default_admin_secret: impl Into<String>) -> Self {
        Self {
            registry: MembershipRegistry::new(),
            rooms: RoomStore::new(),
            default_admin_secret: default_admin_secret.into(),
        }
    }

    pub fn registry(&self) -> &MembershipRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    /// Route one inbound event from `conn`.
    ///
    /// `Err` means the event was rejected and nothing changed. `Ok` with no
    /// dispatches means the event was a legal no-op (a losing press, a
    /// non-admin free, a repeated leave).
    pub fn handle(
        &mut self,
        conn: ConnectionId,
        msg: ClientMessage,
    ) -> Result<Vec<Dispatch>, BuzzerError> {
        match msg {
            ClientMessage::ConnectToRoom {
                room,
                username,
                password,
            } => self.join(conn, &room, &username, password.as_deref()),
            ClientMessage::BuzzerPress => self.buzzer_press(conn),
            ClientMessage::FreeBuzzer => self.free_buzzer(conn),
            ClientMessage::TextFieldUpdate { text } => {
                self.textfield_update(conn, text.as_deref().unwrap_or(""))
            }
            ClientMessage::LeaveRoom => Ok(self.leave(conn)),
        }
    }

    pub fn join(
        &mut self,
        conn: ConnectionId,
        room: &str,
        username: &str,
        password: Option<&str>,
    ) -> Result<Vec<Dispatch>, BuzzerError> {
        let room_id =
            RoomId::normalize(room).ok_or(BuzzerError::InvalidInput("room is required"))?;

        // The creator is admin unconditionally; later joiners need the secret.
        let existing = self.rooms.get_room(&room_id);
        let creating = existing.is_none();
        let is_admin = existing.is_none_or(|r| password.is_some_and(|p| p == r.admin_secret));

        let participant = self
            .registry
            .add_participant(conn, username, room_id.as_str(), is_admin)?;
        let name = participant.name.clone();

        if creating {
            let secret = password
                .filter(|p| !p.is_empty())
                .unwrap_or(self.default_admin_secret.as_str())
                .to_string();
            if let Err(e) = self.rooms.create_room(room_id.clone(), secret) {
                self.registry.remove_participant(&conn);
                return Err(e);
            }
            info!("Room {} created by {}", room_id, name);
        }

        info!(
            "{} ({}) joined room {} as {}",
            name,
            conn,
            room_id,
            if is_admin { "admin" } else { "player" }
        );
        Ok(self.room_update(&room_id).into_iter().collect())
    }

    pub fn buzzer_press(&mut self, conn: ConnectionId) -> Result<Vec<Dispatch>, BuzzerError> {
        let participant = self.participant(&conn)?;
        let room = self
            .rooms
            .get_room(&participant.room)
            .ok_or_else(|| BuzzerError::NotFound(format!("room {}", participant.room)))?;

        if room.is_locked() {
            debug!(
                "{} pressed in room {} but {} already holds the buzzer",
                participant.name,
                room.id,
                room.locked_by()
            );
            return Ok(Vec::new());
        }

        let name = participant.name.clone();
        let room_id = participant.room.clone();
        self.rooms.set_lock(&room_id, Some(name.clone()))?;

        info!("{} pressed the buzzer in room {}", name, room_id);
        Ok(vec![Dispatch::to_room(
            room_id,
            ServerMessage::BuzzerWasPressed(name.to_string()),
        )])
    }

    pub fn free_buzzer(&mut self, conn: ConnectionId) -> Result<Vec<Dispatch>, BuzzerError> {
        let participant = self.participant(&conn)?;
        if !participant.is_admin {
            debug!("Ignoring free_buzzer from non-admin {}", participant.name);
            return Ok(Vec::new());
        }

        let room_id = participant.room.clone();
        self.rooms.set_lock(&room_id, None)?;

        info!("Buzzer freed in room {}", room_id);
        Ok(vec![Dispatch::to_room(room_id, ServerMessage::BuzzerWasFreed {})])
    }

    /// Relay `text` to every other admin of the caller's room. Nothing is stored.
    pub fn textfield_update(
        &mut self,
        conn: ConnectionId,
        text: &str,
    ) -> Result<Vec<Dispatch>, BuzzerError> {
        let participant = self.participant(&conn)?;
        let message = ServerMessage::TextfieldUpdateFrom {
            name: participant.name.to_string(),
            text: text.to_string(),
        };

        Ok(self
            .registry
            .participants_in_room(&participant.room)
            .filter(|p| p.is_admin && p.id != conn)
            .map(|p| Dispatch::to_connection(p.id, message.clone()))
            .collect())
    }

    /// Leave and disconnect share this path. Unknown connections are a no-op.
    pub fn leave(&mut self, conn: ConnectionId) -> Vec<Dispatch> {
        let Some(participant) = self.registry.remove_participant(&conn) else {
            return Vec::new();
        };
        info!(
            "{} ({}) left room {}",
            participant.name, conn, participant.room
        );

        if self.registry.room_size(&participant.room) == 0 {
            self.rooms.remove_room(&participant.room);
            info!("Last participant left room {}, closing room", participant.room);
            return Vec::new();
        }

        self.room_update(&participant.room).into_iter().collect()
    }

    /// Current `room_update` payload, or `None` when the room is closed.
    pub fn room_snapshot(&self, room: &RoomId) -> Option<RoomUpdate> {
        let state = self.rooms.get_room(room)?;
        Some(RoomUpdate {
            room: state.id.to_string(),
            pressed: state.is_locked(),
            pressed_by: state.locked_by().to_string(),
            users: self
                .registry
                .participants_in_room(room)
                .map(|p| p.info())
                .collect(),
        })
    }

    /// Connections currently in `room`, in join order.
    pub fn members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.registry
            .participants_in_room(room)
            .map(|p| p.id)
            .collect()
    }

    fn room_update(&self, room: &RoomId) -> Option<Dispatch> {
        self.room_snapshot(room)
            .map(|update| Dispatch::to_room(room.clone(), ServerMessage::RoomUpdate(update)))
    }

    fn participant(&self, conn: &ConnectionId) -> Result<&Participant, BuzzerError> {
        self.registry
            .get_participant(conn)
            .ok_or_else(|| BuzzerError::NotFound(format!("{conn} is not in a room")))
    }
}
