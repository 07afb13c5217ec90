//! Buzzer rooms: membership, lock state and the WebSocket event protocol

mod actor;
mod engine;
mod messages;
mod registry;
mod rooms;
mod server;
mod types;

pub use actor::RoomManagerHandle;
pub use engine::{CoordinationEngine, DEFAULT_ADMIN_SECRET, Dispatch, EngineConfig, Target};
pub use messages::{ClientMessage, RoomUpdate, ServerMessage};
pub use registry::MembershipRegistry;
pub use rooms::RoomStore;
pub use server::{BuzzerServer, DEFAULT_PORT, KeepAlive};
pub use types::{
    BuzzerError, ConnectionId, DisplayName, ErrorKind, OutboundMessage, Participant, Room, RoomId,
    UserInfo,
};
