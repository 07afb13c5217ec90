use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_tungstenite::tungstenite::Utf8Bytes;

/// Buzzer room errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuzzerError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("name {name} is already taken in room {room}")]
    DuplicateName { room: RoomId, name: DisplayName },

    #[error("connection already registered: {0}")]
    DuplicateConnection(ConnectionId),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("room already exists: {0}")]
    AlreadyExists(RoomId),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BuzzerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuzzerError::InvalidInput(_) => ErrorKind::InvalidInput,
            BuzzerError::DuplicateName { .. } => ErrorKind::DuplicateName,
            BuzzerError::DuplicateConnection(_) => ErrorKind::DuplicateConnection,
            BuzzerError::NotFound(_) => ErrorKind::NotFound,
            BuzzerError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            BuzzerError::Malformed(_) => ErrorKind::Malformed,
            BuzzerError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Wire-level error category carried by the `error` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    DuplicateName,
    DuplicateConnection,
    NotFound,
    AlreadyExists,
    Malformed,
    Internal,
}

const CONNECTION_ID_PREFIX: &[u8] = b"conn_";
const CONNECTION_ID_LEN: usize = 21;
const HEX_CHARS: &[u8] = b"0123456789abcdef";

/// Connection ID: 21-byte fixed array ("conn_" + 16 hex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    bytes: [u8; CONNECTION_ID_LEN],
    len: u8,
}

impl ConnectionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; CONNECTION_ID_LEN];
        let prefix_len = CONNECTION_ID_PREFIX.len();
        bytes[..prefix_len].copy_from_slice(CONNECTION_ID_PREFIX);

        let value: u64 = rand::rng().random();
        for i in 0..16 {
            let nibble = ((value >> (60 - i * 4)) & 0xF) as usize;
            bytes[prefix_len + i] = HEX_CHARS[nibble];
        }
        Self {
            bytes,
            len: CONNECTION_ID_LEN as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        let mut bytes = [0u8; CONNECTION_ID_LEN];
        let src = s.as_bytes();
        let len = src.len().min(CONNECTION_ID_LEN);
        bytes[..len].copy_from_slice(&src[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }
}

/// Canonical room id: trimmed and upper-cased, never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Returns `None` when nothing is left after trimming.
    pub fn normalize(raw: &str) -> Option<Self> {
        let canonical = raw.trim().to_uppercase();
        (!canonical.is_empty()).then_some(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Participant name: trimmed and lower-cased, never empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    /// Returns `None` when nothing is left after trimming.
    pub fn normalize(raw: &str) -> Option<Self> {
        let canonical = raw.trim().to_lowercase();
        (!canonical.is_empty()).then_some(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A connection that has joined a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ConnectionId,
    pub name: DisplayName,
    pub room: RoomId,
    /// Fixed at join time; never re-evaluated.
    pub is_admin: bool,
}

impl Participant {
    pub fn info(&self) -> UserInfo {
        UserInfo {
            name: self.name.as_str().to_owned(),
            is_admin: self.is_admin,
        }
    }
}

/// Public view of a participant. Connection ids are never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

/// Per-room admin secret and buzzer lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub admin_secret: String,
    /// Holder of the buzzer lock; `Some` means locked.
    pub holder: Option<DisplayName>,
}

impl Room {
    pub fn is_locked(&self) -> bool {
        self.holder.is_some()
    }

    /// Holder name, or empty when unlocked.
    pub fn locked_by(&self) -> &str {
        self.holder.as_ref().map(DisplayName::as_str).unwrap_or("")
    }
}

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner Utf8Bytes for tungstenite Message::Text
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}
