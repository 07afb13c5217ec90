use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{BuzzerError, ErrorKind, OutboundMessage, UserInfo};

/// Inbound frame envelope: `{"event": "...", "data": ...}`. Outbound frames use the
/// same shape through `ServerMessage`'s adjacent tagging.
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ConnectToRoomPayload {
    room: String,
    username: String,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TextFieldPayload {
    #[serde(default)]
    text: Option<String>,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Join a room, creating it when unseen
    ConnectToRoom {
        room: String,
        username: String,
        password: Option<String>,
    },

    /// Try to take the buzzer lock
    BuzzerPress,

    /// Release the buzzer lock (admins only)
    FreeBuzzer,

    /// Relay the caller's text to the room's admins
    TextFieldUpdate { text: Option<String> },

    /// Leave the current room but keep the connection
    LeaveRoom,
}

impl ClientMessage {
    /// Parse one text frame. Unknown events and mistyped payloads are `Malformed`.
    pub fn parse(text: &str) -> Result<Self, BuzzerError> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| BuzzerError::Malformed(format!("invalid envelope: {e}")))?;

        match envelope.event.as_str() {
            "connect_to_room" => {
                let payload: ConnectToRoomPayload = serde_json::from_value(envelope.data)
                    .map_err(|e| BuzzerError::Malformed(format!("connect_to_room: {e}")))?;
                Ok(ClientMessage::ConnectToRoom {
                    room: payload.room,
                    username: payload.username,
                    password: payload.password,
                })
            }
            "buzzer_press" => Ok(ClientMessage::BuzzerPress),
            "free_buzzer" => Ok(ClientMessage::FreeBuzzer),
            "textfield_update" => {
                let payload = match envelope.data {
                    Value::Null => TextFieldPayload::default(),
                    data => serde_json::from_value(data).map_err(|e| {
                        BuzzerError::Malformed(format!("textfield_update: {e}"))
                    })?,
                };
                Ok(ClientMessage::TextFieldUpdate { text: payload.text })
            }
            "leave_room" => Ok(ClientMessage::LeaveRoom),
            other => Err(BuzzerError::Malformed(format!("unknown event: {other}"))),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::ConnectToRoom { .. } => "connect_to_room",
            ClientMessage::BuzzerPress => "buzzer_press",
            ClientMessage::FreeBuzzer => "free_buzzer",
            ClientMessage::TextFieldUpdate { .. } => "textfield_update",
            ClientMessage::LeaveRoom => "leave_room",
        }
    }
}

/// Full snapshot of a room as seen by its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUpdate {
    pub room: String,
    pub pressed: bool,
    pub pressed_by: String,
    pub users: Vec<UserInfo>,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomUpdate(RoomUpdate),

    /// Name of the participant holding the lock
    BuzzerWasPressed(String),

    BuzzerWasFreed {},

    /// Admin-only relay of another participant's text field
    TextfieldUpdateFrom { name: String, text: String },

    /// Sent only to the connection whose event was rejected
    Error { kind: ErrorKind, message: String },
}

impl ServerMessage {
    pub fn from_error(err: &BuzzerError) -> Self {
        ServerMessage::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn to_outbound(&self) -> Result<OutboundMessage, BuzzerError> {
        serde_json::to_string(self)
            .map(OutboundMessage::from)
            .map_err(|e| BuzzerError::Internal(format!("serialize {self:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_connect_to_room() {
        let json = json!({
            "event": "connect_to_room",
            "data": {"room": "quiz", "username": "Alice", "password": "pw"},
        });
        let msg = ClientMessage::parse(&json.to_string()).unwrap();
        assert_eq!(
            msg,
            ClientMessage::ConnectToRoom {
                room: "quiz".to_string(),
                username: "Alice".to_string(),
                password: Some("pw".to_string()),
            }
        );
    }

    #[test]
    fn parse_connect_to_room_without_password() {
        let json = r#"{"event": "connect_to_room", "data": {"room": "quiz", "username": "bob"}}"#;
        if let ClientMessage::ConnectToRoom { password, .. } = ClientMessage::parse(json).unwrap() {
            assert_eq!(password, None);
        } else {
            panic!("Expected ConnectToRoom");
        }
    }

    #[test]
    fn parse_connect_to_room_rejects_wrong_types() {
        let json = r#"{"event": "connect_to_room", "data": {"room": 7, "username": "bob"}}"#;
        let err = ClientMessage::parse(json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);

        let json = json!({
            "event": "connect_to_room",
            "data": {"room": "a", "username": "b", "password": 1},
        });
        assert!(ClientMessage::parse(&json.to_string()).is_err());

        let json = r#"{"event": "connect_to_room"}"#;
        assert!(ClientMessage::parse(json).is_err());
    }

    #[test]
    fn parse_payloadless_events() {
        assert_eq!(
            ClientMessage::parse(r#"{"event": "buzzer_press", "data": {}}"#).unwrap(),
            ClientMessage::BuzzerPress
        );
        assert_eq!(
            ClientMessage::parse(r#"{"event": "free_buzzer"}"#).unwrap(),
            ClientMessage::FreeBuzzer
        );
        assert_eq!(
            ClientMessage::parse(r#"{"event": "leave_room", "data": null}"#).unwrap(),
            ClientMessage::LeaveRoom
        );
    }

    #[test]
    fn parse_textfield_update() {
        let msg = ClientMessage::parse(r#"{"event": "textfield_update", "data": {"text": "42"}}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::TextFieldUpdate {
                text: Some("42".to_string())
            }
        );

        let msg = ClientMessage::parse(r#"{"event": "textfield_update"}"#).unwrap();
        assert_eq!(msg, ClientMessage::TextFieldUpdate { text: None });

        let err = ClientMessage::parse(r#"{"event": "textfield_update", "data": {"text": false}}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn parse_rejects_unknown_event_and_garbage() {
        let err = ClientMessage::parse(r#"{"event": "explode"}"#).unwrap_err();
        assert!(err.to_string().contains("explode"));
        assert!(ClientMessage::parse("not json").is_err());
        assert!(ClientMessage::parse(r#"{"data": {}}"#).is_err());
    }

    #[test]
    fn serialize_room_update() {
        let msg = ServerMessage::RoomUpdate(RoomUpdate {
            room: "QUIZ".to_string(),
            pressed: true,
            pressed_by: "bob".to_string(),
            users: vec![UserInfo {
                name: "alice".to_string(),
                is_admin: true,
            }],
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({
                "event": "room_update",
                "data": {
                    "room": "QUIZ",
                    "pressed": true,
                    "pressed_by": "bob",
                    "users": [{"name": "alice", "isAdmin": true}],
                },
            })
        );
    }

    #[test]
    fn serialize_buzzer_events() {
        let pressed =
            serde_json::to_string(&ServerMessage::BuzzerWasPressed("bob".into())).unwrap();
        assert_eq!(pressed, r#"{"event":"buzzer_was_pressed","data":"bob"}"#);

        let freed = serde_json::to_string(&ServerMessage::BuzzerWasFreed {}).unwrap();
        assert_eq!(freed, r#"{"event":"buzzer_was_freed","data":{}}"#);
    }

    #[test]
    fn serialize_textfield_update_from() {
        let msg = ServerMessage::TextfieldUpdateFrom {
            name: "bob".to_string(),
            text: "paris".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"event":"textfield_update_from","data":{"name":"bob","text":"paris"}}"#
        );
    }

    #[test]
    fn serialize_error() {
        let msg = ServerMessage::from_error(&BuzzerError::InvalidInput("username is required"));
        let json = msg.to_outbound().unwrap();
        assert!(json.as_str().contains(r#""event":"error""#));
        assert!(json.as_str().contains("invalid_input"));
        assert!(json.as_str().contains("username is required"));
    }
}
