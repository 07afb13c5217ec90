use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::engine::{CoordinationEngine, Dispatch, EngineConfig, Target};
use super::messages::{ClientMessage, RoomUpdate, ServerMessage};
use super::types::{BuzzerError, ConnectionId, OutboundMessage, RoomId};

const COMMAND_QUEUE_SIZE: usize = 1024;

/// Commands sent to the room manager actor
pub(crate) enum RoomCommand {
    Connect {
        conn: ConnectionId,
        tx: mpsc::UnboundedSender<OutboundMessage>,
    },
    Event {
        conn: ConnectionId,
        message: ClientMessage,
    },
    Reject {
        conn: ConnectionId,
        error: BuzzerError,
    },
    Disconnect {
        conn: ConnectionId,
    },
    Snapshot {
        room: String,
        reply: oneshot::Sender<Option<RoomUpdate>>,
    },
}

/// Owns the engine and every connection's outbound channel. Commands are
/// handled one at a time, which serializes all state mutation.
struct RoomManager {
    engine: CoordinationEngine,
    sessions: HashMap<ConnectionId, mpsc::UnboundedSender<OutboundMessage>>,
    report_errors: bool,
}

impl RoomManager {
    fn new(config: EngineConfig) -> Self {
        Self {
            engine: CoordinationEngine::new(config.default_admin_secret),
            sessions: HashMap::new(),
            report_errors: config.report_errors,
        }
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Connect { conn, tx } => {
                self.sessions.insert(conn, tx);
                debug!("Session {} registered", conn);
            }

            RoomCommand::Event { conn, message } => {
                let event = message.event_name();
                match self.engine.handle(conn, message) {
                    Ok(dispatches) => self.deliver(dispatches),
                    Err(e) => {
                        info!("Rejected {} from {}: {}", event, conn, e);
                        self.report(conn, &e);
                    }
                }
            }

            RoomCommand::Reject { conn, error } => self.report(conn, &error),

            RoomCommand::Disconnect { conn } => {
                self.sessions.remove(&conn);
                let dispatches = self.engine.leave(conn);
                self.deliver(dispatches);
                debug!("Session {} removed", conn);
            }

            RoomCommand::Snapshot { room, reply } => {
                let snapshot =
                    RoomId::normalize(&room).and_then(|id| self.engine.room_snapshot(&id));
                let _ = reply.send(snapshot);
            }
        }
    }

    /// Fan out dispatches. Each message is serialized once and cloned per recipient.
    fn deliver(&self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            let msg = match dispatch.message.to_outbound() {
                Ok(msg) => msg,
                Err(e) => {
                    error!("Dropping dispatch: {}", e);
                    continue;
                }
            };

            match dispatch.target {
                Target::Room(room) => {
                    for conn in self.engine.members(&room) {
                        self.send(&conn, msg.clone());
                    }
                }
                Target::Connection(conn) => self.send(&conn, msg),
            }
        }
    }

    fn report(&self, conn: ConnectionId, err: &BuzzerError) {
        if !self.report_errors {
            return;
        }
        match ServerMessage::from_error(err).to_outbound() {
            Ok(msg) => self.send(&conn, msg),
            Err(e) => error!("Failed to encode error for {}: {}", conn, e),
        }
    }

    fn send(&self, conn: &ConnectionId, msg: OutboundMessage) {
        if let Some(tx) = self.sessions.get(conn) {
            if tx.send(msg).is_err() {
                warn!("Outbound channel closed for {}", conn);
            }
        }
    }
}

pub(crate) async fn room_manager_actor(mut rx: mpsc::Receiver<RoomCommand>, config: EngineConfig) {
    let mut manager = RoomManager::new(config);

    while let Some(cmd) = rx.recv().await {
        manager.handle_command(cmd);
    }

    info!("Room manager stopped");
}

/// Handle to communicate with the room manager actor
#[derive(Clone)]
pub struct RoomManagerHandle {
    pub(crate) tx: mpsc::Sender<RoomCommand>,
}

impl RoomManagerHandle {
    /// Spawn the actor on the current runtime.
    pub fn spawn(config: EngineConfig) -> Self {
        let (tx, rx) = mpsc::channel::<RoomCommand>(COMMAND_QUEUE_SIZE);
        tokio::spawn(room_manager_actor(rx, config));
        Self { tx }
    }

    /// Register the outbound channel of a freshly accepted connection
    pub async fn connect(&self, conn: ConnectionId, tx: mpsc::UnboundedSender<OutboundMessage>) {
        self.send(RoomCommand::Connect { conn, tx }).await;
    }

    /// Submit one parsed inbound event
    pub async fn send_event(&self, conn: ConnectionId, message: ClientMessage) {
        self.send(RoomCommand::Event { conn, message }).await;
    }

    /// Report an event that failed before reaching the engine (e.g. a malformed payload)
    pub async fn reject(&self, conn: ConnectionId, error: BuzzerError) {
        self.send(RoomCommand::Reject { conn, error }).await;
    }

    /// Connection closed; same effect as leaving the room
    pub async fn disconnect(&self, conn: ConnectionId) {
        self.send(RoomCommand::Disconnect { conn }).await;
    }

    /// Current snapshot of `room`, or `None` when no such room is open
    pub async fn room_snapshot(&self, room: &str) -> Result<Option<RoomUpdate>, BuzzerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Snapshot {
            room: room.to_string(),
            reply: reply_tx,
        })
        .await;
        reply_rx
            .await
            .map_err(|_| BuzzerError::Internal("actor channel closed".to_string()))
    }

    async fn send(&self, cmd: RoomCommand) {
        if self.tx.send(cmd).await.is_err() {
            warn!("Room manager is not running");
        }
    }
}
