use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::RoomManagerHandle;
use super::engine::EngineConfig;
use super::messages::ClientMessage;
use super::types::{ConnectionId, OutboundMessage};

pub const DEFAULT_PORT: u16 = 3001;
const MIN_PING_INTERVAL: Duration = Duration::from_millis(1);

/// Ping/pong liveness settings for each connection
#[derive(Debug, Clone, Copy)]
pub struct KeepAlive {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

pub struct BuzzerServer {
    handle: RoomManagerHandle,
    keepalive: KeepAlive,
}

impl Default for BuzzerServer {
    fn default() -> Self {
        Self::new(EngineConfig::default(), KeepAlive::default())
    }
}

impl BuzzerServer {
    pub fn new(config: EngineConfig, keepalive: KeepAlive) -> Self {
        Self {
            handle: RoomManagerHandle::spawn(config),
            keepalive,
        }
    }

    pub async fn run(&self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        info!("Buzzer server listening on {}", listener.local_addr()?);

        loop {
            let (stream, addr) = listener.accept().await?;
            let conn = ConnectionId::generate();
            let handle = self.handle.clone();
            let keepalive = self.keepalive;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, conn, handle, keepalive).await {
                    error!("Connection {} ({}) failed: {}", conn, addr, e);
                }
            });
        }
    }
}

/// Outcome of waiting on a connection's keepalive timers
#[derive(Debug, PartialEq, Eq)]
enum Beat {
    /// A ping is due
    Ping,
    /// The previous ping went unanswered
    Expired,
}

/// Ping/pong bookkeeping for one connection
struct Liveness {
    ticker: Interval,
    pong_timeout: Duration,
    pong_deadline: Option<Instant>,
}

impl Liveness {
    fn new(keepalive: KeepAlive) -> Self {
        // `interval` panics on a zero period.
        let period = keepalive.ping_interval.max(MIN_PING_INTERVAL);
        Self {
            ticker: tokio::time::interval(period),
            pong_timeout: keepalive.pong_timeout,
            pong_deadline: None,
        }
    }

    /// Waits for the next ping slot or for the pong deadline. Cancel safe.
    async fn next(&mut self) -> Beat {
        let deadline = self.pong_deadline;
        let pong_timeout = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = self.ticker.tick() => {
                if self.pong_deadline.is_some() {
                    Beat::Expired
                } else {
                    self.pong_deadline = Some(Instant::now() + self.pong_timeout);
                    Beat::Ping
                }
            }
            _ = pong_timeout => Beat::Expired,
        }
    }

    fn pong(&mut self) {
        self.pong_deadline = None;
    }
}

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Forward room events and control frames to the socket until either side closes
fn spawn_writer(
    mut ws_tx: WsSink,
    mut events: mpsc::UnboundedReceiver<OutboundMessage>,
    mut control: mpsc::UnboundedReceiver<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                Some(msg) = events.recv() => Message::Text(msg.into_inner()),
                Some(ctrl) = control.recv() => ctrl,
                else => break,
            };
            if ws_tx.send(frame).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_connection(
    stream: TcpStream,
    conn: ConnectionId,
    handle: RoomManagerHandle,
    keepalive: KeepAlive,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let peer = stream.peer_addr()?;
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (ws_tx, mut ws_rx) = ws_stream.split();
    info!("{} connected from {}", conn, peer);

    let (tx, rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel::<Message>();
    handle.connect(conn, tx).await;
    let writer = spawn_writer(ws_tx, rx, ctrl_rx);

    let mut liveness = Liveness::new(keepalive);
    loop {
        tokio::select! {
            beat = liveness.next() => match beat {
                Beat::Ping => {
                    if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                        break;
                    }
                    debug!("Ping sent to {}", conn);
                }
                Beat::Expired => {
                    warn!("{} missed its pong, disconnecting", conn);
                    break;
                }
            },

            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_text_message(&text, conn, &handle).await,
                Some(Ok(Message::Pong(_))) => {
                    liveness.pong();
                    debug!("Pong received from {}", conn);
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("{} closed the connection", conn);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error on {}: {}", conn, e);
                    break;
                }
            },
        }
    }

    handle.disconnect(conn).await;
    writer.abort();
    info!("{} disconnected", conn);

    Ok(())
}

async fn handle_text_message(text: &str, conn: ConnectionId, handle: &RoomManagerHandle) {
    match ClientMessage::parse(text) {
        Ok(message) => {
            debug!("{} from {}", message.event_name(), conn);
            handle.send_event(conn, message).await;
        }
        Err(e) => {
            warn!("Malformed message from {}: {}", conn, e);
            handle.reject(conn, e).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keepalive(ping_ms: u64, pong_ms: u64) -> KeepAlive {
        KeepAlive {
            ping_interval: Duration::from_millis(ping_ms),
            pong_timeout: Duration::from_millis(pong_ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_beat_is_an_immediate_ping() {
        let mut liveness = Liveness::new(keepalive(30_000, 10_000));
        assert_eq!(liveness.next().await, Beat::Ping);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_ping_expires_after_pong_timeout() {
        let mut liveness = Liveness::new(keepalive(30_000, 10_000));
        assert_eq!(liveness.next().await, Beat::Ping);

        let start = Instant::now();
        assert_eq!(liveness.next().await, Beat::Expired);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn pong_keeps_connection_alive() {
        let mut liveness = Liveness::new(keepalive(30_000, 10_000));
        assert_eq!(liveness.next().await, Beat::Ping);
        liveness.pong();
        assert_eq!(liveness.next().await, Beat::Ping);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ping_interval_does_not_panic() {
        let mut liveness = Liveness::new(keepalive(0, 10_000));
        assert_eq!(liveness.next().await, Beat::Ping);
        liveness.pong();
        assert_eq!(liveness.next().await, Beat::Ping);
    }
}
