//! Socket.IO v4 client over a plain WebSocket.
//!
//! Every text frame is one Engine.IO packet. The first byte is the Engine.IO
//! type (`0` open, `1` close, `2` ping, `3` pong, `4` message). Message
//! packets carry a Socket.IO packet whose first byte is its own type (`0`
//! connect, `1` disconnect, `2` event, `4` connect error), so a server event
//! reads `42["game_updated",{...}]`.

use std::collections::VecDeque;

use log::{debug, info};
use serde::Deserialize;
use tokio::time::{timeout, Duration};
use url::Url;

use crate::protocol::{DecodeError, Message};
use crate::transport::ws::{WsTransport, DEFAULT_TIMEOUT};
use crate::transport::{Connector, Transport};

/// Path the server mounts Socket.IO on.
const SOCKET_IO_PATH: &str = "/socket.io/";

const CONNECT: &str = "40";
const DISCONNECT: &str = "41";
const PONG: &str = "3";

/// Engine.IO open packet payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

impl Handshake {
    /// Silence after which the server is presumed gone.
    fn idle_timeout(&self) -> Option<Duration> {
        match self.ping_interval.saturating_add(self.ping_timeout) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Connect,
    Disconnect,
    /// Event argument array, still encoded.
    Event(String),
    ConnectError(String),
    /// Noops, acks and binary packets; never sent by the game server.
    Other(String),
}

pub(crate) fn decode_packet(text: &str) -> Result<Packet, DecodeError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or_else(|| DecodeError("empty packet".into()))?;
    let body = chars.as_str();
    match kind {
        '0' => serde_json::from_str(body)
            .map(Packet::Open)
            .map_err(|e| DecodeError(format!("bad open packet: {}", e))),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket_packet(body),
        '5' | '6' => Ok(Packet::Other(text.to_string())),
        other => Err(DecodeError(format!("unknown packet type {:?}", other))),
    }
}

fn decode_socket_packet(body: &str) -> Result<Packet, DecodeError> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or_else(|| DecodeError("empty message packet".into()))?;
    let mut rest = chars.as_str();
    if rest.starts_with('/') {
        rest = rest.split_once(',').map_or("", |(_, after)| after);
    }
    // ack id
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    match kind {
        '0' => Ok(Packet::Connect),
        '1' => Ok(Packet::Disconnect),
        '2' => Ok(Packet::Event(rest.to_string())),
        '4' => Ok(Packet::ConnectError(connect_error_message(rest))),
        '3' | '5' | '6' => Ok(Packet::Other(body.to_string())),
        other => Err(DecodeError(format!("unknown message packet type {:?}", other))),
    }
}

fn connect_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_string())
}

pub(crate) fn event_packet(msg: &Message) -> anyhow::Result<String> {
    Ok(format!("42{}", msg.encode()?))
}

/// Fill in the Socket.IO path and Engine.IO query when `url` names only a host.
fn endpoint(mut url: Url) -> Url {
    if url.path().is_empty() || url.path() == "/" {
        url.set_path(SOCKET_IO_PATH);
    }
    if !url.query_pairs().any(|(key, _)| key == "EIO") {
        url.query_pairs_mut()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
    }
    url
}

/// [`Transport`] speaking Socket.IO on the default namespace.
pub struct SocketIoTransport {
    socket: WsTransport,
    /// Events that arrived before the namespace connect ack.
    pending: VecDeque<String>,
}

impl SocketIoTransport {
    pub async fn connect(url: &Url) -> anyhow::Result<Self> {
        Self::connect_with_timeout(url, DEFAULT_TIMEOUT).await
    }

    /// Open the socket and join the default namespace.
    ///
    /// `timeout_duration` bounds the whole handshake.
    pub async fn connect_with_timeout(url: &Url, timeout_duration: Duration) -> anyhow::Result<Self> {
        timeout(timeout_duration, Self::handshake(url, timeout_duration))
            .await
            .map_err(|_| anyhow::anyhow!("Connect timeout after {:?}", timeout_duration))?
    }

    async fn handshake(url: &Url, timeout_duration: Duration) -> anyhow::Result<Self> {
        let mut socket = WsTransport::connect_with_timeout(url, timeout_duration).await?;
        let handshake = match decode_packet(&socket.recv_text().await?)? {
            Packet::Open(handshake) => handshake,
            other => return Err(anyhow::anyhow!("Expected open packet, got {:?}", other)),
        };
        socket.set_idle_timeout(handshake.idle_timeout());
        socket.send_text(CONNECT.to_string()).await?;

        let mut pending = VecDeque::new();
        loop {
            match decode_packet(&socket.recv_text().await?)? {
                Packet::Connect => break,
                Packet::ConnectError(message) => {
                    let _ = socket.close().await;
                    return Err(anyhow::anyhow!("Server refused connection: {}", message));
                }
                Packet::Ping => socket.send_text(PONG.to_string()).await?,
                Packet::Event(args) => pending.push_back(args),
                Packet::Close | Packet::Disconnect => {
                    return Err(anyhow::anyhow!("Server closed the session during handshake"));
                }
                other => debug!("[SocketIo] Skipping {:?} during handshake", other),
            }
        }
        info!("[SocketIo] Session {} open", handshake.sid);
        Ok(Self { socket, pending })
    }
}

#[async_trait::async_trait]
impl Transport for SocketIoTransport {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()> {
        let packet = event_packet(&msg)?;
        self.socket.send_text(packet).await
    }

    async fn recv(&mut self) -> anyhow::Result<Message> {
        if let Some(args) = self.pending.pop_front() {
            return Ok(Message::decode(&args)?);
        }
        loop {
            let text = self.socket.recv_text().await?;
            match decode_packet(&text)? {
                Packet::Event(args) => return Ok(Message::decode(&args)?),
                Packet::Ping => self.socket.send_text(PONG.to_string()).await?,
                Packet::Close | Packet::Disconnect => {
                    return Err(anyhow::anyhow!("Server closed the session"));
                }
                Packet::ConnectError(message) => {
                    return Err(anyhow::anyhow!("Server error: {}; session closed", message));
                }
                other => debug!("[SocketIo] Skipping {:?}", other),
            }
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.pending.clear();
        if !self.socket.is_shutdown() {
            if let Err(e) = self.socket.send_text(DISCONNECT.to_string()).await {
                debug!("[SocketIo] Disconnect not sent: {}", e);
            }
        }
        self.socket.close().await
    }
}

/// [`Connector`] opening a [`SocketIoTransport`] to a fixed server.
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    url: Url,
    timeout: Duration,
}

impl SocketIoConnector {
    /// A bare `ws://host:port` gets the Socket.IO path and query appended.
    pub fn new(url: Url) -> Self {
        Self {
            url: endpoint(url),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait::async_trait]
impl Connector for SocketIoConnector {
    async fn connect(&self) -> anyhow::Result<Box<dyn Transport>> {
        debug!("[SocketIoConnector] Connecting to {}", self.url);
        let transport = SocketIoTransport::connect_with_timeout(&self.url, self.timeout).await?;
        Ok(Box::new(transport))
    }
}
