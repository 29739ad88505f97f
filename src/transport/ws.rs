use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::debug;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default timeout for connecting and sending (30 seconds).
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest frame accepted (1 MB); a full game snapshot is a few hundred bytes.
pub const MAX_MESSAGE_SIZE: usize = 1 << 20;

/// WebSocket carrying text frames, with per-operation timeouts.
///
/// Frame boundaries only; the event framing on top lives in
/// [`SocketIoTransport`](crate::transport::SocketIoTransport).
pub struct WsTransport {
    stream: WsStream,
    timeout_duration: Duration,
    /// Receives fail after this much silence. `None` waits forever.
    idle_timeout: Option<Duration>,
    shutdown: Arc<AtomicBool>,
}

fn stream_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_MESSAGE_SIZE);
    config.max_frame_size = Some(MAX_MESSAGE_SIZE);
    config
}

impl WsTransport {
    fn with_config(
        stream: WsStream,
        timeout_duration: Duration,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            stream,
            timeout_duration,
            idle_timeout,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn connect(url: &Url) -> anyhow::Result<Self> {
        Self::connect_with_timeout(url, DEFAULT_TIMEOUT).await
    }

    /// Open the socket. Frames over [`MAX_MESSAGE_SIZE`] are refused by the
    /// WebSocket layer before they are buffered.
    pub async fn connect_with_timeout(url: &Url, timeout_duration: Duration) -> anyhow::Result<Self> {
        let connecting = connect_async_with_config(url.as_str(), Some(stream_config()), false);
        let (stream, _response) = timeout(timeout_duration, connecting)
            .await
            .map_err(|_| anyhow::anyhow!("Connect timeout after {:?}", timeout_duration))?
            .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", url, e))?;
        Ok(Self::with_config(stream, timeout_duration, None))
    }

    pub fn set_idle_timeout(&mut self, idle_timeout: Option<Duration>) {
        self.idle_timeout = idle_timeout;
    }

    /// Request graceful shutdown of the transport.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub async fn send_text(&mut self, text: String) -> anyhow::Result<()> {
        if self.is_shutdown() {
            return Err(anyhow::anyhow!("Transport is shut down"));
        }
        if text.len() > MAX_MESSAGE_SIZE {
            return Err(anyhow::anyhow!(
                "Message too large: {} bytes (max: {})",
                text.len(),
                MAX_MESSAGE_SIZE
            ));
        }
        timeout(self.timeout_duration, self.stream.send(WsMessage::Text(text)))
            .await
            .map_err(|_| anyhow::anyhow!("Send timeout after {:?}", self.timeout_duration))?
            .map_err(map_ws_error)
    }

    /// Next text frame. Binary frames holding UTF-8 are read as text.
    pub async fn recv_text(&mut self) -> anyhow::Result<String> {
        loop {
            if self.is_shutdown() {
                return Err(anyhow::anyhow!("Transport is shut down"));
            }
            let next = match self.idle_timeout {
                Some(idle) => timeout(idle, self.stream.next())
                    .await
                    .map_err(|_| anyhow::anyhow!("Connection idle timeout exceeded ({:?})", idle))?,
                None => self.stream.next().await,
            };
            match next {
                None => return Err(anyhow::anyhow!("Connection closed by peer")),
                Some(Err(e)) => return Err(map_ws_error(e)),
                Some(Ok(WsMessage::Text(text))) => return Ok(text),
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(text),
                    Err(_) => debug!("[WsTransport] Skipping non-UTF-8 binary frame"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!("[WsTransport] Close frame: {:?}", frame);
                    return Err(anyhow::anyhow!("Connection closed by peer"));
                }
                // ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
            }
        }
    }

    pub async fn close(&mut self) -> anyhow::Result<()> {
        self.shutdown();
        match timeout(self.timeout_duration, self.stream.close(None)).await {
            Ok(Ok(())) | Ok(Err(tungstenite::Error::ConnectionClosed)) => Ok(()),
            Ok(Err(e)) => Err(map_ws_error(e)),
            Err(_) => Err(anyhow::anyhow!("Close timeout after {:?}", self.timeout_duration)),
        }
    }
}

fn map_ws_error(e: tungstenite::Error) -> anyhow::Error {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            anyhow::anyhow!("Connection closed by peer")
        }
        tungstenite::Error::Io(io) if io.kind() == std::io::ErrorKind::ConnectionReset => {
            anyhow::anyhow!("Connection reset by peer, closed")
        }
        other => anyhow::anyhow!("WebSocket error: {}", other),
    }
}
