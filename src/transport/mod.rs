use crate::protocol::Message;

/// Bidirectional channel carrying protocol [`Message`]s.
///
/// A peer that went away is reported as an error whose text contains `closed`.
#[async_trait::async_trait]
pub trait Transport: Send {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()>;
    async fn recv(&mut self) -> anyhow::Result<Message>;
    /// Close the connection. Later sends and receives fail.
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Opens fresh transports, once per (re)connection.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> anyhow::Result<Box<dyn Transport>>;
}

pub mod in_memory;
pub mod socketio;
pub mod ws;

pub use in_memory::{InMemoryAcceptor, InMemoryConnector, InMemoryTransport};
pub use socketio::{SocketIoConnector, SocketIoTransport};
pub use ws::{WsTransport, MAX_MESSAGE_SIZE};
