use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::protocol::Message;
use crate::transport::{Connector, Transport};

/// One end of an in-process message pipe.
pub struct InMemoryTransport {
    tx: Option<mpsc::UnboundedSender<Message>>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl InMemoryTransport {
    pub fn pair() -> (Self, Self) {
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(tx1),
                rx: rx2,
            },
            Self {
                tx: Some(tx2),
                rx: rx1,
            },
        )
    }

    /// Stop sending. The peer sees a closed channel once it drains its queue.
    pub fn shutdown(&mut self) {
        self.tx = None;
    }

    pub fn is_shutdown(&self) -> bool {
        self.tx.is_none()
    }
}

#[async_trait::async_trait]
impl Transport for InMemoryTransport {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Transport is shut down"))?;
        tx.send(msg).map_err(|_| anyhow::anyhow!("Channel closed"))
    }

    async fn recv(&mut self) -> anyhow::Result<Message> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("Channel closed"))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.shutdown();
        self.rx.close();
        Ok(())
    }
}

/// [`Connector`] handing the server side of every new pipe to an [`InMemoryAcceptor`].
#[derive(Clone)]
pub struct InMemoryConnector {
    incoming: mpsc::UnboundedSender<InMemoryTransport>,
    refusing: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

/// Server side of an [`InMemoryConnector`].
pub struct InMemoryAcceptor {
    incoming: mpsc::UnboundedReceiver<InMemoryTransport>,
    refusing: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl InMemoryConnector {
    pub fn channel() -> (Self, InMemoryAcceptor) {
        let (tx, rx) = mpsc::unbounded_channel();
        let refusing = Arc::new(AtomicBool::new(false));
        let attempts = Arc::new(AtomicUsize::new(0));
        (
            Self {
                incoming: tx,
                refusing: refusing.clone(),
                attempts: attempts.clone(),
            },
            InMemoryAcceptor {
                incoming: rx,
                refusing,
                attempts,
            },
        )
    }
}

impl InMemoryAcceptor {
    /// Next connection opened by the connector, `None` once every connector is gone.
    pub async fn accept(&mut self) -> Option<InMemoryTransport> {
        self.incoming.recv().await
    }

    /// Make further connection attempts fail (or succeed again).
    pub fn refuse(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Connection attempts seen so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self) -> anyhow::Result<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refusing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Connection refused"));
        }
        let (client, server) = InMemoryTransport::pair();
        self.incoming
            .send(server)
            .map_err(|_| anyhow::anyhow!("Connection refused"))?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GameId;

    #[tokio::test]
    async fn close_ends_both_directions() {
        let (mut client, mut server) = InMemoryTransport::pair();
        client.send(Message::JoinGame { game_id: GameId(1) }).await.unwrap();
        assert!(!client.is_shutdown());

        client.close().await.unwrap();
        assert!(client.is_shutdown());
        assert!(client.send(Message::LeaveGame { game_id: GameId(1) }).await.is_err());
        assert!(client.recv().await.is_err());

        // queued messages still drain before the peer sees the close
        assert_eq!(server.recv().await.unwrap(), Message::JoinGame { game_id: GameId(1) });
        assert!(server.recv().await.is_err());
        assert!(server.send(Message::LeaveGame { game_id: GameId(1) }).await.is_err());
    }
}
