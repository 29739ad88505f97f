//! Background task keeping one game's push channel alive.
//!
//! [`Subscription::start`] spawns the task and hands back a receiver of
//! [`ChannelUpdate`]s. The task joins the game's channel on every (re)connect
//! and leaves it when shut down. Refused connects and connections that drop
//! before the server sends anything count against the same bounded backoff.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::common::MALFORMED_MESSAGE;
use crate::config::ReconnectPolicy;
use crate::domain::{Game, GameId};
use crate::protocol::{DecodeError, Message};
use crate::transport::{Connector, Transport};

/// Capacity of the update channel handed to the display layer.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// What the subscription reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelUpdate {
    /// A full snapshot pushed by the server. Not yet filtered by game id.
    Snapshot(Game),
    /// An error event from the server, or an unreadable frame.
    ChannelError(String),
    /// The channel connected (`true`) or dropped (`false`).
    Connectivity(bool),
}

/// Handle to a running subscription task.
pub struct Subscription {
    game_id: GameId,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl Subscription {
    /// Spawn the subscription task for `game_id`.
    pub fn start(
        game_id: GameId,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        shutdown_timeout: Duration,
    ) -> (Self, mpsc::Receiver<ChannelUpdate>) {
        let (update_tx, update_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(subscription_loop(
            game_id,
            connector,
            policy,
            update_tx,
            shutdown_rx,
        ));
        let subscription = Self {
            game_id,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };
        (subscription, update_rx)
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// `true` once the task has exited (gave up, or was shut down).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Leave the channel, close the connection and wait for the task.
    ///
    /// The task is aborted if it does not exit within the shutdown timeout.
    pub async fn shutdown(&mut self) {
        debug!("[Subscription] Shutting down game {}", self.game_id);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => warn!("[Subscription] Task ended abnormally: {}", join_err),
                Err(_) => {
                    warn!("[Subscription] Task did not exit in {:?}; aborting", self.shutdown_timeout);
                    task.abort();
                    let _ = task.await;
                }
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // no executor here to run the graceful leave
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Why the connected phase ended.
enum Exit {
    Shutdown,
    Lost(anyhow::Error),
    OwnerGone,
}

async fn subscription_loop(
    game_id: GameId,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    updates: mpsc::Sender<ChannelUpdate>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    // consecutive attempts that never got a frame from the server
    let mut failures: u32 = 0;
    loop {
        let connected = tokio::select! {
            _ = &mut shutdown_rx => return,
            result = connector.connect() => result,
        };

        let mut transport = match connected {
            Ok(transport) => transport,
            Err(e) => {
                failures += 1;
                if failures >= policy.attempts() {
                    error!(
                        "[Subscription] Giving up on game {} after {} failed attempts: {}",
                        game_id, failures, e
                    );
                    let _ = updates.send(ChannelUpdate::Connectivity(false)).await;
                    return;
                }
                let delay = policy.delay(failures - 1);
                warn!(
                    "[Subscription] Connect attempt {} failed: {}; retrying in {:?}",
                    failures, e, delay
                );
                tokio::select! {
                    _ = &mut shutdown_rx => return,
                    _ = sleep(delay) => continue,
                }
            }
        };

        info!("[Subscription] Connected, joining game {}", game_id);
        if updates.send(ChannelUpdate::Connectivity(true)).await.is_err() {
            let _ = transport.close().await;
            return;
        }

        let exit = match transport.send(Message::JoinGame { game_id }).await {
            Ok(()) => {
                run_joined(game_id, transport.as_mut(), &updates, &mut shutdown_rx, &mut failures)
                    .await
            }
            Err(e) => Exit::Lost(e),
        };

        match exit {
            Exit::Shutdown => {
                if let Err(e) = transport.send(Message::LeaveGame { game_id }).await {
                    debug!("[Subscription] Leave for game {} not sent: {}", game_id, e);
                }
                let _ = transport.close().await;
                info!("[Subscription] Left game {}", game_id);
                return;
            }
            Exit::OwnerGone => {
                let _ = transport.close().await;
                return;
            }
            Exit::Lost(e) => {
                let _ = transport.close().await;
                failures += 1;
                if updates.send(ChannelUpdate::Connectivity(false)).await.is_err() {
                    return;
                }
                if failures >= policy.attempts() {
                    error!(
                        "[Subscription] Giving up on game {} after {} dropped connections: {}",
                        game_id, failures, e
                    );
                    return;
                }
                let delay = policy.delay(failures - 1);
                warn!(
                    "[Subscription] Connection for game {} lost: {}; reconnecting in {:?}",
                    game_id, e, delay
                );
                tokio::select! {
                    _ = &mut shutdown_rx => return,
                    _ = sleep(delay) => {}
                }
            }
        }
    }
}

/// Forward server events until the connection drops or shutdown is requested.
///
/// The first frame from the server clears `failures`.
async fn run_joined(
    game_id: GameId,
    transport: &mut dyn Transport,
    updates: &mpsc::Sender<ChannelUpdate>,
    shutdown_rx: &mut oneshot::Receiver<()>,
    failures: &mut u32,
) -> Exit {
    loop {
        let incoming = tokio::select! {
            _ = &mut *shutdown_rx => return Exit::Shutdown,
            msg = transport.recv() => msg,
        };
        let alive = match &incoming {
            Ok(_) => true,
            Err(e) => e.downcast_ref::<DecodeError>().is_some(),
        };
        if alive {
            *failures = 0;
        }
        let update = match incoming {
            Ok(Message::GameUpdated(game)) => {
                debug!("[Subscription] Snapshot for game {}", game.id);
                ChannelUpdate::Snapshot(game)
            }
            Ok(Message::Error { message }) => {
                warn!("[Subscription] Server error: {}", message);
                ChannelUpdate::ChannelError(message)
            }
            Ok(Message::Connected { data }) => {
                debug!("[Subscription] Server greeting: {:?}", data);
                continue;
            }
            Ok(Message::JoinedGame { game_id: joined, .. }) => {
                info!("[Subscription] Joined game {}", joined);
                continue;
            }
            Ok(Message::LeftGame { game_id: left, .. }) => {
                debug!("[Subscription] Left game {}", left);
                continue;
            }
            Ok(other) => {
                debug!("[Subscription] Ignoring client-bound message {:?} for game {}", other, game_id);
                continue;
            }
            Err(e) if e.downcast_ref::<DecodeError>().is_some() => {
                warn!("[Subscription] Unreadable frame: {}", e);
                ChannelUpdate::ChannelError(MALFORMED_MESSAGE.to_string())
            }
            Err(e) => return Exit::Lost(e),
        };
        if updates.send(update).await.is_err() {
            return Exit::OwnerGone;
        }
    }
}
