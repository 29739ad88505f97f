//! The game session client.
//!
//! A [`GameSession`] owns the current snapshot of one game and mediates every
//! read and write against the server. Operations never fail to the caller:
//! failures end up as the session's current error string, and the snapshot is
//! left as it was.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};

use crate::api::{ApiError, GameApi, HttpApi};
use crate::common::{ClientError, Operation};
use crate::config::ClientConfig;
use crate::domain::{Game, GameId, GameSummary};
use crate::subscription::{ChannelUpdate, Subscription};
use crate::transport::{Connector, SocketIoConnector};

/// Coarse lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NoSession,
    Loading,
    Ready,
    Errored,
}

/// Everything the display layer renders from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub game: Option<Game>,
    pub loading: bool,
    pub error: Option<String>,
    /// Push channel is up. Never clears `game` when it drops.
    pub connected: bool,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        if self.loading {
            SessionPhase::Loading
        } else if self.error.is_some() {
            SessionPhase::Errored
        } else if self.game.is_some() {
            SessionPhase::Ready
        } else {
            SessionPhase::NoSession
        }
    }
}

type ActiveSubscription = (Subscription, mpsc::Receiver<ChannelUpdate>);

/// Client-side binding to one game, generic over the server collaborator.
pub struct GameSession<A: GameApi> {
    api: A,
    config: ClientConfig,
    state: watch::Sender<SessionState>,
    active_id: Option<GameId>,
    connector: Option<Arc<dyn Connector>>,
    subscription: Option<ActiveSubscription>,
}

impl GameSession<HttpApi> {
    /// Session talking HTTP to `config.api_base_url` with push updates over
    /// Socket.IO from `config.socket_url`.
    pub fn from_config(config: ClientConfig) -> anyhow::Result<Self> {
        let api = HttpApi::from_config(&config)?;
        let connector =
            SocketIoConnector::new(config.socket_url.clone()).with_timeout(config.request_timeout);
        Ok(GameSession::new(api, config).with_connector(Arc::new(connector)))
    }
}

impl<A: GameApi> GameSession<A> {
    pub fn new(api: A, config: ClientConfig) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            api,
            config,
            state,
            active_id: None,
            connector: None,
            subscription: None,
        }
    }

    /// Enable push updates through `connector`.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Copy of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that sees every state change, including `loading` flips.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn game(&self) -> Option<Game> {
        self.state.borrow().game.clone()
    }

    pub fn game_id(&self) -> Option<GameId> {
        self.active_id
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn clear_error(&mut self) {
        self.state.send_modify(|s| s.error = None);
    }

    fn begin(&self) {
        self.state.send_modify(|s| s.loading = true);
    }

    fn succeed(&self, game: Game) {
        self.state.send_modify(|s| {
            s.game = Some(game);
            s.error = None;
            s.loading = false;
        });
    }

    fn fail(&self, err: &ClientError) {
        let message = err.to_string();
        self.state.send_modify(|s| {
            s.error = Some(message);
            s.loading = false;
        });
    }

    /// Make `id` the active game. A different id drops the old snapshot and
    /// tears down the old subscription.
    async fn set_active(&mut self, id: GameId) {
        if self.active_id == Some(id) {
            return;
        }
        if let Some(previous) = self.active_id {
            info!("[GameSession] Switching from game {} to game {}", previous, id);
        }
        self.unsubscribe().await;
        self.active_id = Some(id);
        self.state.send_modify(|s| s.game = None);
    }

    async fn load(&mut self, id: GameId) -> Result<(), ClientError> {
        self.begin();
        debug!("[GameSession] Fetching game {}", id);
        match self.api.get_game(id).await {
            Ok(game) if game.id == id => {
                self.succeed(game);
                Ok(())
            }
            Ok(game) => {
                warn!("[GameSession] Asked for game {}, server sent game {}", id, game.id);
                let err = ClientError::MalformedResponse;
                self.fail(&err);
                Err(err)
            }
            Err(e) => {
                let err = classify(Operation::FetchGame, e);
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Fetch game `id` and make it the active session.
    ///
    /// A not-found answer is shown and then retried exactly once; the retry's
    /// result is final.
    pub async fn fetch_game(&mut self, id: GameId) -> bool {
        self.set_active(id).await;
        match self.load(id).await {
            Ok(()) => true,
            Err(err) if err.is_not_found() => {
                info!("[GameSession] Game {} not found, fetching once more", id);
                self.load(id).await.is_ok()
            }
            Err(_) => false,
        }
    }

    /// Ask the server for a new game. Returns its id so the caller can navigate to it.
    pub async fn create_game(&mut self) -> Option<GameId> {
        self.begin();
        debug!("[GameSession] Creating game");
        match self.api.create_game().await {
            Ok(game) => {
                let id = game.id;
                info!("[GameSession] Created game {}", id);
                self.set_active(id).await;
                self.succeed(game);
                Some(id)
            }
            Err(e) => {
                self.fail(&classify(Operation::CreateGame, e));
                None
            }
        }
    }

    /// Drop a piece into `column` of the active game.
    ///
    /// Whether the game is over is the caller's concern; the server answers
    /// such moves with an error that is shown verbatim.
    pub async fn make_move(&mut self, column: usize) -> bool {
        let current = self.state.borrow().game.as_ref().map(|g| g.id);
        let Some(id) = current else {
            warn!("[GameSession] {}; move to column {} ignored", ClientError::NoSession, column);
            return false;
        };
        self.begin();
        debug!("[GameSession] Game {}: move to column {}", id, column);
        let result = match self.api.make_move(id, column).await {
            Ok(result) => result,
            Err(e) => {
                self.fail(&classify(Operation::MakeMove, e));
                return false;
            }
        };
        match result.into_result() {
            Ok(game) if game.id == id => {
                self.succeed(game);
                true
            }
            Ok(game) => {
                warn!("[GameSession] Move on game {} answered with game {}", id, game.id);
                self.fail(&ClientError::MalformedResponse);
                false
            }
            Err(message) => {
                warn!("[GameSession] Move rejected: {}", message);
                self.fail(&ClientError::RejectedMove(message));
                false
            }
        }
    }

    /// List every game the server knows. Empty on failure.
    pub async fn fetch_games(&mut self) -> Vec<GameSummary> {
        self.begin();
        match self.api.list_games().await {
            Ok(games) => {
                debug!("[GameSession] Listed {} games", games.len());
                self.state.send_modify(|s| {
                    s.error = None;
                    s.loading = false;
                });
                games
            }
            Err(e) => {
                self.fail(&classify(Operation::FetchGames, e));
                Vec::new()
            }
        }
    }

    /// Fetch `id` and follow its push channel.
    pub async fn open(&mut self, id: GameId) -> bool {
        let fetched = self.fetch_game(id).await;
        self.subscribe().await;
        fetched
    }

    /// Start following the active game's push channel, replacing any running
    /// subscription. Returns `false` without an active game or a connector.
    pub async fn subscribe(&mut self) -> bool {
        let Some(id) = self.active_id else {
            debug!("[GameSession] No active game to subscribe to");
            return false;
        };
        let Some(connector) = self.connector.clone() else {
            debug!("[GameSession] Push updates disabled");
            return false;
        };
        self.unsubscribe().await;
        let (subscription, updates) = Subscription::start(
            id,
            connector,
            self.config.reconnect,
            self.config.shutdown_timeout,
        );
        self.subscription = Some((subscription, updates));
        true
    }

    async fn unsubscribe(&mut self) {
        if let Some((mut subscription, _)) = self.subscription.take() {
            subscription.shutdown().await;
        }
        self.state.send_modify(|s| s.connected = false);
    }

    /// Apply one message from the push channel.
    ///
    /// Snapshots for any game other than the active one are dropped.
    pub fn apply_update(&mut self, update: ChannelUpdate) {
        match update {
            ChannelUpdate::Snapshot(game) => {
                if Some(game.id) != self.active_id {
                    debug!(
                        "[GameSession] Ignoring snapshot for game {} (active: {:?})",
                        game.id, self.active_id
                    );
                    return;
                }
                self.state.send_modify(|s| {
                    s.game = Some(game);
                    s.error = None;
                });
            }
            ChannelUpdate::ChannelError(message) => {
                let err = ClientError::Channel(message);
                error!("[GameSession] Channel error: {}", err);
                let message = err.to_string();
                self.state.send_modify(|s| s.error = Some(message));
            }
            ChannelUpdate::Connectivity(connected) => {
                self.state.send_modify(|s| s.connected = connected);
            }
        }
    }

    /// Wait for the next push message, apply it and hand it back.
    ///
    /// `None` without a subscription, or once it has ended.
    pub async fn next_update(&mut self) -> Option<ChannelUpdate> {
        let (_, updates) = self.subscription.as_mut()?;
        match updates.recv().await {
            Some(update) => {
                self.apply_update(update.clone());
                Some(update)
            }
            None => {
                info!("[GameSession] Push channel ended");
                self.unsubscribe().await;
                None
            }
        }
    }

    /// Leave the push channel and forget the active game.
    pub async fn close(&mut self) {
        self.unsubscribe().await;
        self.active_id = None;
        self.state.send_modify(|s| {
            s.game = None;
            s.loading = false;
        });
    }
}

fn classify(op: Operation, err: ApiError) -> ClientError {
    match err {
        ApiError::Transport(e) => {
            error!("[GameSession] {}: {}", op.failure_message(), e);
            ClientError::Transport(op)
        }
        ApiError::NotFound(message) => ClientError::NotFound(message),
        ApiError::Malformed(e) => {
            warn!("[GameSession] Malformed response: {}", e);
            ClientError::MalformedResponse
        }
        ApiError::Rejected(message) if op == Operation::MakeMove => ClientError::RejectedMove(message),
        ApiError::Rejected(message) => {
            error!("[GameSession] {}: {}", op.failure_message(), message);
            ClientError::Transport(op)
        }
    }
}
