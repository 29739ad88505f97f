//! Seam between the session and the game server.

use core::fmt;
use std::sync::Arc;

use crate::domain::{Game, GameId, GameSummary, MoveResult};

pub mod http;

pub use http::HttpApi;

/// Failures reported by a [`GameApi`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Server unreachable, timed out, or answered with an unexpected status.
    Transport(String),
    /// Server answered 404; carries the server's message.
    NotFound(String),
    /// Payload could not be decoded or failed board validation.
    Malformed(String),
    /// Server refused the request with an explicit error message.
    Rejected(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(e) => write!(f, "transport error: {}", e),
            ApiError::NotFound(e) => write!(f, "not found: {}", e),
            ApiError::Malformed(e) => write!(f, "malformed response: {}", e),
            ApiError::Rejected(e) => write!(f, "rejected: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

/// Operations the game server offers to this client.
#[async_trait::async_trait]
pub trait GameApi: Send + Sync {
    async fn get_game(&self, id: GameId) -> Result<Game, ApiError>;
    async fn create_game(&self) -> Result<Game, ApiError>;
    async fn make_move(&self, id: GameId, column: usize) -> Result<MoveResult, ApiError>;
    async fn list_games(&self) -> Result<Vec<GameSummary>, ApiError>;
}

#[async_trait::async_trait]
impl<T: GameApi + ?Sized> GameApi for Arc<T> {
    async fn get_game(&self, id: GameId) -> Result<Game, ApiError> {
        (**self).get_game(id).await
    }

    async fn create_game(&self) -> Result<Game, ApiError> {
        (**self).create_game().await
    }

    async fn make_move(&self, id: GameId, column: usize) -> Result<MoveResult, ApiError> {
        (**self).make_move(id, column).await
    }

    async fn list_games(&self) -> Result<Vec<GameSummary>, ApiError> {
        (**self).list_games().await
    }
}
