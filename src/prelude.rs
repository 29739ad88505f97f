//! Commonly used types and utilities for ease of import.

pub use crate::{
    ChannelUpdate, ClientConfig, Game, GameApi, GameId, GameSession, GameState, GameStatus,
    GameSummary, HttpApi, Player, SessionState,
};

pub use crate::transport::{InMemoryConnector, InMemoryTransport, SocketIoConnector, Transport};
