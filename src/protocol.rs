//! Events carried by the push-update channel.
//!
//! On the wire an event is a Socket.IO argument array `[<name>, <payload>]`,
//! e.g. `["join_game", {"game_id": 42}]`. The packet prefixes around it are
//! handled by [`SocketIoTransport`](crate::transport::SocketIoTransport).

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Game, GameId};

/// Messages exchanged between the client and the push-update server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Message {
    /// Client asks to receive updates for a game.
    JoinGame { game_id: GameId },
    /// Client stops receiving updates for a game.
    LeaveGame { game_id: GameId },
    /// Server greeting after the connection opens.
    Connected {
        #[serde(default)]
        data: Option<String>,
    },
    /// Server confirms a join.
    JoinedGame {
        game_id: GameId,
        #[serde(default)]
        room: Option<String>,
    },
    /// Server confirms a leave.
    LeftGame {
        game_id: GameId,
        #[serde(default)]
        room: Option<String>,
    },
    /// Full snapshot of a game after a change.
    GameUpdated(Game),
    /// Server-side failure, e.g. joining an unknown game.
    Error { message: String },
}

impl Message {
    /// Event name and payload as an argument array.
    pub fn encode(&self) -> anyhow::Result<String> {
        let tagged = serde_json::to_value(self)
            .map_err(|e| anyhow::anyhow!("Serialization error: {}", e))?;
        let Value::Object(mut fields) = tagged else {
            return Err(anyhow::anyhow!("Serialization error: event is not an object"));
        };
        let event = fields.remove("event").unwrap_or(Value::Null);
        let args = match fields.remove("data") {
            Some(data) => vec![event, data],
            None => vec![event],
        };
        serde_json::to_string(&args).map_err(|e| anyhow::anyhow!("Serialization error: {}", e))
    }

    /// Parse an argument array. Failures are reported as [`DecodeError`].
    ///
    /// Arguments after the payload are ignored.
    pub fn decode(text: &str) -> Result<Message, DecodeError> {
        let args: Vec<Value> = serde_json::from_str(text).map_err(|e| DecodeError(e.to_string()))?;
        let mut args = args.into_iter();
        let event = match args.next() {
            Some(Value::String(name)) => name,
            _ => return Err(DecodeError("event name missing".into())),
        };
        let mut tagged = serde_json::Map::new();
        tagged.insert("event".into(), Value::String(event));
        if let Some(data) = args.next() {
            tagged.insert("data".into(), data);
        }
        serde_json::from_value(Value::Object(tagged)).map_err(|e| DecodeError(e.to_string()))
    }
}

/// A frame arrived but could not be understood.
///
/// Transports return it inside `anyhow::Error` so callers can tell a bad frame
/// from a dead connection with `downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deserialization error: {}", self.0)
    }
}

impl std::error::Error for DecodeError {}
