//! Error types shared across the client: board validation and session failures.

use core::fmt;

/// Errors raised while validating a board received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Board has the wrong number of rows.
    WrongHeight { expected: usize, found: usize },
    /// A row has the wrong number of cells.
    WrongWidth { row: usize, expected: usize, found: usize },
    /// A cell or `current_player` holds something other than player 1 or 2.
    InvalidPlayer(u8),
    /// `winner` holds something other than 0, 1 or 2.
    InvalidOutcome(u8),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::WrongHeight { expected, found } => {
                write!(f, "Board has {} rows, expected {}", found, expected)
            }
            BoardError::WrongWidth { row, expected, found } => {
                write!(f, "Board row {} has {} cells, expected {}", row, found, expected)
            }
            BoardError::InvalidPlayer(value) => write!(f, "Invalid player number: {}", value),
            BoardError::InvalidOutcome(value) => write!(f, "Invalid winner value: {}", value),
        }
    }
}

impl std::error::Error for BoardError {}

/// Session operation a failure is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchGame,
    CreateGame,
    MakeMove,
    FetchGames,
}

impl Operation {
    /// Generic message shown when the server could not be reached.
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::FetchGame => "Failed to fetch game state",
            Operation::CreateGame => "Failed to create game",
            Operation::MakeMove => "Failed to make move",
            Operation::FetchGames => "Failed to fetch games",
        }
    }
}

/// Message shown for payloads that fail validation.
pub const MALFORMED_MESSAGE: &str = "Invalid game state received";

/// Message shown when the server answers "not found" without a body.
pub const NOT_FOUND_MESSAGE: &str = "Game not found";

/// Failures the session reports to the display layer.
///
/// `Display` yields the exact text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Network or server unreachable.
    Transport(Operation),
    /// Payload missing a board or carrying one of the wrong shape.
    MalformedResponse,
    /// Server does not know the requested game.
    NotFound(String),
    /// Server refused the move; the text is passed through unchanged.
    RejectedMove(String),
    /// Error event pushed on the update channel.
    Channel(String),
    /// No game is loaded to act on.
    NoSession,
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(op) => write!(f, "{}", op.failure_message()),
            ClientError::MalformedResponse => write!(f, "{}", MALFORMED_MESSAGE),
            ClientError::NotFound(message)
            | ClientError::RejectedMove(message)
            | ClientError::Channel(message) => write!(f, "{}", message),
            ClientError::NoSession => write!(f, "No active game session"),
        }
    }
}

impl std::error::Error for ClientError {}
