//! Game snapshots exchanged with the server.
//!
//! Every type here is an immutable view of server state. The client replaces
//! snapshots wholesale and never edits a board cell.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::common::BoardError;
use crate::config::{BOARD_HEIGHT, BOARD_WIDTH};

/// Server-assigned game identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GameId {
    fn from(id: u64) -> Self {
        GameId(id)
    }
}

/// One of the two players, `1` or `2` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn number(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }

    pub fn other(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Character used for this player's pieces in text views.
    pub fn symbol(self) -> char {
        match self {
            Player::One => 'X',
            Player::Two => 'O',
        }
    }
}

impl TryFrom<u8> for Player {
    type Error = BoardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(BoardError::InvalidPlayer(other)),
        }
    }
}

impl From<Player> for u8 {
    fn from(player: Player) -> u8 {
        player.number()
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.number())
    }
}

/// Result of a finished game: `1`/`2` for a win, `0` for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Outcome {
    Winner(Player),
    Draw,
}

impl TryFrom<u8> for Outcome {
    type Error = BoardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Outcome::Draw),
            1 | 2 => Player::try_from(value).map(Outcome::Winner),
            other => Err(BoardError::InvalidOutcome(other)),
        }
    }
}

impl From<Outcome> for u8 {
    fn from(outcome: Outcome) -> u8 {
        match outcome {
            Outcome::Winner(player) => player.number(),
            Outcome::Draw => 0,
        }
    }
}

type Rows = Vec<Vec<Option<Player>>>;

/// Validated grid of `BOARD_HEIGHT` rows by `BOARD_WIDTH` columns, row 0 on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Rows", into = "Rows")]
pub struct Board {
    rows: Rows,
}

impl Board {
    /// Board with no pieces.
    pub fn empty() -> Self {
        Board {
            rows: vec![vec![None; BOARD_WIDTH]; BOARD_HEIGHT],
        }
    }

    /// Validate raw rows from the server.
    ///
    /// An empty row list stands for a fresh board. Any other shape that is not
    /// exactly `BOARD_HEIGHT` by `BOARD_WIDTH` is rejected.
    pub fn from_rows(rows: Rows) -> Result<Self, BoardError> {
        if rows.is_empty() {
            return Ok(Board::empty());
        }
        if rows.len() != BOARD_HEIGHT {
            return Err(BoardError::WrongHeight {
                expected: BOARD_HEIGHT,
                found: rows.len(),
            });
        }
        if let Some((row, cells)) = rows.iter().enumerate().find(|(_, r)| r.len() != BOARD_WIDTH) {
            return Err(BoardError::WrongWidth {
                row,
                expected: BOARD_WIDTH,
                found: cells.len(),
            });
        }
        Ok(Board { rows })
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        BOARD_WIDTH
    }

    /// Owner of the cell, `None` if empty or out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<Player> {
        self.rows.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<Player>]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Number of pieces on the board.
    pub fn piece_count(&self) -> usize {
        self.rows.iter().flatten().filter(|cell| cell.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.piece_count() == 0
    }

    /// The single cell that became occupied since `previous`, if exactly one did.
    pub fn last_drop(&self, previous: &Board) -> Option<(usize, usize)> {
        let mut found = None;
        for (r, row) in self.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if cell.is_some() && previous.get(r, c).is_none() {
                    if found.is_some() {
                        return None;
                    }
                    found = Some((r, c));
                }
            }
        }
        found
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::empty()
    }
}

impl TryFrom<Rows> for Board {
    type Error = BoardError;

    fn try_from(rows: Rows) -> Result<Self, Self::Error> {
        Board::from_rows(rows)
    }
}

impl From<Board> for Rows {
    fn from(board: Board) -> Rows {
        board.rows
    }
}

/// Where a game stands, derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    InProgress { to_move: Player },
    Won(Player),
    Draw,
    /// Finished without a reported winner.
    Over,
}

impl GameStatus {
    fn derive(current_player: Player, game_over: bool, winner: Option<Outcome>) -> Self {
        match (game_over, winner) {
            (false, _) => GameStatus::InProgress { to_move: current_player },
            (true, Some(Outcome::Winner(player))) => GameStatus::Won(player),
            (true, Some(Outcome::Draw)) => GameStatus::Draw,
            (true, None) => GameStatus::Over,
        }
    }
}

/// Authoritative game state as relayed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub board: Board,
    pub current_player: Player,
    pub game_over: bool,
    #[serde(default)]
    pub winner: Option<Outcome>,
}

impl GameState {
    /// State of a freshly created game.
    pub fn initial() -> Self {
        Self {
            board: Board::empty(),
            current_player: Player::One,
            game_over: false,
            winner: None,
        }
    }

    pub fn is_initial(&self) -> bool {
        *self == GameState::initial()
    }

    pub fn status(&self) -> GameStatus {
        GameStatus::derive(self.current_player, self.game_over, self.winner)
    }
}

impl Default for GameState {
    fn default() -> Self {
        GameState::initial()
    }
}

/// A game and its latest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub state: GameState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Game {
    pub fn new(id: GameId, state: GameState) -> Self {
        Self {
            id,
            state,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Server answer to a move submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResult {
    #[serde(flatten)]
    pub game: Game,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Present when the move was rejected; the board was not changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MoveResult {
    pub fn accepted(game: Game, message: impl Into<String>) -> Self {
        Self {
            game,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn rejected(game: Game, error: impl Into<String>) -> Self {
        Self {
            game,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Split into the new snapshot or the rejection text.
    pub fn into_result(self) -> Result<Game, String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.game),
        }
    }
}

/// Status fields of a listed game; any board sent along is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryState {
    pub current_player: Player,
    pub game_over: bool,
    #[serde(default)]
    pub winner: Option<Outcome>,
}

/// Entry of the game history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: GameId,
    pub state: SummaryState,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl GameSummary {
    pub fn status(&self) -> GameStatus {
        GameStatus::derive(self.state.current_player, self.state.game_over, self.state.winner)
    }

    /// Short status used in the history table.
    pub fn status_label(&self) -> String {
        match self.status() {
            GameStatus::InProgress { to_move } => format!("Player {}'s turn", to_move.number()),
            GameStatus::Won(player) => format!("Player {} won", player.number()),
            GameStatus::Draw => "Draw".to_string(),
            GameStatus::Over => "Finished".to_string(),
        }
    }

    /// Label of the action offered for this entry.
    pub fn action_label(&self) -> &'static str {
        if self.state.game_over {
            "View"
        } else {
            "Continue"
        }
    }
}

impl From<&Game> for GameSummary {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id,
            state: SummaryState {
                current_player: game.state.current_player,
                game_over: game.state.game_over,
                winner: game.state.winner,
            },
            created_at: game.created_at.clone(),
            updated_at: game.updated_at.clone(),
        }
    }
}
