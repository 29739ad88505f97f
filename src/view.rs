//! Text rendering of a session for terminal front-ends.
//!
//! Every function builds a `String`; printing is left to the caller.

use core::fmt::Write;

use crate::config::BOARD_WIDTH;
use crate::domain::{Board, GameState, GameStatus, GameSummary};
use crate::session::SessionState;

/// Board with a column header, `.` for empty cells and the player symbols.
/// The `highlight` cell, if any, is drawn in brackets.
pub fn render_board(board: &Board, highlight: Option<(usize, usize)>) -> String {
    let mut out = String::new();
    for c in 0..board.width() {
        let _ = write!(out, " {} ", c);
    }
    out.push('\n');
    for (r, row) in board.rows().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let ch = cell.map_or('.', |p| p.symbol());
            if highlight == Some((r, c)) {
                let _ = write!(out, "[{}]", ch);
            } else {
                let _ = write!(out, " {} ", ch);
            }
        }
        out.push('\n');
    }
    out
}

pub fn render_status(state: &GameState) -> String {
    match state.status() {
        GameStatus::InProgress { to_move } => format!("Player {}'s turn", to_move.number()),
        GameStatus::Won(player) => format!("Player {} wins!", player.number()),
        GameStatus::Draw => "Game ended in a draw!".to_string(),
        GameStatus::Over => "Game over".to_string(),
    }
}

/// Full screen for one session: banners, error with recovery hints, board, status.
pub fn render_session(state: &SessionState, highlight: Option<(usize, usize)>) -> String {
    let mut out = String::new();
    if state.loading {
        out.push_str("Loading game...\n");
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "Error: {}", error);
        out.push_str("  [l] Back to home   [n] Start new game\n");
    }
    let Some(game) = &state.game else {
        if state.error.is_none() && !state.loading {
            out.push_str("No game data available\n");
        }
        return out;
    };
    let _ = writeln!(out, "Game #{}", game.id);
    if state.connected {
        out.push_str("Connected to game server\n");
    } else {
        out.push_str("Disconnected from game server\n");
    }
    out.push('\n');
    out.push_str(&render_board(&game.state.board, highlight));
    out.push('\n');
    out.push_str(&render_status(&game.state));
    out.push('\n');
    out
}

/// Table of past games, newest first as the server orders them.
pub fn render_history(games: &[GameSummary]) -> String {
    if games.is_empty() {
        return "No games played yet\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6}  {:<16}  {:<20}  {:<20}  {}",
        "ID", "Status", "Created", "Last updated", "Action"
    );
    for game in games {
        let _ = writeln!(
            out,
            "{:>6}  {:<16}  {:<20}  {:<20}  {}",
            game.id,
            game.status_label(),
            game.created_at.as_deref().unwrap_or("-"),
            game.updated_at.as_deref().unwrap_or("-"),
            game.action_label()
        );
    }
    out
}

/// One line of player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Drop(usize),
    NewGame,
    Refresh,
    List,
    Quit,
}

impl Command {
    pub fn parse(input: &str) -> Option<Command> {
        match input.trim().to_ascii_lowercase().as_str() {
            "n" | "new" => Some(Command::NewGame),
            "r" | "refresh" => Some(Command::Refresh),
            "l" | "list" => Some(Command::List),
            "q" | "quit" | "exit" => Some(Command::Quit),
            other => other.parse().ok().map(Command::Drop),
        }
    }
}

/// Decide whether a column selection may be sent to the server.
///
/// This is the only place the client looks at `game_over`.
pub fn validate_column(state: &SessionState, column: usize) -> Result<usize, String> {
    let game = state.game.as_ref().ok_or_else(|| "No game loaded".to_string())?;
    if game.state.game_over {
        return Err("Game is already over".to_string());
    }
    if column >= BOARD_WIDTH {
        return Err(format!("Column must be between 0 and {}", BOARD_WIDTH - 1));
    }
    Ok(column)
}
