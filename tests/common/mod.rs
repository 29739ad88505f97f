#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use connect_four_client::{
    ApiError, Board, Game, GameApi, GameId, GameState, GameSummary, MoveResult, Outcome, Player,
    BOARD_HEIGHT, BOARD_WIDTH,
};
use tokio::sync::Notify;

/// In-process stand-in for the game server.
///
/// Applies gravity and alternates turns, nothing more.
#[derive(Default)]
pub struct MockApi {
    games: Mutex<HashMap<GameId, Game>>,
    next_id: AtomicU64,
    pub get_calls: AtomicUsize,
    pub move_calls: AtomicUsize,
    /// Every call fails as if the server were unreachable.
    pub unreachable: AtomicBool,
    /// Every payload fails validation.
    pub malformed: AtomicBool,
    /// `get_game` answers "not found" this many times before looking the game up.
    pub not_found_budget: AtomicUsize,
    /// When set, `get_game` waits for a permit before answering.
    pub gate: Option<Arc<Notify>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Server whose next created game gets `id`.
    pub fn starting_at(id: u64) -> Self {
        let api = Self::default();
        api.next_id.store(id, Ordering::SeqCst);
        api
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn insert(&self, game: Game) {
        self.games.lock().unwrap().insert(game.id, game);
    }

    pub fn stored(&self, id: GameId) -> Option<Game> {
        self.games.lock().unwrap().get(&id).cloned()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn move_calls(&self) -> usize {
        self.move_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ApiError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".into()));
        }
        if self.malformed.load(Ordering::SeqCst) {
            return Err(ApiError::Malformed("Board has 5 rows, expected 6".into()));
        }
        Ok(())
    }
}

/// Board with pieces dropped into `columns`, alternating from player one.
pub fn board_after(columns: &[usize]) -> Board {
    let mut rows = vec![vec![None; BOARD_WIDTH]; BOARD_HEIGHT];
    let mut player = Player::One;
    for &col in columns {
        if let Some(row) = (0..BOARD_HEIGHT).rev().find(|&r| rows[r][col].is_none()) {
            rows[row][col] = Some(player);
            player = player.other();
        }
    }
    Board::from_rows(rows).unwrap()
}

pub fn game_with(id: u64, columns: &[usize]) -> Game {
    let state = GameState {
        board: board_after(columns),
        current_player: if columns.len() % 2 == 0 { Player::One } else { Player::Two },
        game_over: false,
        winner: None,
    };
    Game::new(GameId(id), state)
}

pub fn finished_game(id: u64, winner: Player) -> Game {
    let mut game = game_with(id, &[0, 1, 0, 1, 0, 1, 0]);
    game.state.game_over = true;
    game.state.winner = Some(Outcome::Winner(winner));
    game
}

fn drop_piece(state: &GameState, column: usize) -> Result<GameState, &'static str> {
    if state.game_over {
        return Err("Game is already over");
    }
    if column >= BOARD_WIDTH {
        return Err("Invalid column");
    }
    let mut rows: Vec<Vec<Option<Player>>> = state.board.clone().into();
    let row = (0..BOARD_HEIGHT)
        .rev()
        .find(|&r| rows[r][column].is_none())
        .ok_or("Column is full")?;
    rows[row][column] = Some(state.current_player);
    Ok(GameState {
        board: Board::from_rows(rows).unwrap(),
        current_player: state.current_player.other(),
        game_over: false,
        winner: None,
    })
}

#[async_trait::async_trait]
impl GameApi for MockApi {
    async fn get_game(&self, id: GameId) -> Result<Game, ApiError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.check()?;
        let budget = self.not_found_budget.load(Ordering::SeqCst);
        if budget > 0 {
            self.not_found_budget.store(budget - 1, Ordering::SeqCst);
            return Err(ApiError::NotFound("Game not found".into()));
        }
        self.stored(id)
            .ok_or_else(|| ApiError::NotFound("Game not found".into()))
    }

    async fn create_game(&self) -> Result<Game, ApiError> {
        self.check()?;
        let id = GameId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let game = Game::new(id, GameState::initial());
        self.insert(game.clone());
        Ok(game)
    }

    async fn make_move(&self, id: GameId, column: usize) -> Result<MoveResult, ApiError> {
        self.move_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let game = self
            .stored(id)
            .ok_or_else(|| ApiError::NotFound("Game not found".into()))?;
        match drop_piece(&game.state, column) {
            Ok(state) => {
                let updated = Game::new(id, state);
                self.insert(updated.clone());
                Ok(MoveResult::accepted(updated, "Move successful"))
            }
            Err(reason) => Ok(MoveResult::rejected(game, reason)),
        }
    }

    async fn list_games(&self) -> Result<Vec<GameSummary>, ApiError> {
        self.check()?;
        let mut games: Vec<GameSummary> =
            self.games.lock().unwrap().values().map(GameSummary::from).collect();
        games.sort_by_key(|g| std::cmp::Reverse(g.id));
        Ok(games)
    }
}
