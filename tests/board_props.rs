use connect_four_client::{Board, BoardError, GameState, Player, BOARD_HEIGHT, BOARD_WIDTH};
use proptest::prelude::*;
use serde_json::json;

fn cell() -> impl Strategy<Value = Option<u8>> {
    prop_oneof![Just(None), Just(Some(1u8)), Just(Some(2u8))]
}

fn wire_rows(height: usize, width: usize) -> impl Strategy<Value = Vec<Vec<Option<u8>>>> {
    prop::collection::vec(prop::collection::vec(cell(), width), height)
}

fn state_json(rows: &[Vec<Option<u8>>]) -> serde_json::Value {
    json!({"board": rows, "current_player": 1, "game_over": false, "winner": null})
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn well_shaped_boards_decode_cell_for_cell(rows in wire_rows(BOARD_HEIGHT, BOARD_WIDTH)) {
        let state: GameState = serde_json::from_value(state_json(&rows)).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let expected = value.map(|v| Player::try_from(v).unwrap());
                prop_assert_eq!(state.board.get(r, c), expected);
            }
        }
        prop_assert_eq!(serde_json::to_value(&state.board).unwrap(), json!(rows));
    }

    #[test]
    fn wrong_height_is_rejected(height in 1usize..12) {
        prop_assume!(height != BOARD_HEIGHT);
        let rows = vec![vec![None; BOARD_WIDTH]; height];
        prop_assert_eq!(
            Board::from_rows(rows),
            Err(BoardError::WrongHeight { expected: BOARD_HEIGHT, found: height })
        );
    }

    #[test]
    fn ragged_rows_are_rejected(row in 0..BOARD_HEIGHT, width in 0usize..12) {
        prop_assume!(width != BOARD_WIDTH);
        let mut rows = vec![vec![None; BOARD_WIDTH]; BOARD_HEIGHT];
        rows[row] = vec![None; width];
        prop_assert_eq!(
            Board::from_rows(rows),
            Err(BoardError::WrongWidth { row, expected: BOARD_WIDTH, found: width })
        );
    }

    #[test]
    fn foreign_cell_values_are_rejected(
        r in 0..BOARD_HEIGHT,
        c in 0..BOARD_WIDTH,
        value in prop_oneof![Just(0u8), 3u8..=255],
    ) {
        let mut rows = vec![vec![None; BOARD_WIDTH]; BOARD_HEIGHT];
        rows[r][c] = Some(value);
        prop_assert!(serde_json::from_value::<GameState>(state_json(&rows)).is_err());
    }

    #[test]
    fn last_drop_finds_the_new_piece(rows in wire_rows(BOARD_HEIGHT, BOARD_WIDTH), r in 0..BOARD_HEIGHT, c in 0..BOARD_WIDTH) {
        let mut before = rows.clone();
        before[r][c] = None;
        let mut after = rows;
        after[r][c] = Some(2);
        let before: GameState = serde_json::from_value(state_json(&before)).unwrap();
        let after: GameState = serde_json::from_value(state_json(&after)).unwrap();
        prop_assert_eq!(after.board.last_drop(&before.board), Some((r, c)));
    }
}
