//! Detection of wins and finished games

use crate::board::{Board, Cell, Player};
use crate::{HEIGHT, WIDTH};

/// The number of length-4 alignments on the board
pub const NUM_WINDOWS: usize =
    (WIDTH - 3) * HEIGHT + WIDTH * (HEIGHT - 3) + 2 * (WIDTH - 3) * (HEIGHT - 3);

/// Every length-4 alignment as storage indices (left-to-right, bottom-to-top)
pub const WINDOWS: [[usize; 4]; NUM_WINDOWS] = windows();

const fn windows() -> [[usize; 4]; NUM_WINDOWS] {
    let mut windows = [[0; 4]; NUM_WINDOWS];
    let mut n = 0;

    // horizontal
    let mut row = 0;
    while row < HEIGHT {
        let mut column = 0;
        while column + 3 < WIDTH {
            let start = column + WIDTH * row;
            windows[n] = [start, start + 1, start + 2, start + 3];
            n += 1;
            column += 1;
        }
        row += 1;
    }

    // vertical
    let mut column = 0;
    while column < WIDTH {
        let mut row = 0;
        while row + 3 < HEIGHT {
            let start = column + WIDTH * row;
            windows[n] = [start, start + WIDTH, start + 2 * WIDTH, start + 3 * WIDTH];
            n += 1;
            row += 1;
        }
        column += 1;
    }

    // diagonal /
    let mut row = 0;
    while row + 3 < HEIGHT {
        let mut column = 0;
        while column + 3 < WIDTH {
            let start = column + WIDTH * row;
            let step = WIDTH + 1;
            windows[n] = [start, start + step, start + 2 * step, start + 3 * step];
            n += 1;
            column += 1;
        }
        row += 1;
    }

    // diagonal \
    let mut row = 3;
    while row < HEIGHT {
        let mut column = 0;
        while column + 3 < WIDTH {
            let start = column + WIDTH * row;
            let step = WIDTH - 1;
            windows[n] = [start, start - step, start - 2 * step, start - 3 * step];
            n += 1;
            column += 1;
        }
        row += 1;
    }

    windows
}

/// Returns true if `player` has four pieces in a row anywhere on the board
pub fn check_win(board: &Board, player: Player) -> bool {
    let piece = Cell::Piece(player);
    WINDOWS
        .iter()
        .any(|window| window.iter().all(|&i| board.cell_at(i) == piece))
}

/// Returns true if either player has won or the board is full
pub fn is_terminal(board: &Board) -> bool {
    board.is_full() || check_win(board, Player::One) || check_win(board, Player::Two)
}

/// The winner of the position, if any
pub fn winner(board: &Board) -> Option<Player> {
    if check_win(board, Player::One) {
        Some(Player::One)
    } else if check_win(board, Player::Two) {
        Some(Player::Two)
    } else {
        None
    }
}

/// Returns true if dropping `player`'s piece into `column` wins the game
pub fn is_winning_move(board: &Board, column: usize, player: Player) -> bool {
    match board.apply_move(column, player) {
        Ok(next) => check_win(&next, player),
        Err(_) => false,
    }
}

/// The legal columns, in ascending order, where `player` wins immediately
pub fn winning_columns(board: &Board, player: Player) -> Vec<usize> {
    (0..WIDTH)
        .filter(|&column| is_winning_move(board, column, player))
        .collect()
}
