//! Heuristic scoring of non-terminal positions

use crate::board::{Board, Cell, Player};
use crate::outcome::WINDOWS;
use crate::{HEIGHT, WIDTH};

/// Weights used by [`evaluate_with`]
///
/// Threats from the opponent weigh far more than building one's own, so a
/// search using these weights will block an open three before extending.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EvalWeights {
    /// Four of the evaluated player's pieces
    pub win: i64,
    /// Three pieces and one empty cell
    pub three: i64,
    /// Two pieces and two empty cells
    pub two: i64,
    /// Three opponent pieces and one empty cell, subtracted
    pub opponent_three: i64,
    /// Bonus per occupied cell in each column
    pub column_bonus: [i64; WIDTH],
}

impl EvalWeights {
    pub const DEFAULT: Self = Self {
        win: 1_000_000,
        three: 1_000,
        two: 100,
        opponent_three: 500_000,
        column_bonus: [0, 0, 50, 100, 50, 0, 0],
    };
}

impl Default for EvalWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Scores `board` from the point of view of `player` with the default weights
pub fn evaluate(board: &Board, player: Player) -> i64 {
    evaluate_with(board, player, &EvalWeights::DEFAULT)
}

pub fn evaluate_with(board: &Board, player: Player, weights: &EvalWeights) -> i64 {
    let mine = Cell::Piece(player);
    let theirs = Cell::Piece(player.other());

    let mut score = 0;
    for window in WINDOWS.iter() {
        let (mut own, mut opponent, mut empty) = (0, 0, 0);
        for &i in window.iter() {
            match board.cell_at(i) {
                cell if cell == mine => own += 1,
                cell if cell == theirs => opponent += 1,
                _ => empty += 1,
            }
        }
        score += match (own, opponent, empty) {
            (4, _, _) => weights.win,
            (3, _, 1) => weights.three,
            (2, _, 2) => weights.two,
            (_, 4, _) => -weights.win,
            (_, 3, 1) => -weights.opponent_three,
            _ => 0,
        };
    }

    // flat bonus for holding the central columns
    let heights = board.heights();
    for (column, &bonus) in weights.column_bonus.iter().enumerate() {
        if bonus == 0 {
            continue;
        }
        for row in 0..heights[column] {
            match board.cell_at(column + WIDTH * row) {
                cell if cell == mine => score += bonus,
                cell if cell == theirs => score -= bonus,
                _ => {}
            }
        }
    }

    score
}

/// The largest magnitude [`evaluate_with`] can return for `weights`
pub fn score_bound(weights: &EvalWeights) -> i64 {
    let per_window = weights
        .win
        .max(weights.opponent_three)
        .max(weights.three)
        .max(weights.two);
    let per_cell: i64 = weights.column_bonus.iter().map(|b| b.abs()).sum();
    per_window * WINDOWS.len() as i64 + per_cell * HEIGHT as i64
}
