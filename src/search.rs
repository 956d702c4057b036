//! Depth-limited minimax search with alpha-beta pruning

use thiserror::Error;

use std::time::Instant;

use crate::board::{Board, BoardError, Player};
use crate::evaluation::{evaluate_with, score_bound, EvalWeights};
use crate::lookup_table::{move_quality, BlendWeights, LookupTable};
use crate::outcome::winner;
use crate::WIDTH;

/// Score of a decided game, larger than any heuristic score
pub const WIN_SENTINEL: i64 = 1_000_000_000_000;

/// Bounds of the full search window
pub const INFINITY: i64 = i64::MAX;

// how many nodes are searched between deadline checks
const DEADLINE_CHECK_INTERVAL: usize = 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("search deadline exceeded")]
    Timeout,
    #[error(transparent)]
    InvalidMove(#[from] BoardError),
}

/// Returns the columns ordered from the middle outwards, as
/// the middle columns are often better moves
pub const fn move_order() -> [usize; WIDTH] {
    let mut move_order = [0; WIDTH];
    let mut i = 0;
    while i < WIDTH {
        move_order[i] = (WIDTH / 2) + (i % 2) * (i / 2 + 1) - (1 - i % 2) * (i / 2);
        i += 1;
    }
    move_order
}

/// A lookup table blended into leaf scores
#[derive(Copy, Clone)]
pub struct Overlay<'a> {
    pub table: &'a LookupTable,
    pub blend: BlendWeights,
}

/// A single minimax search measured from the point of view of one player
///
/// # Scoring
/// Finished games score `WIN_SENTINEL` plus the remaining depth when the root
/// player has won, the negation of that when the opponent has won, and 0 for a
/// draw, so that quick wins and slow losses are preferred. Unfinished positions
/// at the depth limit get the heuristic score of [`evaluate_with`], blended with
/// the lookup table's recommendation when the table knows the position.
pub struct Search<'a> {
    root: Player,
    weights: EvalWeights,
    overlay: Option<Overlay<'a>>,
    deadline: Option<Instant>,

    /// The number of nodes searched so far (for diagnostics only)
    pub node_count: usize,
}

impl<'a> Search<'a> {
    pub fn new(root: Player) -> Self {
        Self {
            root,
            weights: EvalWeights::DEFAULT,
            overlay: None,
            deadline: None,
            node_count: 0,
        }
    }

    /// Heuristic weights for leaf positions
    ///
    /// Leaf scores must stay below [`WIN_SENTINEL`] or a decided game could
    /// rank below an unfinished one.
    pub fn with_weights(mut self, weights: EvalWeights) -> Self {
        debug_assert!(score_bound(&weights) < WIN_SENTINEL);
        self.weights = weights;
        self
    }

    pub fn with_overlay(mut self, overlay: Option<Overlay<'a>>) -> Self {
        self.overlay = overlay;
        self
    }

    /// Aborts the search with [`SearchError::Timeout`] once `deadline` passes
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn minimax(
        &mut self,
        board: &Board,
        depth: u32,
        mut alpha: i64,
        mut beta: i64,
        maximizing: bool,
    ) -> Result<i64, SearchError> {
        if let Some(deadline) = self.deadline {
            if self.node_count % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                return Err(SearchError::Timeout);
            }
        }
        self.node_count += 1;

        match winner(board) {
            Some(player) if player == self.root => return Ok(WIN_SENTINEL + depth as i64),
            Some(_) => return Ok(-(WIN_SENTINEL + depth as i64)),
            None => {}
        }
        if board.is_full() {
            return Ok(0);
        }
        if depth == 0 {
            return Ok(self.leaf_score(board));
        }

        let player = if maximizing { self.root } else { self.root.other() };

        if maximizing {
            let mut best = -INFINITY;
            for &column in move_order().iter().filter(|&&c| board.is_legal(c)) {
                let next = board.apply_move(column, player)?;
                let score = self.minimax(&next, depth - 1, alpha, beta, false)?;
                best = best.max(score);
                alpha = alpha.max(best);
                if alpha >= beta {
                    break;
                }
            }
            Ok(best)
        } else {
            let mut best = INFINITY;
            for &column in move_order().iter().filter(|&&c| board.is_legal(c)) {
                let next = board.apply_move(column, player)?;
                let score = self.minimax(&next, depth - 1, alpha, beta, true)?;
                best = best.min(score);
                beta = beta.min(best);
                if alpha >= beta {
                    break;
                }
            }
            Ok(best)
        }
    }

    /// Scores a position at the depth limit
    pub(crate) fn leaf_score(&self, board: &Board) -> i64 {
        let heuristic = evaluate_with(board, self.root, &self.weights);

        match self.overlay {
            Some(overlay) => match overlay.table.get(board, self.root) {
                Some(column) => overlay
                    .blend
                    .mix(heuristic, move_quality(board, column, self.root)),
                None => heuristic,
            },
            None => heuristic,
        }
    }
}

/// Minimax search without a lookup table or deadline
///
/// `maximizing` is true when `root_player` places the next piece.
pub fn minimax(
    board: &Board,
    depth: u32,
    alpha: i64,
    beta: i64,
    maximizing: bool,
    root_player: Player,
) -> i64 {
    // without a deadline the only error is an illegal move, and only legal
    // columns are ever played
    Search::new(root_player)
        .minimax(board, depth, alpha, beta, maximizing)
        .unwrap_or(0)
}
