//! Parallel evaluation of the top-level moves of a position

use log::debug;
use rayon::prelude::*;
use rayon::ThreadPool;

use std::time::{Duration, Instant};

use crate::board::{Board, Player};
use crate::evaluation::EvalWeights;
use crate::search::{Overlay, Search, SearchError, INFINITY};

/// Time limits for one round of branch evaluations
#[derive(Copy, Clone, Debug, Default)]
pub struct Limits {
    /// Allowed time for each branch, counted from when the branch starts
    pub branch_timeout: Option<Duration>,
    /// Point in time by which every branch must finish
    pub deadline: Option<Instant>,
}

impl Limits {
    fn branch_deadline(&self, start: Instant) -> Option<Instant> {
        let timeout = self.branch_timeout.map(|timeout| start + timeout);
        match (timeout, self.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// The outcome of searching one top-level column
#[derive(Clone, Debug)]
pub struct BranchResult {
    pub column: usize,
    pub score: Result<i64, SearchError>,
    pub node_count: usize,
}

/// Searches every legal column of `board` for `player`, one task per column
///
/// Each task plays its column and runs a full-window minimax to `depth - 1`
/// with the opponent to move. The tasks run on `pool`, or on rayon's global
/// pool when none is given, and all of them have finished when this returns.
/// Results are in ascending column order.
pub fn evaluate_branches(
    board: &Board,
    player: Player,
    depth: u32,
    weights: EvalWeights,
    overlay: Option<Overlay<'_>>,
    limits: Limits,
    pool: Option<&ThreadPool>,
) -> Vec<BranchResult> {
    let columns = board.legal_moves();

    let run = || {
        columns
            .par_iter()
            .map(|&column| {
                let start = Instant::now();
                let mut search = Search::new(player)
                    .with_weights(weights)
                    .with_overlay(overlay)
                    .with_deadline(limits.branch_deadline(start));

                let score = board.apply_move(column, player).map_err(SearchError::from).and_then(
                    |next| {
                        search.minimax(&next, depth.saturating_sub(1), -INFINITY, INFINITY, false)
                    },
                );
                debug!(
                    "Column {} searched {} nodes in {:.1}ms",
                    column,
                    search.node_count,
                    start.elapsed().as_secs_f64() * 1000.0
                );

                BranchResult {
                    column,
                    score,
                    node_count: search.node_count,
                }
            })
            .collect::<Vec<_>>()
    };

    match pool {
        Some(pool) => pool.install(run),
        None => run(),
    }
}

/// The column with the highest score among completed branches
///
/// Ties go to the lowest column.
pub fn select_best(results: &[BranchResult]) -> Option<(usize, i64)> {
    let mut best: Option<(usize, i64)> = None;
    for result in results {
        if let Ok(score) = result.score {
            match best {
                Some((column, best_score))
                    if score < best_score || (score == best_score && column < result.column) => {}
                _ => best = Some((result.column, score)),
            }
        }
    }
    best
}
