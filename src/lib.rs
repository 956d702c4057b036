//! A move-selection engine for the board game 'Connect 4'
//!
//! The engine picks a column at one of three strength tiers. The hardest tier
//! takes immediate wins and blocks, and otherwise runs a depth-limited minimax
//! search with alpha-beta pruning on every legal column in parallel. Leaf
//! positions are scored by a window-based heuristic, optionally blended with a
//! lookup table of precomputed moves.
//!
//! # Basic Usage
//!
//! ```
//! use connect4_ai::{get_move, Board, Difficulty, Player};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//!# use std::error::Error;
//!# fn main() -> Result<(), Box<dyn Error>> {
//! // player one has three in the bottom row
//! let board = Board::from_moves("152535")?;
//! let mut rng = StdRng::seed_from_u64(7);
//!
//! let column = get_move(&board, Player::One, Difficulty::Hard, 4, None, &mut rng);
//! assert_eq!(column, 3);
//!# Ok(())
//!# }
//! ```

use static_assertions::*;
pub use anyhow;

pub mod board;

pub mod outcome;

pub mod evaluation;

pub mod search;

pub mod dispatch;

pub mod lookup_table;

pub mod config;

pub mod engine;

mod test;

pub use board::{apply_move, is_legal, Board, BoardError, Cell, Player};
pub use config::{Difficulty, EngineConfig};
pub use engine::{get_move, Decision, DecisionKind, Engine};
pub use evaluation::evaluate;
pub use lookup_table::LookupTable;
pub use outcome::{check_win, is_terminal};
pub use search::minimax;

/// The width of the game board in tiles
pub const WIDTH: usize = 7;

/// The height of the game board in tiles
pub const HEIGHT: usize = 6;

// the lookup table key packs two bits per tile and one per column into a u128
const_assert!(WIDTH + 2 * WIDTH * HEIGHT <= 128);
// the centre-out move order assumes a middle column
const_assert!(WIDTH % 2 == 1);
