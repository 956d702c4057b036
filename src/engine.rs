//! Move selection for each difficulty tier

use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;

use std::time::{Duration, Instant};

use crate::board::{Board, Player};
use crate::config::{ConfigError, Difficulty, EngineConfig};
use crate::dispatch::{evaluate_branches, select_best, Limits};
use crate::evaluation::EvalWeights;
use crate::lookup_table::{BlendWeights, LookupTable};
use crate::outcome::winning_columns;
use crate::search::Overlay;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// How a move was chosen
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecisionKind {
    /// Sampled uniformly from the legal columns
    Random,
    /// Wins the game immediately
    Win,
    /// Takes the square the opponent needed to win
    Block,
    /// Highest minimax score among the searched columns
    Search { score: i64 },
    /// Substituted after the intended strategy failed
    Fallback,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub column: usize,
    pub kind: DecisionKind,
}

/// Settings shared by every move decision
pub(crate) struct Policy<'a> {
    pub(crate) weights: EvalWeights,
    pub(crate) overlay: Option<Overlay<'a>>,
    pub(crate) branch_timeout: Option<Duration>,
    pub(crate) move_deadline: Option<Duration>,
}

/// A move-selection engine with its own worker pool and optional lookup table
///
/// The engine keeps no state between moves: every call to [`Engine::get_move`]
/// depends only on its arguments, the configuration and the table.
///
/// ```
/// use connect4_ai::{Board, Player, engine::Engine, config::EngineConfig};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let engine = Engine::new(EngineConfig { search_depth: Some(4), ..Default::default() }).unwrap();
/// let mut rng = StdRng::seed_from_u64(0);
/// assert_eq!(engine.get_move(&Board::new(), Player::One, &mut rng), 3);
/// ```
pub struct Engine {
    config: EngineConfig,
    table: Option<LookupTable>,
    pool: ThreadPool,
}

impl Engine {
    /// Creates an engine, loading the configured lookup table if there is one
    ///
    /// A table that fails to load is reported and the engine carries on with
    /// the heuristic alone.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let table = match &config.lookup_table_path {
            Some(path) => match LookupTable::load(path) {
                Ok(table) => {
                    info!("Loaded lookup table with {} positions", table.len());
                    Some(table)
                }
                Err(err) => {
                    warn!("Could not load lookup table: {:#}. Using heuristic evaluation only.", err);
                    None
                }
            },
            None => None,
        };
        Self::with_table(config, table)
    }

    /// Creates an engine around an already loaded table
    pub fn with_table(config: EngineConfig, table: Option<LookupTable>) -> Result<Self, EngineError> {
        config.validate()?;

        let threads = config.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        });
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("connect4-search-{}", i))
            .build()?;

        Ok(Self {
            config,
            table,
            pool,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn table(&self) -> Option<&LookupTable> {
        self.table.as_ref()
    }

    /// Chooses a column for `player` at the configured difficulty and depth
    pub fn get_move<R: Rng + ?Sized>(&self, board: &Board, player: Player, rng: &mut R) -> usize {
        self.decide(board, player, rng).column
    }

    pub fn decide<R: Rng + ?Sized>(&self, board: &Board, player: Player, rng: &mut R) -> Decision {
        self.decide_with(board, player, self.config.difficulty, self.config.depth(), rng)
    }

    /// Chooses a column with a difficulty and depth other than the configured ones
    pub fn decide_with<R: Rng + ?Sized>(
        &self,
        board: &Board,
        player: Player,
        difficulty: Difficulty,
        depth: u32,
        rng: &mut R,
    ) -> Decision {
        let policy = Policy {
            weights: EvalWeights::DEFAULT,
            overlay: self.overlay(),
            branch_timeout: Some(self.config.branch_timeout()),
            move_deadline: self.config.move_deadline(),
        };
        choose(board, player, difficulty, depth, &policy, Some(&self.pool), rng)
    }

    fn overlay(&self) -> Option<Overlay<'_>> {
        self.table.as_ref().map(|table| Overlay {
            table,
            blend: self.config.blend,
        })
    }
}

/// Chooses a column for `player` on rayon's global pool
///
/// Hard tier branches get the default five second timeout. A lookup table, if
/// given, is blended into leaf scores with the default weights.
pub fn get_move<R: Rng + ?Sized>(
    board: &Board,
    player: Player,
    difficulty: Difficulty,
    depth: u32,
    table: Option<&LookupTable>,
    rng: &mut R,
) -> usize {
    let defaults = EngineConfig::default();
    let policy = Policy {
        weights: EvalWeights::DEFAULT,
        overlay: table.map(|table| Overlay {
            table,
            blend: BlendWeights::default(),
        }),
        branch_timeout: Some(defaults.branch_timeout()),
        move_deadline: None,
    };
    choose(board, player, difficulty, depth, &policy, None, rng).column
}

pub(crate) fn choose<R: Rng + ?Sized>(
    board: &Board,
    player: Player,
    difficulty: Difficulty,
    depth: u32,
    policy: &Policy<'_>,
    pool: Option<&ThreadPool>,
    rng: &mut R,
) -> Decision {
    let start = Instant::now();
    debug!("Current board state (player {} to move):\n{}", player, board);

    let legal = board.legal_moves();
    if legal.is_empty() {
        error!("No legal moves available, falling back to column 0");
        return Decision {
            column: 0,
            kind: DecisionKind::Fallback,
        };
    }

    let decision = match difficulty {
        Difficulty::Easy => immediate_win(board, player).unwrap_or_else(|| random(&legal, rng)),
        Difficulty::Medium => immediate_win(board, player)
            .or_else(|| immediate_block(board, player))
            .unwrap_or_else(|| random(&legal, rng)),
        Difficulty::Hard => match immediate_win(board, player).or_else(|| immediate_block(board, player)) {
            Some(decision) => decision,
            None => {
                let limits = Limits {
                    branch_timeout: policy.branch_timeout,
                    deadline: policy.move_deadline.map(|deadline| start + deadline),
                };
                search(board, player, depth, policy, limits, pool)
                    .unwrap_or_else(|| fallback(&legal, rng))
            }
        },
    };

    // never hand an illegal column upstream
    let decision = if board.is_legal(decision.column) {
        decision
    } else {
        warn!(
            "AI generated invalid move: {}, choosing random valid move instead",
            decision.column
        );
        fallback(&legal, rng)
    };

    info!(
        "{} AI chose column {} ({:?}) in {:.1}ms",
        difficulty,
        decision.column,
        decision.kind,
        start.elapsed().as_secs_f64() * 1000.0
    );
    decision
}

fn immediate_win(board: &Board, player: Player) -> Option<Decision> {
    winning_columns(board, player).first().map(|&column| {
        debug!("Found winning move in column {}", column);
        Decision {
            column,
            kind: DecisionKind::Win,
        }
    })
}

fn immediate_block(board: &Board, player: Player) -> Option<Decision> {
    winning_columns(board, player.other()).first().map(|&column| {
        debug!("Found blocking move in column {}", column);
        Decision {
            column,
            kind: DecisionKind::Block,
        }
    })
}

fn search(
    board: &Board,
    player: Player,
    depth: u32,
    policy: &Policy<'_>,
    limits: Limits,
    pool: Option<&ThreadPool>,
) -> Option<Decision> {
    let results = evaluate_branches(board, player, depth, policy.weights, policy.overlay, limits, pool);

    let mut node_count = 0;
    for result in results.iter() {
        node_count += result.node_count;
        match &result.score {
            Ok(score) => debug!("Column {} evaluated with score {}", result.column, score),
            Err(err) => warn!("Dropping column {} from selection: {}", result.column, err),
        }
    }
    debug!("Searched {} nodes at depth {}", node_count, depth);

    match select_best(&results) {
        Some((column, score)) => Some(Decision {
            column,
            kind: DecisionKind::Search { score },
        }),
        None => {
            warn!("All moves failed evaluation, choosing a random valid move");
            None
        }
    }
}

fn random<R: Rng + ?Sized>(legal: &[usize], rng: &mut R) -> Decision {
    Decision {
        column: legal.choose(rng).copied().unwrap_or(0),
        kind: DecisionKind::Random,
    }
}

fn fallback<R: Rng + ?Sized>(legal: &[usize], rng: &mut R) -> Decision {
    Decision {
        kind: DecisionKind::Fallback,
        ..random(legal, rng)
    }
}
