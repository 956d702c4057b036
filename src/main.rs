use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;
use rand::{rngs::StdRng, SeedableRng};

use std::path::PathBuf;

use connect4_ai::*;

#[derive(Parser)]
#[clap(name = "connect4", version, about = "Connect 4 move-selection engine")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Choose a move for the player to move in a position
    Move {
        /// Moves played so far as 1-indexed column digits, e.g. 4453
        #[clap(default_value = "")]
        moves: String,

        /// EASY, MEDIUM or HARD
        #[clap(long)]
        difficulty: Option<Difficulty>,

        /// Search depth in plies
        #[clap(long)]
        depth: Option<u32>,

        /// Lookup table to blend into the search
        #[clap(long, parse(from_os_str))]
        table: Option<PathBuf>,

        /// Seed for the random choices of the easier tiers
        #[clap(long)]
        seed: Option<u64>,

        /// JSON engine configuration
        #[clap(long, parse(from_os_str))]
        config: Option<PathBuf>,
    },
    /// Build a lookup table of recommended moves
    Train {
        /// Label every position reachable within this many plies
        #[clap(long, default_value = "8")]
        plies: usize,

        /// Search depth used to label each position, defaults to min(plies, 4)
        #[clap(long)]
        search_depth: Option<u32>,

        #[clap(long, parse(from_os_str), default_value = "lookup_table.bin")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Move {
            moves,
            difficulty,
            depth,
            table,
            seed,
            config,
        } => {
            let mut config = match config {
                Some(path) => EngineConfig::from_json_file(path)?,
                None => EngineConfig::default(),
            };
            if let Some(difficulty) = difficulty {
                config.difficulty = difficulty;
            }
            if depth.is_some() {
                config.search_depth = depth;
            }
            if table.is_some() {
                config.lookup_table_path = table;
            }

            let board = Board::from_moves(&moves)?;
            if is_terminal(&board) {
                return Err(anyhow!("the game is already over"));
            }
            let player = board.player_to_move();

            let engine = Engine::new(config)?;
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            println!("{}\n", board);
            let decision = engine.decide(&board, player, &mut rng);
            if let DecisionKind::Search { score } = decision.kind {
                info!("Best move scored {}", score);
            }
            println!("Player {} plays column {}", player, decision.column);
        }
        Command::Train {
            plies,
            search_depth,
            output,
        } => {
            let search_depth = search_depth.unwrap_or_else(|| (plies as u32).clamp(1, 4));
            info!(
                "Training with {} plies, labelling at search depth {}",
                plies, search_depth
            );

            let table = LookupTable::generate(plies, search_depth)?;
            table.save(&output)?;
            info!("Wrote {} positions to {}", table.len(), output.display());
        }
    }
    Ok(())
}
