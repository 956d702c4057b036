//! A precomputed table of recommended moves, blended into leaf scores
//!
//! The table is built offline by [`LookupTable::generate`], which labels every
//! position reachable within a few plies with the hard tier's chosen move.
//! Positions and their mirror images share one entry.

use anyhow::{anyhow, Context, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use indicatif::*;
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use std::collections::HashSet;
use std::convert::TryFrom;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::board::{Board, Cell, Player};
use crate::config::Difficulty;
use crate::engine::{choose, Policy};
use crate::evaluation::EvalWeights;
use crate::outcome::{check_win, is_terminal, is_winning_move, WINDOWS};
use crate::WIDTH;

pub const TABLE_MAGIC: [u8; 4] = *b"C4LT";
pub const TABLE_VERSION: u16 = 1;

/// Bound on the magnitude of [`move_quality`]
pub const MAX_QUALITY: i64 = 1_000;

/// Relative weights of the heuristic and table scores at a leaf
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlendWeights {
    pub heuristic: u32,
    pub table: u32,
}

impl BlendWeights {
    /// The weighted mean of the two scores, rounded towards zero
    pub fn mix(&self, heuristic: i64, table: i64) -> i64 {
        let (weight_h, weight_t) = (self.heuristic as i128, self.table as i128);
        let total = weight_h + weight_t;
        if total == 0 {
            return heuristic;
        }
        // a weighted mean lies between its inputs, so it fits back in an i64
        ((heuristic as i128 * weight_h + table as i128 * weight_t) / total) as i64
    }
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            heuristic: 70,
            table: 30,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Entry {
    code: u128,
    player: Player,
    column: u8,
}

impl Entry {
    fn key(&self) -> (u128, u8) {
        (self.code, self.player.number())
    }
}

#[derive(Clone)]
pub struct LookupTable(Arc<LookupTableStorage>);

impl LookupTable {
    /// Builds a table from `(board, player to move, recommended column)` records
    ///
    /// Later records for an already known position are ignored.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (Board, Player, usize)>,
    {
        let mut entries: Vec<Entry> = records
            .into_iter()
            .filter(|&(_, _, column)| column < WIDTH)
            .map(|(board, player, column)| {
                let (code, mirrored) = board.canonical_code();
                let column = if mirrored { WIDTH - 1 - column } else { column };
                Entry {
                    code,
                    player,
                    column: column as u8,
                }
            })
            .collect();
        // stable, so the first record of each position survives the dedup
        entries.sort_by_key(Entry::key);
        entries.dedup_by_key(|entry| entry.key());

        Self(Arc::new(LookupTableStorage { entries }))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open lookup table {}", path.display()))?;
        Self::read_from(BufReader::new(file))
            .with_context(|| format!("failed to read lookup table {}", path.display()))
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0; 4];
        reader.read_exact(&mut magic)?;
        if magic != TABLE_MAGIC {
            return Err(anyhow!("not a lookup table file"));
        }
        let version = reader.read_u16::<BigEndian>()?;
        if version != TABLE_VERSION {
            return Err(anyhow!("unsupported lookup table version {}", version));
        }

        let count = reader.read_u32::<BigEndian>()? as usize;
        let mut entries: Vec<Entry> = Vec::with_capacity(count.min(1 << 20));
        for i in 0..count {
            let code = reader.read_u128::<BigEndian>()?;
            let player = reader.read_u8()?;
            let player = Player::try_from(player)
                .map_err(|value| anyhow!("invalid player {} in record {}", value, i))?;
            let column = reader.read_u8()?;
            if column as usize >= WIDTH {
                return Err(anyhow!("invalid column {} in record {}", column, i));
            }

            let entry = Entry {
                code,
                player,
                column,
            };
            // records must be sorted so lookups can binary search
            if let Some(last) = entries.last() {
                if last.key() >= entry.key() {
                    return Err(anyhow!("record {} is out of order or duplicated", i));
                }
            }
            entries.push(entry);
        }

        Ok(Self(Arc::new(LookupTableStorage { entries })))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to create lookup table {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&TABLE_MAGIC)?;
        writer.write_u16::<BigEndian>(TABLE_VERSION)?;
        let count = u32::try_from(self.entries.len())
            .map_err(|_| anyhow!("too many lookup table entries"))?;
        writer.write_u32::<BigEndian>(count)?;

        for entry in self.entries.iter() {
            writer.write_u128::<BigEndian>(entry.code)?;
            writer.write_u8(entry.player.number())?;
            writer.write_u8(entry.column)?;
        }
        Ok(())
    }

    /// Labels every unfinished position within `max_plies` of the empty board
    ///
    /// Each position is searched by the hard tier at `search_depth`, in parallel
    /// on rayon's global pool, with a progress bar on stderr.
    pub fn generate(max_plies: usize, search_depth: u32) -> Result<Self> {
        if search_depth == 0 {
            return Err(anyhow!("search depth must be at least 1"));
        }
        let start = Instant::now();

        let positions = enumerate_positions(max_plies);
        info!(
            "Found {} unique positions within {} plies in {:.1}s",
            positions.len(),
            max_plies,
            start.elapsed().as_secs_f64()
        );

        let progress = ProgressBar::new(positions.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("Labelling positions: {bar:40.cyan/blue} {pos}/{len} ~{eta} remaining")
                .progress_chars("█▓▒░  "),
        );

        let policy = Policy {
            weights: EvalWeights::DEFAULT,
            overlay: None,
            branch_timeout: None,
            move_deadline: None,
        };
        let records: Vec<(Board, Player, usize)> = positions
            .par_iter()
            .enumerate()
            .map(|(i, &board)| {
                let player = board.player_to_move();
                // the hard tier only draws from the rng on fallback paths
                let mut rng = StdRng::seed_from_u64(i as u64);
                let decision = choose(
                    &board,
                    player,
                    Difficulty::Hard,
                    search_depth,
                    &policy,
                    None,
                    &mut rng,
                );
                progress.inc(1);
                (board, player, decision.column)
            })
            .collect();
        progress.finish();

        let table = Self::from_records(records);
        info!(
            "Lookup table generation completed in {}",
            HumanDuration(start.elapsed())
        );
        Ok(table)
    }
}

impl std::ops::Deref for LookupTable {
    type Target = LookupTableStorage;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct LookupTableStorage {
    entries: Vec<Entry>,
}

impl LookupTableStorage {
    /// The recommended column for `player` to move in `board`
    pub fn get(&self, board: &Board, player: Player) -> Option<usize> {
        let (code, mirrored) = board.canonical_code();
        let key = (code, player.number());

        self.entries
            .binary_search_by(|entry| entry.key().cmp(&key))
            .ok()
            .map(|i| {
                let column = self.entries[i].column as usize;
                if mirrored {
                    WIDTH - 1 - column
                } else {
                    column
                }
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every unfinished position reachable within `max_plies`, one per mirror pair
fn enumerate_positions(max_plies: usize) -> Vec<Board> {
    let mut seen = HashSet::new();
    let mut positions = Vec::new();
    let mut frontier = vec![Board::new()];

    for ply in 0..=max_plies {
        let mut next_frontier = Vec::new();
        for board in frontier {
            if is_terminal(&board) || !seen.insert(board.canonical_code().0) {
                continue;
            }
            positions.push(board);

            if ply < max_plies {
                let player = board.player_to_move();
                for column in board.legal_moves() {
                    if let Ok(next) = board.apply_move(column, player) {
                        next_frontier.push(next);
                    }
                }
            }
        }
        frontier = next_frontier;
    }
    positions
}

/// How good a move is, bounded to `±MAX_QUALITY`
///
/// Illegal moves score the minimum and immediate wins the maximum. Moves that
/// take a square the opponent needed to win score half the maximum, and moves
/// into the three central columns a tenth of it. Anything else scores by the
/// open threes and twos it leaves for `player`.
pub fn move_quality(board: &Board, column: usize, player: Player) -> i64 {
    let next = match board.apply_move(column, player) {
        Ok(next) => next,
        Err(_) => return -MAX_QUALITY,
    };
    if check_win(&next, player) {
        return MAX_QUALITY;
    }
    if is_winning_move(board, column, player.other()) {
        return MAX_QUALITY / 2;
    }
    if (WIDTH / 2 - 1..=WIDTH / 2 + 1).contains(&column) {
        return MAX_QUALITY / 10;
    }

    let piece = Cell::Piece(player);
    let mut score = 0;
    for window in WINDOWS.iter() {
        let own = window.iter().filter(|&&i| next.cell_at(i) == piece).count();
        let empty = window.iter().filter(|&&i| next.cell_at(i).is_empty()).count();
        score += match (own, empty) {
            (3, 1) => 50,
            (2, 2) => 10,
            _ => 0,
        };
    }
    score.min(MAX_QUALITY)
}
