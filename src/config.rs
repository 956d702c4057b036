//! Engine configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::lookup_table::BlendWeights;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown difficulty '{0}', expected EASY, MEDIUM or HARD")]
    UnknownDifficulty(String),
    #[error("search depth must be at least 1 for the hard tier")]
    InvalidDepth,
    #[error("the worker pool needs at least one thread")]
    InvalidThreads,
    #[error("blend weights must not both be zero")]
    InvalidBlend,
}

/// The strength tier of the engine
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    /// Takes an immediate win, otherwise plays at random
    ///
    /// Every tier takes a win that is on the board, so this tier is random
    /// only when no single move ends the game. It never blocks.
    Easy,
    /// Takes an immediate win or blocks the opponent's, otherwise plays at random
    Medium,
    /// Wins or blocks immediately, otherwise searches every column
    Hard,
}

impl Difficulty {
    pub fn default_depth(self) -> u32 {
        match self {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 6,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Hard
    }
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EASY" => Ok(Difficulty::Easy),
            "MEDIUM" => Ok(Difficulty::Medium),
            "HARD" => Ok(Difficulty::Hard),
            _ => Err(ConfigError::UnknownDifficulty(s.to_string())),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        };
        write!(f, "{}", name)
    }
}

fn default_branch_timeout_ms() -> u64 {
    5_000
}

/// Options for an [`Engine`](crate::engine::Engine)
///
/// Every field has a default, so a JSON file only needs the options it changes:
///
/// ```
/// use connect4_ai::config::{Difficulty, EngineConfig};
///
/// let config = EngineConfig::from_json_str(r#"{ "difficulty": "MEDIUM" }"#).unwrap();
/// assert_eq!(config.difficulty, Difficulty::Medium);
/// assert_eq!(config.depth(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub difficulty: Difficulty,

    /// Search depth in plies, the tier's default when unset
    #[serde(default)]
    pub search_depth: Option<u32>,

    /// Lookup table to blend into leaf scores
    #[serde(default)]
    pub lookup_table_path: Option<PathBuf>,

    /// Worker threads for the hard tier, all available cores when unset
    #[serde(default)]
    pub threads: Option<usize>,

    /// Time allowed for each top-level branch of the hard tier
    #[serde(default = "default_branch_timeout_ms")]
    pub branch_timeout_ms: u64,

    /// Time allowed for a whole move
    #[serde(default)]
    pub move_deadline_ms: Option<u64>,

    #[serde(default)]
    pub blend: BlendWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            search_depth: None,
            lookup_table_path: None,
            threads: None,
            branch_timeout_ms: default_branch_timeout_ms(),
            move_deadline_ms: None,
            blend: BlendWeights::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty == Difficulty::Hard && self.depth() == 0 {
            return Err(ConfigError::InvalidDepth);
        }
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidThreads);
        }
        if self.blend.heuristic == 0 && self.blend.table == 0 {
            return Err(ConfigError::InvalidBlend);
        }
        Ok(())
    }

    /// The configured search depth, or the tier's default
    pub fn depth(&self) -> u32 {
        self.search_depth
            .unwrap_or_else(|| self.difficulty.default_depth())
    }

    pub fn branch_timeout(&self) -> Duration {
        Duration::from_millis(self.branch_timeout_ms)
    }

    pub fn move_deadline(&self) -> Option<Duration> {
        self.move_deadline_ms.map(Duration::from_millis)
    }
}
