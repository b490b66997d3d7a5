use serde::{Deserialize, Serialize};

pub mod avoidance;
pub mod engine;
pub mod episode;
pub mod error;
pub mod experiment;
pub mod map;
pub mod pathfinding;
pub mod policy;
pub mod world;

pub use engine::{EngineConfig, EntityState, StepInfo, StepOutcome, Turn, TurnEngine};
pub use error::{ConfigError, EngineError};
pub use world::{Action, GridWorld};

/// Represents a 2D coordinate as (row, col), 0-indexed from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Returns the Manhattan distance between two positions.
    pub fn manhattan(&self, other: &Position) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

/// Identifies one of the two pursuing agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pursuer {
    A,
    B,
}

impl Pursuer {
    /// The pursuer that moves after this one within a round.
    pub fn partner(self) -> Pursuer {
        match self {
            Pursuer::A => Pursuer::B,
            Pursuer::B => Pursuer::A,
        }
    }
}
