use crate::Position;

/// Errors raised while building a world or engine from its configuration.
///
/// These are never recovered from internally; the caller has to rebuild with
/// valid parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions must be at least 1x1, got {height}x{width}")]
    InvalidDimensions { height: usize, width: usize },

    #[error("Obstacle ({row}, {col}) is out of bounds for grid {height}x{width}")]
    ObstacleOutOfBounds {
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    },

    #[error("Not enough free cells to place 2 pursuers and 1 target: {free} free, 3 required")]
    InsufficientFreeCells { free: usize },

    #[error("Round limit must be at least 1")]
    InvalidRoundLimit,

    #[error("Map error on line {line}: {reason}")]
    Map { line: usize, reason: String },
}

/// Contract violations by the caller of the turn engine.
///
/// Returned before any state is mutated, so the engine is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("No episode in progress; call reset first")]
    NotStarted,

    #[error("Episode has already ended; call reset to start a new one")]
    EpisodeEnded,

    #[error("Cannot place an entity on {0:?}: cell is out of bounds or blocked")]
    InvalidPlacement(Position),
}
