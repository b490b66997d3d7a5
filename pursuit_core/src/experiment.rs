//! Batches of episodes with summary metrics, plus the built-in grid layouts.

use std::{fmt, str::FromStr};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    Position,
    engine::{EngineConfig, TurnEngine},
    episode::{Episode, EpisodeReport},
    error::{ConfigError, EngineError},
    policy::PolicyKind,
};

/// Errors from running an experiment batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExperimentError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("An experiment needs at least one episode")]
    NoEpisodes,
}

/// Predefined grid layouts of increasing size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridPreset {
    /// 10x10 with a few scattered blocks, 100 rounds.
    Small,
    /// 25x25 with a gapped frame and a central cross, 500 rounds.
    Medium,
    /// 60x60 with long barriers and two walled rooms, 2000 rounds.
    Large,
}

impl GridPreset {
    pub const ALL: [GridPreset; 3] = [GridPreset::Small, GridPreset::Medium, GridPreset::Large];

    pub fn config(self) -> EngineConfig {
        let (size, max_rounds, obstacles) = match self {
            GridPreset::Small => (10, 100, small_walls()),
            GridPreset::Medium => (25, 500, medium_walls()),
            GridPreset::Large => (60, 2000, large_walls()),
        };
        EngineConfig {
            height: size,
            width: size,
            obstacles,
            max_rounds,
        }
    }
}

impl fmt::Display for GridPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridPreset::Small => write!(f, "small"),
            GridPreset::Medium => write!(f, "medium"),
            GridPreset::Large => write!(f, "large"),
        }
    }
}

impl FromStr for GridPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(GridPreset::Small),
            "medium" => Ok(GridPreset::Medium),
            "large" => Ok(GridPreset::Large),
            other => Err(format!(
                "unknown preset '{other}', expected one of: small, medium, large"
            )),
        }
    }
}

fn cells(coords: &[(usize, usize)]) -> impl Iterator<Item = Position> + '_ {
    coords.iter().map(|&(row, col)| Position::new(row, col))
}

fn small_walls() -> Vec<Position> {
    cells(&[
        (2, 2),
        (2, 3),
        (2, 4),
        (3, 2),
        (4, 2),
        (6, 6),
        (6, 7),
        (7, 6),
        (1, 8),
        (2, 8),
        (8, 1),
        (8, 2),
        (5, 5),
    ])
    .collect()
}

fn medium_walls() -> Vec<Position> {
    let mut walls = Vec::new();
    // Frame with a wide gap in the middle of every side.
    for i in (3..22).filter(|i| !(10..=14).contains(i)) {
        walls.extend(cells(&[(3, i), (21, i), (i, 3), (i, 21)]));
    }
    // Cross through the centre, open at (12, 12).
    for i in (7..18).filter(|i| *i != 12) {
        walls.extend(cells(&[(i, 12), (12, i)]));
    }
    for (r, c) in [(7, 7), (16, 16), (7, 16), (16, 7)] {
        walls.extend(cells(&[(r, c), (r, c + 1), (r + 1, c), (r + 1, c + 1)]));
    }
    walls
}

fn large_walls() -> Vec<Position> {
    let mut walls = Vec::new();
    walls.extend((30..55).map(|c| Position::new(3, c)));
    walls.extend((2..9).map(|c| Position::new(7, c)));
    walls.extend((3..7).flat_map(|r| [Position::new(r, 2), Position::new(r, 7)]));
    walls.extend(cells(&[(4, 5), (5, 5)]));

    // Long dividers with a gap around index 27..=32.
    let divider = (10..50).filter(|i| !(27..=32).contains(i));
    walls.extend(divider.flat_map(|i| [Position::new(i, 29), Position::new(29, i)]));

    // Two hollow rooms, each with a single opening.
    for (top, left, opening) in [(10, 40, (12, 40)), (40, 10, (40, 12))] {
        for i in 0..6 {
            walls.extend(cells(&[
                (top + i, left),
                (top + i, left + 5),
                (top, left + i),
                (top + 5, left + i),
            ]));
        }
        let opening = Position::new(opening.0, opening.1);
        walls.retain(|p| *p != opening);
    }

    for (r, c) in [(20, 20), (50, 50)] {
        walls.extend(cells(&[(r, c), (r, c + 1), (r + 1, c), (r + 1, c + 1)]));
    }
    walls.extend(cells(&[(15, 5), (16, 5), (17, 5), (15, 6)]));
    walls.extend(cells(&[(5, 45), (5, 46), (5, 47), (6, 47)]));
    walls.extend((50..55).map(|i| Position::new(i, i)));
    walls
}

/// Parameters for a batch of episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub engine: EngineConfig,
    /// Policy used by both pursuers.
    pub policy: PolicyKind,
    pub episodes: u32,
    /// Master seed; every episode derives its own seeds from it.
    pub seed: u64,
}

/// Aggregate metrics over a batch of episodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub episodes: usize,
    pub avg_reward_a: f64,
    pub avg_reward_b: f64,
    /// Mean number of completed rounds.
    pub avg_rounds: f64,
    pub captures: usize,
    pub capture_rate: f64,
}

impl ExperimentSummary {
    /// Returns `None` for an empty batch.
    pub fn from_reports(reports: &[EpisodeReport]) -> Option<Self> {
        if reports.is_empty() {
            return None;
        }
        let n = reports.len() as f64;
        let captures = reports.iter().filter(|r| r.captured()).count();
        Some(ExperimentSummary {
            episodes: reports.len(),
            avg_reward_a: reports.iter().map(|r| r.total_reward_a).sum::<f64>() / n,
            avg_reward_b: reports.iter().map(|r| r.total_reward_b).sum::<f64>() / n,
            avg_rounds: reports.iter().map(|r| f64::from(r.rounds)).sum::<f64>() / n,
            captures,
            capture_rate: captures as f64 / n,
        })
    }
}

/// Every episode report of a batch with its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub summary: ExperimentSummary,
    pub reports: Vec<EpisodeReport>,
}

/// Runs `config.episodes` independent episodes, each on a fresh engine.
///
/// Results depend only on the configuration, so a batch can be replayed
/// exactly from its master seed.
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentResult, ExperimentError> {
    if config.episodes == 0 {
        return Err(ExperimentError::NoEpisodes);
    }
    let world = config.engine.build_world()?;
    info!(
        policy = %config.policy,
        episodes = config.episodes,
        height = world.height(),
        width = world.width(),
        max_rounds = config.engine.max_rounds,
        "starting experiment"
    );

    let mut seeder = StdRng::seed_from_u64(config.seed);
    let mut reports = Vec::with_capacity(config.episodes as usize);
    for index in 0..config.episodes {
        let episode_seed: u64 = seeder.random();
        let engine = TurnEngine::with_seed(world.clone(), config.engine.max_rounds, episode_seed)?;
        let episode = Episode::new(
            engine,
            config.policy.build(episode_seed.wrapping_add(1)),
            config.policy.build(episode_seed.wrapping_add(2)),
        );
        let report = episode.run(None)?;
        debug!(
            episode = index + 1,
            outcome = ?report.outcome,
            rounds = report.rounds,
            "episode complete"
        );
        reports.push(report);
    }

    let summary = ExperimentSummary::from_reports(&reports).ok_or(ExperimentError::NoEpisodes)?;
    info!(
        captures = summary.captures,
        capture_rate = summary.capture_rate,
        avg_rounds = summary.avg_rounds,
        "experiment finished"
    );
    Ok(ExperimentResult { summary, reports })
}
