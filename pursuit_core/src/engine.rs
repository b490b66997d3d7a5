//! Turn-based pursuit engine.
//!
//! A round is pursuer A's move, pursuer B's move and then the target's
//! automatic move. Only one entity moves per [`TurnEngine::step`] call, so two
//! pursuers can never contend for the same cell in the same instant.

use std::fmt;

use rand::{
    SeedableRng,
    rngs::StdRng,
    seq::{IndexedRandom, SliceRandom},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    Position, Pursuer, avoidance,
    error::{ConfigError, EngineError},
    map::Grid,
    world::{Action, Cell, GridWorld},
};

/// Reward applied to the acting pursuer on every step.
pub const STEP_PENALTY: f64 = -1.0;
/// Bonus added to the acting pursuer's reward when it lands on the target.
pub const CAPTURE_REWARD: f64 = 100.0;

/// Whose turn is next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Turn {
    PursuerA,
    PursuerB,
    Ended,
}

impl Turn {
    /// The pursuer expected to act, or `None` once the episode has ended.
    pub fn pursuer(self) -> Option<Pursuer> {
        match self {
            Turn::PursuerA => Some(Pursuer::A),
            Turn::PursuerB => Some(Pursuer::B),
            Turn::Ended => None,
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Turn::PursuerA => write!(f, "Pursuer A"),
            Turn::PursuerB => write!(f, "Pursuer B"),
            Turn::Ended => write!(f, "Ended"),
        }
    }
}

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    Captured,
    Truncated,
}

/// Positions of the three entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityState {
    pub pursuer_a: Position,
    pub pursuer_b: Position,
    pub target: Position,
}

impl EntityState {
    pub fn pursuer(&self, who: Pursuer) -> Position {
        match who {
            Pursuer::A => self.pursuer_a,
            Pursuer::B => self.pursuer_b,
        }
    }

    fn pursuer_mut(&mut self, who: Pursuer) -> &mut Position {
        match who {
            Pursuer::A => &mut self.pursuer_a,
            Pursuer::B => &mut self.pursuer_b,
        }
    }

    /// The flat observation `[a.row, a.col, b.row, b.col, target.row, target.col]`.
    pub fn observation(&self) -> [usize; 6] {
        [
            self.pursuer_a.row,
            self.pursuer_a.col,
            self.pursuer_b.row,
            self.pursuer_b.col,
            self.target.row,
            self.target.col,
        ]
    }
}

/// Metadata returned alongside every reset and step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    /// The pursuer to act next; `None` once the episode has ended.
    pub next_turn: Option<Pursuer>,
    pub status: Option<EpisodeStatus>,
}

/// Result of one [`TurnEngine::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub state: EntityState,
    /// Reward earned by the pursuer that just acted.
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

impl StepOutcome {
    pub fn observation(&self) -> [usize; 6] {
        self.state.observation()
    }
}

fn default_dimension() -> usize {
    10
}

fn default_max_rounds() -> u32 {
    100
}

/// Construction parameters for a [`TurnEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_dimension")]
    pub height: usize,
    #[serde(default = "default_dimension")]
    pub width: usize,
    #[serde(default)]
    pub obstacles: Vec<Position>,
    /// Maximum number of full rounds before the episode is truncated.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            height: default_dimension(),
            width: default_dimension(),
            obstacles: Vec::new(),
            max_rounds: default_max_rounds(),
        }
    }
}

impl EngineConfig {
    pub fn build_world(&self) -> Result<GridWorld, ConfigError> {
        GridWorld::new(self.height, self.width, self.obstacles.iter().copied())
    }
}

/// The pursuit state machine.
///
/// Owns the entity positions and the random source used for placement and
/// the target's tie-breaks; nothing else mutates them.
#[derive(Debug, Clone)]
pub struct TurnEngine {
    world: GridWorld,
    max_rounds: u32,
    rng: StdRng,
    entities: Option<EntityState>,
    turn: Turn,
    round: u32,
    status: Option<EpisodeStatus>,
}

impl TurnEngine {
    /// Creates an engine seeded from the operating system.
    pub fn new(world: GridWorld, max_rounds: u32) -> Result<Self, ConfigError> {
        Self::with_rng(world, max_rounds, StdRng::from_os_rng())
    }

    /// Creates an engine whose placements and tie-breaks are reproducible.
    pub fn with_seed(world: GridWorld, max_rounds: u32, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(world, max_rounds, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &EngineConfig, seed: Option<u64>) -> Result<Self, ConfigError> {
        let world = config.build_world()?;
        match seed {
            Some(seed) => Self::with_seed(world, config.max_rounds, seed),
            None => Self::new(world, config.max_rounds),
        }
    }

    fn with_rng(world: GridWorld, max_rounds: u32, rng: StdRng) -> Result<Self, ConfigError> {
        if max_rounds < 1 {
            return Err(ConfigError::InvalidRoundLimit);
        }
        Ok(TurnEngine {
            world,
            max_rounds,
            rng,
            entities: None,
            turn: Turn::Ended,
            round: 0,
            status: None,
        })
    }

    /// Starts a new episode on three distinct free cells chosen uniformly at random.
    ///
    /// A seed reseeds the engine's random source first, making the episode
    /// reproducible; without one the source simply continues.
    pub fn reset(&mut self, seed: Option<u64>) -> (EntityState, StepInfo) {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }

        let cells = self.world.free_cells();
        let mut picked: Vec<Position> = cells.choose_multiple(&mut self.rng, 3).copied().collect();
        // Sample order is unspecified; shuffle so each role is uniform.
        picked.shuffle(&mut self.rng);
        let [pursuer_a, pursuer_b, target] = picked[..] else {
            unreachable!("GridWorld guarantees at least three free cells");
        };
        let state = EntityState {
            pursuer_a,
            pursuer_b,
            target,
        };
        self.start(state);
        debug!(?state, "episode reset");
        (state, self.info())
    }

    /// Starts a new episode with explicit positions instead of random placement.
    ///
    /// Every position must be a valid cell; they need not be distinct.
    pub fn place(
        &mut self,
        pursuer_a: Position,
        pursuer_b: Position,
        target: Position,
    ) -> Result<(EntityState, StepInfo), EngineError> {
        if let Some(bad) = [pursuer_a, pursuer_b, target]
            .into_iter()
            .find(|pos| !self.world.is_valid(*pos))
        {
            return Err(EngineError::InvalidPlacement(bad));
        }
        let state = EntityState {
            pursuer_a,
            pursuer_b,
            target,
        };
        self.start(state);
        debug!(?state, "episode placed");
        Ok((state, self.info()))
    }

    fn start(&mut self, state: EntityState) {
        self.entities = Some(state);
        self.turn = Turn::PursuerA;
        self.round = 0;
        self.status = None;
    }

    /// Applies `action` for the pursuer whose turn it is.
    ///
    /// A move into a wall or off the grid leaves the pursuer in place but
    /// still costs the step penalty. After pursuer B moves (without a
    /// capture) the target moves and the round completes. Errors leave the
    /// engine untouched.
    pub fn step(&mut self, action: Action) -> Result<StepOutcome, EngineError> {
        let Some(mut state) = self.entities else {
            return Err(EngineError::NotStarted);
        };
        let Some(actor) = self.turn.pursuer() else {
            return Err(EngineError::EpisodeEnded);
        };

        let current = state.pursuer(actor);
        if let Some(next) = self.world.step_from(current, action) {
            *state.pursuer_mut(actor) = next;
        }
        let mut reward = STEP_PENALTY;
        let mut truncated = false;

        if state.pursuer(actor) == state.target {
            reward += CAPTURE_REWARD;
            self.turn = Turn::Ended;
            self.status = Some(EpisodeStatus::Captured);
            debug!(?actor, round = self.round, target = ?state.target, "target captured");
        } else {
            match actor {
                Pursuer::A => self.turn = Turn::PursuerB,
                Pursuer::B => {
                    let evade = avoidance::choose_move(
                        &self.world,
                        state.target,
                        state.pursuer_a,
                        state.pursuer_b,
                        &mut self.rng,
                    );
                    if let Some(next) = self.world.step_from(state.target, evade) {
                        state.target = next;
                    }
                    self.round += 1;
                    if self.round >= self.max_rounds {
                        truncated = true;
                        self.turn = Turn::Ended;
                        self.status = Some(EpisodeStatus::Truncated);
                        debug!(round = self.round, "round limit reached");
                    } else {
                        self.turn = Turn::PursuerA;
                    }
                }
            }
        }

        self.entities = Some(state);
        trace!(?actor, ?action, reward, round = self.round, next = %self.turn, "step");

        Ok(StepOutcome {
            state,
            reward,
            terminated: self.status == Some(EpisodeStatus::Captured),
            truncated,
            info: self.info(),
        })
    }

    fn info(&self) -> StepInfo {
        StepInfo {
            next_turn: self.turn.pursuer(),
            status: self.status,
        }
    }

    /// Renders the board as text: `.` free, `#` obstacle, `C` target,
    /// `1`/`2` pursuers (drawn over the target), `X` both pursuers on one cell.
    pub fn render(&self) -> String {
        let mut board = Grid::from_generator(self.world.height(), self.world.width(), |row, col| {
            match self.world.terrain()[Position::new(row, col)] {
                Cell::Free => '.',
                Cell::Obstacle => '#',
            }
        });

        let mut output = String::new();
        if let Some(state) = &self.entities {
            board[state.target] = 'C';
            board[state.pursuer_a] = '1';
            board[state.pursuer_b] = '2';
            if state.pursuer_a == state.pursuer_b {
                board[state.pursuer_a] = 'X';
            }
        }

        for row in board.rows() {
            let line: Vec<String> = row.iter().map(char::to_string).collect();
            output.push_str(&line.join(" "));
            output.push('\n');
        }

        if let Some(state) = &self.entities {
            output.push_str(&format!("Turn: {}\n", self.turn));
            output.push_str(&format!("Round: {}/{}\n", self.round, self.max_rounds));
            output.push_str(&format!(
                "A: ({}, {}) B: ({}, {}) Target: ({}, {})",
                state.pursuer_a.row,
                state.pursuer_a.col,
                state.pursuer_b.row,
                state.pursuer_b.col,
                state.target.row,
                state.target.col
            ));
        }
        output
    }

    pub fn world(&self) -> &GridWorld {
        &self.world
    }

    /// Current positions, or `None` before the first reset.
    pub fn state(&self) -> Option<&EntityState> {
        self.entities.as_ref()
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    /// Number of completed rounds in the current episode.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn status(&self) -> Option<EpisodeStatus> {
        self.status
    }
}
