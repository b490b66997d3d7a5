//! Runs one episode by asking each pursuer's policy for moves and feeding
//! them to the engine, keeping a log of every transition.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Pursuer,
    engine::{EntityState, EpisodeStatus, StepInfo, TurnEngine},
    error::EngineError,
    policy::{Policy, PursuerView},
    world::Action,
};

/// One entry of an episode log.
///
/// The first entry describes the state right after reset and has no acting
/// pursuer or action; every later entry follows one engine step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub state: EntityState,
    pub acting: Option<Pursuer>,
    pub action: Option<Action>,
    /// Reward earned by the acting pursuer in this step.
    pub reward: f64,
    pub total_reward_a: f64,
    pub total_reward_b: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub next_turn: Option<Pursuer>,
    pub status: Option<EpisodeStatus>,
    /// Completed rounds at the time of the record.
    pub round: u32,
}

/// Summary of a finished episode, with its full log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub log: Vec<StepRecord>,
    pub total_reward_a: f64,
    pub total_reward_b: f64,
    /// Completed rounds when the episode ended.
    pub rounds: u32,
    pub outcome: Option<EpisodeStatus>,
}

impl EpisodeReport {
    pub fn captured(&self) -> bool {
        self.outcome == Some(EpisodeStatus::Captured)
    }
}

/// Drives a [`TurnEngine`] with one policy per pursuer.
pub struct Episode {
    engine: TurnEngine,
    policy_a: Box<dyn Policy>,
    policy_b: Box<dyn Policy>,
    log: Vec<StepRecord>,
    total_reward_a: f64,
    total_reward_b: f64,
}

impl Episode {
    pub fn new(engine: TurnEngine, policy_a: Box<dyn Policy>, policy_b: Box<dyn Policy>) -> Self {
        Episode {
            engine,
            policy_a,
            policy_b,
            log: Vec::new(),
            total_reward_a: 0.0,
            total_reward_b: 0.0,
        }
    }

    /// Resets the engine and starts a fresh log with the initial state.
    pub fn start(&mut self, seed: Option<u64>) -> &StepRecord {
        let (state, info) = self.engine.reset(seed);
        self.begin(state, info)
    }

    /// Like [`Episode::start`], but with explicit starting positions.
    pub fn start_placed(&mut self, state: EntityState) -> Result<&StepRecord, EngineError> {
        let (state, info) = self
            .engine
            .place(state.pursuer_a, state.pursuer_b, state.target)?;
        Ok(self.begin(state, info))
    }

    fn begin(&mut self, state: EntityState, info: StepInfo) -> &StepRecord {
        self.total_reward_a = 0.0;
        self.total_reward_b = 0.0;
        self.log.clear();
        self.log.push(StepRecord {
            state,
            acting: None,
            action: None,
            reward: 0.0,
            total_reward_a: 0.0,
            total_reward_b: 0.0,
            terminated: false,
            truncated: false,
            next_turn: info.next_turn,
            status: info.status,
            round: self.engine.round(),
        });
        &self.log[0]
    }

    /// Plays the next pursuer move.
    ///
    /// Returns `Ok(None)` once the episode is over and
    /// [`EngineError::NotStarted`] if it was never started.
    pub fn advance(&mut self) -> Result<Option<&StepRecord>, EngineError> {
        let Some(state) = self.engine.state().copied() else {
            return Err(EngineError::NotStarted);
        };
        let Some(actor) = self.engine.turn().pursuer() else {
            return Ok(None);
        };

        let view = PursuerView {
            world: self.engine.world(),
            pursuer: actor,
            position: state.pursuer(actor),
            partner: state.pursuer(actor.partner()),
            target: state.target,
        };
        let policy = match actor {
            Pursuer::A => &mut self.policy_a,
            Pursuer::B => &mut self.policy_b,
        };
        let action = policy.choose_action(&view);

        let outcome = self.engine.step(action)?;
        match actor {
            Pursuer::A => self.total_reward_a += outcome.reward,
            Pursuer::B => self.total_reward_b += outcome.reward,
        }

        self.log.push(StepRecord {
            state: outcome.state,
            acting: Some(actor),
            action: Some(action),
            reward: outcome.reward,
            total_reward_a: self.total_reward_a,
            total_reward_b: self.total_reward_b,
            terminated: outcome.terminated,
            truncated: outcome.truncated,
            next_turn: outcome.info.next_turn,
            status: outcome.info.status,
            round: self.engine.round(),
        });

        if let Some(status) = outcome.info.status {
            debug!(
                ?status,
                rounds = self.engine.round(),
                total_reward_a = self.total_reward_a,
                total_reward_b = self.total_reward_b,
                "episode finished"
            );
        }
        Ok(self.log.last())
    }

    /// Plays from a fresh reset to the end and returns the report.
    pub fn run(mut self, seed: Option<u64>) -> Result<EpisodeReport, EngineError> {
        self.start(seed);
        while self.advance()?.is_some() {}
        Ok(self.into_report())
    }

    pub fn is_finished(&self) -> bool {
        self.engine.turn().pursuer().is_none()
    }

    pub fn into_report(self) -> EpisodeReport {
        EpisodeReport {
            rounds: self.engine.round(),
            outcome: self.engine.status(),
            total_reward_a: self.total_reward_a,
            total_reward_b: self.total_reward_b,
            log: self.log,
        }
    }

    pub fn engine(&self) -> &TurnEngine {
        &self.engine
    }

    pub fn log(&self) -> &[StepRecord] {
        &self.log
    }

    pub fn total_rewards(&self) -> (f64, f64) {
        (self.total_reward_a, self.total_reward_b)
    }

    pub fn policy_names(&self) -> (&'static str, &'static str) {
        (self.policy_a.name(), self.policy_b.name())
    }
}
