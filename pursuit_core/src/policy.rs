use std::{fmt, str::FromStr};

use rand::{SeedableRng, rngs::StdRng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};

use crate::{
    Position, Pursuer, pathfinding,
    world::{Action, GridWorld},
};

/// Read-only snapshot handed to a pursuer policy when it is asked to act.
///
/// The built-in policies only look at `world`, `position` and `target`.
/// `pursuer` and `partner` are there for custom policies that coordinate the
/// two pursuers, e.g. splitting up to approach the target from both sides.
#[derive(Debug, Clone, Copy)]
pub struct PursuerView<'a> {
    pub world: &'a GridWorld,
    /// Which pursuer is acting.
    pub pursuer: Pursuer,
    pub position: Position,
    /// Current cell of the other pursuer.
    pub partner: Position,
    pub target: Position,
}

/// Trait defining how a pursuer picks its moves.
pub trait Policy {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Determines the action the pursuer wants to perform.
    /// `&mut self` allows the policy to keep internal state (e.g. a random source).
    fn choose_action(&mut self, view: &PursuerView) -> Action;
}

/// A pursuer that picks one of the five moves uniformly at random.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn choose_action(&mut self, _view: &PursuerView) -> Action {
        Action::ALL
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Action::Stay)
    }
}

/// A pursuer that takes the move whose intended cell is closest to the target.
///
/// Walls are ignored when scoring; the engine resolves a bump by leaving the
/// pursuer in place. Ties go to the earliest move in [`Action::ALL`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyPolicy;

impl GreedyPolicy {
    fn intended_distance(from: Position, action: Action, target: Position) -> usize {
        let (dr, dc) = action.delta();
        let row = from.row as isize + dr;
        let col = from.col as isize + dc;
        row.abs_diff(target.row as isize) + col.abs_diff(target.col as isize)
    }
}

impl Policy for GreedyPolicy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn choose_action(&mut self, view: &PursuerView) -> Action {
        Action::ALL
            .into_iter()
            .min_by_key(|action| Self::intended_distance(view.position, *action, view.target))
            .unwrap_or(Action::Stay)
    }
}

/// A pursuer that follows the first step of a shortest path to the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchPolicy;

impl Policy for SearchPolicy {
    fn name(&self) -> &'static str {
        "search"
    }

    fn choose_action(&mut self, view: &PursuerView) -> Action {
        if view.position == view.target {
            return Action::Stay;
        }
        pathfinding::next_step(view.world, view.position, view.target)
    }
}

/// Selects one of the built-in pursuer policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Random,
    Greedy,
    Search,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [PolicyKind::Random, PolicyKind::Greedy, PolicyKind::Search];

    /// Builds a fresh policy. Only [`PolicyKind::Random`] uses the seed.
    pub fn build(self, seed: u64) -> Box<dyn Policy> {
        match self {
            PolicyKind::Random => Box::new(RandomPolicy::new(seed)),
            PolicyKind::Greedy => Box::new(GreedyPolicy),
            PolicyKind::Search => Box::new(SearchPolicy),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyKind::Random => "random",
            PolicyKind::Greedy => "greedy",
            PolicyKind::Search => "search",
        };
        f.write_str(name)
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(PolicyKind::Random),
            "greedy" | "heuristic" => Ok(PolicyKind::Greedy),
            "search" | "astar" | "a*" => Ok(PolicyKind::Search),
            other => Err(format!(
                "unknown policy '{other}', expected one of: random, greedy, search"
            )),
        }
    }
}
