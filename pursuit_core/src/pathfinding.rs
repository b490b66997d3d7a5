//! A* search over the world grid.
//!
//! Every move costs 1 and obstacles are impassable, so Manhattan distance is an
//! admissible and consistent heuristic: the first time the goal is popped from
//! the frontier its path is optimal.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet},
};

use tracing::trace;

use crate::{
    Position,
    world::{Action, GridWorld},
};

/// Frontier entry. Ordered so that `BinaryHeap` pops the lowest `f` first,
/// and among equal `f` the entry pushed earliest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PrioritizedItem {
    f: usize,
    g: usize,
    seq: u64,
    position: Position,
}

impl Ord for PrioritizedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other.f.cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PrioritizedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Finds an optimal sequence of moves from `start` to `goal`.
///
/// Returns an empty path when `start == goal` and `None` when the goal cannot
/// be reached. A better path to a node already in the frontier pushes a fresh
/// entry; the outdated one is skipped when popped.
pub fn find_path(world: &GridWorld, start: Position, goal: Position) -> Option<Vec<Action>> {
    if start == goal {
        return Some(Vec::new());
    }
    if !world.is_valid(start) || !world.is_valid(goal) {
        return None;
    }

    let mut frontier = BinaryHeap::new();
    let mut came_from: HashMap<Position, (Position, Action)> = HashMap::new();
    let mut cost_so_far: HashMap<Position, usize> = HashMap::new();
    let mut closed: HashSet<Position> = HashSet::new();
    let mut seq = 0u64;

    frontier.push(PrioritizedItem {
        f: start.manhattan(&goal),
        g: 0,
        seq,
        position: start,
    });
    cost_so_far.insert(start, 0);

    while let Some(PrioritizedItem {
        g, position: current, ..
    }) = frontier.pop()
    {
        // Stale entry: node already finalized, or superseded by a cheaper push.
        if closed.contains(&current) || cost_so_far.get(&current).is_some_and(|best| g > *best) {
            continue;
        }
        if current == goal {
            trace!(?start, ?goal, cost = g, expanded = closed.len(), "path found");
            return Some(reconstruct(&came_from, start, goal));
        }
        closed.insert(current);

        for action in Action::ALL {
            if action == Action::Stay {
                continue;
            }
            let Some(neighbor) = world.step_from(current, action) else {
                continue;
            };
            if closed.contains(&neighbor) {
                continue;
            }

            let new_cost = g + 1;
            let improves = cost_so_far
                .get(&neighbor)
                .is_none_or(|known| new_cost < *known);
            if improves {
                cost_so_far.insert(neighbor, new_cost);
                came_from.insert(neighbor, (current, action));
                seq += 1;
                frontier.push(PrioritizedItem {
                    f: new_cost + neighbor.manhattan(&goal),
                    g: new_cost,
                    seq,
                    position: neighbor,
                });
            }
        }
    }

    trace!(?start, ?goal, expanded = closed.len(), "goal unreachable");
    None
}

/// Walks the parent links back from `goal` and returns the moves in travel order.
fn reconstruct(
    came_from: &HashMap<Position, (Position, Action)>,
    start: Position,
    goal: Position,
) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some((parent, action)) => {
                actions.push(*action);
                current = *parent;
            }
            None => break,
        }
    }
    actions.reverse();
    actions
}

/// The first move of an optimal path from `start` to `goal`.
///
/// Returns [`Action::Stay`] when already at the goal or when no path exists.
pub fn next_step(world: &GridWorld, start: Position, goal: Position) -> Action {
    find_path(world, start, goal)
        .and_then(|path| path.first().copied())
        .unwrap_or(Action::Stay)
}
