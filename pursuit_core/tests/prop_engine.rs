//! Property-based tests for the turn engine and the search routines.

use std::collections::{HashMap, VecDeque};

use proptest::{prelude::*, sample::Index};

use pursuit_core::{
    Action, GridWorld, Position, Turn, TurnEngine,
    engine::{CAPTURE_REWARD, STEP_PENALTY},
    pathfinding,
};

fn action_strategy() -> impl Strategy<Value = Action> {
    (0u8..5).prop_map(|i| Action::from_index(i).unwrap())
}

/// A world of up to 8x8 with random obstacles, keeping at least three free cells.
fn world_strategy() -> impl Strategy<Value = GridWorld> {
    (2usize..=8, 2usize..=8)
        .prop_flat_map(|(height, width)| {
            let cells = height * width;
            (
                Just(height),
                Just(width),
                proptest::collection::vec((0..height, 0..width), 0..cells / 3),
            )
        })
        .prop_filter_map("needs three free cells", |(height, width, walls)| {
            let walls = walls.into_iter().map(|(r, c)| Position::new(r, c));
            GridWorld::new(height, width, walls).ok()
        })
}

/// Breadth-first shortest distance, used as the reference for A*.
fn bfs_distance(world: &GridWorld, start: Position, goal: Position) -> Option<usize> {
    let mut dist = HashMap::from([(start, 0usize)]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let d = dist[&current];
        if current == goal {
            return Some(d);
        }
        for action in Action::ALL {
            if let Some(next) = world.step_from(current, action) {
                if !dist.contains_key(&next) {
                    dist.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }
    }
    None
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every reachable state keeps all three entities on valid cells, and the
    /// round counter grows by exactly one per completed A-B-target cycle.
    #[test]
    fn prop_positions_stay_valid(
        world in world_strategy(),
        seed in any::<u64>(),
        max_rounds in 1u32..30,
        actions in proptest::collection::vec(action_strategy(), 1..120),
    ) {
        let mut engine = TurnEngine::with_seed(world, max_rounds, seed).unwrap();
        let (state, _) = engine.reset(Some(seed));
        for pos in [state.pursuer_a, state.pursuer_b, state.target] {
            prop_assert!(engine.world().is_valid(pos));
        }

        let mut b_moves = 0u32;
        for action in actions {
            let turn_before = engine.turn();
            let round_before = engine.round();
            let Ok(outcome) = engine.step(action) else {
                prop_assert_eq!(turn_before, Turn::Ended);
                break;
            };

            for pos in [outcome.state.pursuer_a, outcome.state.pursuer_b, outcome.state.target] {
                prop_assert!(engine.world().is_valid(pos));
            }
            prop_assert!(engine.round() >= round_before);
            prop_assert!(engine.round() <= max_rounds);

            if outcome.terminated {
                prop_assert_eq!(engine.round(), round_before);
                prop_assert_eq!(outcome.reward, STEP_PENALTY + CAPTURE_REWARD);
            } else {
                prop_assert_eq!(outcome.reward, STEP_PENALTY);
                if turn_before == Turn::PursuerB {
                    b_moves += 1;
                }
            }
            prop_assert_eq!(engine.round(), b_moves);
            prop_assert!(!(outcome.terminated && outcome.truncated));
        }
    }

    /// A blocked move never changes the acting pursuer's cell.
    #[test]
    fn prop_blocked_move_is_absorbed(
        world in world_strategy(),
        seed in any::<u64>(),
        action in action_strategy(),
    ) {
        let mut engine = TurnEngine::with_seed(world, 10, seed).unwrap();
        let (before, _) = engine.reset(Some(seed));
        let outcome = engine.step(action).unwrap();
        match engine.world().step_from(before.pursuer_a, action) {
            Some(next) => prop_assert_eq!(outcome.state.pursuer_a, next),
            None => prop_assert_eq!(outcome.state.pursuer_a, before.pursuer_a),
        }
    }

    /// On an open grid the path length equals the Manhattan distance.
    #[test]
    fn prop_open_grid_path_is_manhattan(
        height in 1usize..12,
        width in 3usize..12,
        start in (0usize..12, 0usize..12),
        goal in (0usize..12, 0usize..12),
    ) {
        let world = GridWorld::new(height, width, std::iter::empty()).unwrap();
        let start = Position::new(start.0 % height, start.1 % width);
        let goal = Position::new(goal.0 % height, goal.1 % width);
        let path = pathfinding::find_path(&world, start, goal).unwrap();
        prop_assert_eq!(path.len(), start.manhattan(&goal));
        let first = pathfinding::next_step(&world, start, goal);
        if start == goal {
            prop_assert_eq!(first, Action::Stay);
        } else {
            let next = world.step_from(start, first).unwrap();
            prop_assert_eq!(next.manhattan(&goal) + 1, start.manhattan(&goal));
        }
    }

    /// A* finds a path exactly when one exists, and its length equals the
    /// breadth-first distance around obstacles.
    #[test]
    fn prop_path_length_matches_bfs(
        world in world_strategy(),
        start in any::<Index>(),
        goal in any::<Index>(),
    ) {
        let cells = world.free_cells();
        let start = *start.get(&cells);
        let goal = *goal.get(&cells);
        let found = pathfinding::find_path(&world, start, goal).map(|path| path.len());
        prop_assert_eq!(found, bfs_distance(&world, start, goal));
    }

    /// With obstacles, any path found is legal and ends on the goal.
    #[test]
    fn prop_paths_are_walkable(
        world in world_strategy(),
        seed in any::<u64>(),
    ) {
        let mut engine = TurnEngine::with_seed(world, 5, seed).unwrap();
        let (state, _) = engine.reset(Some(seed));
        let world = engine.world();
        if let Some(path) = pathfinding::find_path(world, state.pursuer_a, state.target) {
            prop_assert!(path.len() >= state.pursuer_a.manhattan(&state.target));
            let mut pos = state.pursuer_a;
            for action in path {
                prop_assert_ne!(action, Action::Stay);
                pos = world.step_from(pos, action).unwrap();
            }
            prop_assert_eq!(pos, state.target);
        } else {
            prop_assert_eq!(
                pathfinding::next_step(world, state.pursuer_a, state.target),
                Action::Stay
            );
        }
    }
}
