//! End-to-end pursuit scenarios through the public API.

#![allow(clippy::unwrap_used)]

use pursuit_core::{
    Action, EngineError, GridWorld, Position, Pursuer, Turn, TurnEngine,
    engine::{CAPTURE_REWARD, EpisodeStatus, STEP_PENALTY},
    episode::Episode,
    pathfinding,
    policy::PolicyKind,
    world::load_world_from_string,
};

const NO_WALLS: [Position; 0] = [];

fn arena() -> GridWorld {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../maps/arena.txt");
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| panic!("{path}: {e}"));
    load_world_from_string(&text).unwrap()
}

#[test]
fn test_arena_map_loads() {
    let world = arena();
    assert_eq!((world.height(), world.width()), (8, 12));
    assert_eq!(world.obstacles().len(), 16);
    assert_eq!(world.free_cell_count(), 80);
    assert!(world.is_obstacle(Position::new(3, 5)));
    assert!(world.is_valid(Position::new(0, 0)));
}

#[test]
fn test_capture_on_open_grid() {
    let world = GridWorld::new(5, 5, NO_WALLS).unwrap();
    let mut engine = TurnEngine::with_seed(world, 50, 9).unwrap();
    engine
        .place(Position::new(1, 2), Position::new(4, 0), Position::new(2, 2))
        .unwrap();

    let outcome = engine.step(Action::South).unwrap();
    assert_eq!(outcome.observation(), [2, 2, 4, 0, 2, 2]);
    assert_eq!(outcome.reward, STEP_PENALTY + CAPTURE_REWARD);
    assert!(outcome.terminated);
    assert!(!outcome.truncated);
    assert_eq!(outcome.info.next_turn, None);
    assert_eq!(outcome.info.status, Some(EpisodeStatus::Captured));
    assert_eq!(engine.turn(), Turn::Ended);
    assert_eq!(engine.step(Action::Stay).unwrap_err(), EngineError::EpisodeEnded);
}

#[test]
fn test_single_round_truncates() {
    let world = GridWorld::new(5, 5, NO_WALLS).unwrap();
    let mut engine = TurnEngine::with_seed(world, 1, 4).unwrap();
    engine
        .place(Position::new(0, 0), Position::new(0, 1), Position::new(4, 4))
        .unwrap();

    let first = engine.step(Action::Stay).unwrap();
    assert!(!first.terminated && !first.truncated);
    assert_eq!(first.info.next_turn, Some(Pursuer::B));

    let second = engine.step(Action::Stay).unwrap();
    assert!(second.truncated);
    assert!(!second.terminated);
    assert_eq!(second.reward, STEP_PENALTY);
    assert_eq!(engine.round(), 1);
    assert_eq!(engine.status(), Some(EpisodeStatus::Truncated));
}

#[test]
fn test_search_path_routes_around_arena_walls() {
    let world = arena();
    // (3,4) to (3,7) is blocked by the central pillar.
    let path = pathfinding::find_path(&world, Position::new(3, 4), Position::new(3, 7)).unwrap();
    assert_eq!(path.len(), 5);
    let mut pos = Position::new(3, 4);
    for action in path {
        pos = world.step_from(pos, action).unwrap();
    }
    assert_eq!(pos, Position::new(3, 7));
}

#[test]
fn test_episodes_on_arena_finish_within_limit() {
    for kind in PolicyKind::ALL {
        let engine = TurnEngine::with_seed(arena(), 40, 21).unwrap();
        let report = Episode::new(engine, kind.build(1), kind.build(2))
            .run(Some(5))
            .unwrap();
        assert!(report.outcome.is_some(), "{kind}");
        assert!(report.rounds <= 40);
        assert!(report.log.len() <= 1 + 2 * 40);
        let world = arena();
        for record in &report.log {
            for pos in [record.state.pursuer_a, record.state.pursuer_b, record.state.target] {
                assert!(world.is_valid(pos), "{kind}: {pos:?}");
            }
        }
        if report.captured() {
            let last = report.log.last().unwrap();
            let who = last.acting.unwrap();
            assert_eq!(last.state.pursuer(who), last.state.target);
        } else {
            assert_eq!(report.rounds, 40);
        }
    }
}
