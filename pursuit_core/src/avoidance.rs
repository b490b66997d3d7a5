//! The target's move rule: step away from whichever pursuer is nearer.

use rand::{Rng, seq::IndexedRandom};

use crate::{
    Position,
    world::{Action, GridWorld},
};

/// Score of a candidate move, compared lexicographically (higher is better).
type MoveKey = (usize, usize);

/// Picks the target's next move.
///
/// Candidates are all moves whose resulting cell is valid; `Stay` always is.
/// If one pursuer is strictly nearer, the move maximizing the resulting
/// distance to that pursuer wins. When both are equidistant the key is
/// (distance to A, distance to B). Remaining ties are broken uniformly at
/// random with `rng`.
pub fn choose_move<R: Rng + ?Sized>(
    world: &GridWorld,
    target: Position,
    pursuer_a: Position,
    pursuer_b: Position,
    rng: &mut R,
) -> Action {
    let dist_a = target.manhattan(&pursuer_a);
    let dist_b = target.manhattan(&pursuer_b);

    let key = |next: Position| -> MoveKey {
        let next_a = next.manhattan(&pursuer_a);
        let next_b = next.manhattan(&pursuer_b);
        if dist_a < dist_b {
            (next_a, 0)
        } else if dist_b < dist_a {
            (next_b, 0)
        } else {
            (next_a, next_b)
        }
    };

    let scored: Vec<(MoveKey, Action)> = Action::ALL
        .into_iter()
        .filter_map(|action| {
            world
                .step_from(target, action)
                .map(|next| (key(next), action))
        })
        .collect();

    let Some(best) = scored.iter().map(|(k, _)| *k).max() else {
        return Action::Stay;
    };
    let tied: Vec<Action> = scored
        .into_iter()
        .filter_map(|(k, action)| (k == best).then_some(action))
        .collect();

    tied.choose(rng).copied().unwrap_or(Action::Stay)
}
