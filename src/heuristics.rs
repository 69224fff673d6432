use crate::engine::{Direction, Map, Pos, State};

/// Manhattan distance between two grid positions.
pub fn manhattan(a: Pos, b: Pos) -> u64 {
    (a.0.abs_diff(b.0) + a.1.abs_diff(b.1)) as u64
}

/// Distance from `pos` to the closest target cell, or 0 if the map has no targets.
pub fn nearest_target_distance(map: &Map, pos: Pos) -> u64 {
    map.targets()
        .iter()
        .map(|&t| manhattan(pos, t))
        .min()
        .unwrap_or(0)
}

/// Twice the A* estimate of the remaining cost of a state.
///
/// Summed over stones, each stone contributes half the agent's Manhattan distance to
/// it plus its distance to the nearest target scaled by `weight + 1`, the cost of one
/// push of that stone. The half term is exact, so the estimate is returned doubled to
/// stay in integers; compare it against `2 * cost`.
///
/// This mixes a halved walking term with a weighted pushing term and ignores
/// stone-to-stone interference, so it is not admissible in general; searches guided
/// by it are best-first, not certified shortest paths.
///
/// # Examples
/// ```
/// use weighted_sokoban::heuristics::doubled_weighted_manhattan;
/// use weighted_sokoban::utils::puzzle_from_str;
///
/// let puzzle = puzzle_from_str("3\n#######\n#@ $ .#\n#######").unwrap();
/// // agent term 2 / 2 = 1, push term 2 * (3 + 1) = 8, doubled: 18
/// assert_eq!(doubled_weighted_manhattan(puzzle.map(), puzzle.initial_state()), 18);
/// ```
pub fn doubled_weighted_manhattan(map: &Map, state: &State) -> u64 {
    state
        .stones()
        .iter()
        .zip(map.weights())
        .map(|(&stone, &weight)| {
            manhattan(state.agent(), stone)
                + 2 * nearest_target_distance(map, stone) * (u64::from(weight) + 1)
        })
        .sum()
}

/// The greedy best-first estimate of the remaining cost of a state.
///
/// Per stone: the full agent distance plus the nearest-target distance scaled by
/// `weight² + 1`, which pulls heavy stones much harder towards targets than the A*
/// estimate does.
pub fn greedy_weighted_manhattan(map: &Map, state: &State) -> u64 {
    state
        .stones()
        .iter()
        .zip(map.weights())
        .map(|(&stone, &weight)| {
            let weight = u64::from(weight);
            manhattan(state.agent(), stone) + nearest_target_distance(map, stone) * (weight * weight + 1)
        })
        .sum()
}

// A neighbour blocks a stone if it is a wall or a stone that is itself off target.
fn is_blocking(map: &Map, pos: Pos, stones: &[Pos]) -> bool {
    map.is_wall(pos) || (stones.contains(&pos) && !map.is_target(pos))
}

/// Checks whether a stone at `stone` is pinned in a corner off target.
///
/// The stone is flagged when it is not on a target and it is blocked on at least one
/// horizontal side and at least one vertical side, where a side is blocked by a wall
/// or by another stone that is not on a target.
///
/// This is a cheap local test that looks at four neighbours only. It does not find
/// deadlocks that need look-ahead, such as two stones frozen side by side along a
/// wall away from a corner.
///
/// # Arguments
/// * `map`: The map holding walls and targets.
/// * `stone`: Position of the stone to test, normally the one just pushed.
/// * `stones`: Positions of all stones, including `stone` itself.
///
/// # Panics
/// Panics if `stone` lies on the grid edge. Stones of a validated `Puzzle` never do.
pub fn is_corner_deadlock(map: &Map, stone: Pos, stones: &[Pos]) -> bool {
    if map.is_target(stone) {
        return false;
    }
    let blocked = |d: Direction| is_blocking(map, d.step(stone), stones);
    let horizontal = blocked(Direction::Left) || blocked(Direction::Right);
    let vertical = blocked(Direction::Up) || blocked(Direction::Down);
    horizontal && vertical
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::puzzle_from_str;

    #[test]
    fn test_manhattan() {
        assert_eq!(manhattan((1, 1), (1, 1)), 0);
        assert_eq!(manhattan((1, 4), (3, 1)), 5);
        assert_eq!(manhattan((3, 1), (1, 4)), 5);
    }

    #[test]
    fn test_nearest_target_distance() {
        let puzzle = puzzle_from_str("1 1\n#######\n#.@$ .#\n#  $  #\n#######").unwrap();
        assert_eq!(nearest_target_distance(puzzle.map(), (1, 3)), 2);
        assert_eq!(nearest_target_distance(puzzle.map(), (2, 3)), 3);
        assert_eq!(nearest_target_distance(puzzle.map(), (1, 1)), 0);
    }

    #[test]
    fn test_doubled_weighted_manhattan_sums_per_stone_terms() {
        let puzzle = puzzle_from_str("2 5\n########\n#@ $  .#\n#   $ .#\n########").unwrap();
        let map = puzzle.map();
        let state = puzzle.initial_state();
        // stone 0 at (1,3): agent 2, target 2 * 3 * 3 = 18
        // stone 1 at (2,4): agent 4, target 2 * 2 * 6 = 24
        assert_eq!(doubled_weighted_manhattan(map, state), 2 + 18 + 4 + 24);
    }

    #[test]
    fn test_weighted_manhattan_goal_keeps_exact_half_agent_term() {
        let puzzle = puzzle_from_str("4\n######\n#@  *#\n######").unwrap();
        assert!(puzzle.is_solved());
        // 3 / 2 = 1.5, doubled
        assert_eq!(doubled_weighted_manhattan(puzzle.map(), puzzle.initial_state()), 3);
    }

    #[test]
    fn test_weighted_manhattan_keeps_odd_agent_distances_apart() {
        let puzzle = puzzle_from_str("1\n#######\n#@    #\n#  $ .#\n#######").unwrap();
        let stones = puzzle.initial_state().stones().to_vec();
        let far = State::new((1, 1), stones.clone());
        let near = State::new((1, 2), stones);
        // agent terms 3 / 2 and 2 / 2 differ by half a unit
        assert_eq!(
            doubled_weighted_manhattan(puzzle.map(), &far),
            doubled_weighted_manhattan(puzzle.map(), &near) + 1
        );
    }

    #[test]
    fn test_greedy_weighted_manhattan() {
        let puzzle = puzzle_from_str("3\n#######\n#@ $ .#\n#######").unwrap();
        // agent 2 + target 2 * (9 + 1)
        assert_eq!(
            greedy_weighted_manhattan(puzzle.map(), puzzle.initial_state()),
            2 + 20
        );
    }

    #[test]
    fn test_corner_deadlock_wall_corner() {
        let puzzle = puzzle_from_str("1\n#####\n#$  #\n# @.#\n#####").unwrap();
        let stones = puzzle.initial_state().stones();
        assert!(is_corner_deadlock(puzzle.map(), (1, 1), stones));
    }

    #[test]
    fn test_corner_deadlock_not_on_target() {
        let puzzle = puzzle_from_str("1\n#####\n#*  #\n# @ #\n#####").unwrap();
        let stones = puzzle.initial_state().stones();
        assert!(!is_corner_deadlock(puzzle.map(), (1, 1), stones));
    }

    #[test]
    fn test_corner_deadlock_against_wall_only() {
        // Blocked vertically by the top wall, free on both horizontal sides.
        let puzzle = puzzle_from_str("1\n######\n# $ .#\n# @  #\n######").unwrap();
        let stones = puzzle.initial_state().stones();
        assert!(!is_corner_deadlock(puzzle.map(), (1, 2), stones));
    }

    #[test]
    fn test_corner_deadlock_stone_neighbours() {
        // Stone 0 at (1,2): top wall, stone 1 to its right off target -> blocked.
        let blocked = puzzle_from_str("1 1\n#######\n# $$  #\n# @ ..#\n#######").unwrap();
        assert!(is_corner_deadlock(
            blocked.map(),
            (1, 2),
            blocked.initial_state().stones()
        ));

        // Same shape, but the right neighbour sits on a target so it does not block.
        let on_target = puzzle_from_str("1 1\n#######\n# $*  #\n# @  .#\n#######").unwrap();
        assert!(!is_corner_deadlock(
            on_target.map(),
            (1, 2),
            on_target.initial_state().stones()
        ));
    }
}
