//! Core puzzle model for weighted Sokoban.
//!
//! This module defines the pieces every search strategy shares:
//! - `CellKind` and `Map`: the immutable grid (floor, wall, target) plus the stone weights.
//! - `State`: agent position and index-aligned stone positions, the unit of search.
//! - `Direction` and `Move`: the four moves and their walk/push labels.
//! - `step` and `successors`: the transition generator.
//! - `Puzzle`: a validated map together with its initial state, move replay and
//!   seeded random puzzle generation.
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::heuristics::is_corner_deadlock;

/// A `(row, col)` coordinate on the grid.
pub type Pos = (usize, usize);

/// The static kind of a grid cell.
///
/// Stones and the agent are not cell kinds; they live in `State`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// Walkable cell.
    Floor,
    /// Impassable cell for both the agent and stones.
    Wall,
    /// Walkable cell a stone must end up on.
    Target,
}

impl CellKind {
    /// Maps a legend character to the static cell it describes.
    ///
    /// `#` is a wall, `.`, `+` and `*` sit on a target, everything else is floor.
    ///
    /// # Examples
    ///
    /// ```
    /// use weighted_sokoban::engine::CellKind;
    /// assert_eq!(CellKind::from_char('#'), CellKind::Wall);
    /// assert_eq!(CellKind::from_char('*'), CellKind::Target);
    /// assert_eq!(CellKind::from_char('$'), CellKind::Floor);
    /// ```
    pub fn from_char(ch: char) -> CellKind {
        match ch {
            '#' => CellKind::Wall,
            '.' | '+' | '*' => CellKind::Target,
            _ => CellKind::Floor,
        }
    }

    /// Converts the cell to its character when nothing stands on it.
    pub fn to_char(self) -> char {
        match self {
            CellKind::Floor => ' ',
            CellKind::Wall => '#',
            CellKind::Target => '.',
        }
    }
}

/// One of the four moves available to the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All directions in generation order. Strategies break ties using this order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Returns the neighbouring position one cell away in this direction.
    ///
    /// # Panics
    /// Panics on underflow when stepping off row or column 0. A validated `Puzzle`
    /// never lets the agent or a stone reach the grid edge, so this only fires on
    /// a broken invariant.
    pub fn step(self, (r, c): Pos) -> Pos {
        match self {
            Direction::Up => (r - 1, c),
            Direction::Down => (r + 1, c),
            Direction::Left => (r, c - 1),
            Direction::Right => (r, c + 1),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Lowercase label letter (`u`, `d`, `l`, `r`).
    pub fn to_char(self) -> char {
        match self {
            Direction::Up => 'u',
            Direction::Down => 'd',
            Direction::Left => 'l',
            Direction::Right => 'r',
        }
    }

    /// Parses a move label. Returns the direction and whether the label denotes a push
    /// (uppercase), or `None` for anything that is not one of `udlrUDLR`.
    pub fn from_label(label: char) -> Option<(Direction, bool)> {
        let direction = match label.to_ascii_lowercase() {
            'u' => Direction::Up,
            'd' => Direction::Down,
            'l' => Direction::Left,
            'r' => Direction::Right,
            _ => return None,
        };
        Some((direction, label.is_ascii_uppercase()))
    }
}

/// A single executed move: the direction and, for a push, the index of the stone moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Move {
    pub direction: Direction,
    pub pushed: Option<usize>,
}

impl Move {
    pub fn is_push(&self) -> bool {
        self.pushed.is_some()
    }

    /// Lowercase letter for a walk, uppercase for a push.
    ///
    /// # Examples
    ///
    /// ```
    /// use weighted_sokoban::engine::{Direction, Move};
    /// let walk = Move { direction: Direction::Left, pushed: None };
    /// let push = Move { direction: Direction::Left, pushed: Some(0) };
    /// assert_eq!(walk.label(), 'l');
    /// assert_eq!(push.label(), 'L');
    /// ```
    pub fn label(&self) -> char {
        let ch = self.direction.to_char();
        if self.is_push() {
            ch.to_ascii_uppercase()
        } else {
            ch
        }
    }
}

/// Reasons a map or puzzle is rejected at construction time.
///
/// A puzzle that fails any of these checks is never partially built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("missing stone weight line")]
    MissingWeights,
    #[error("invalid stone weight '{0}'")]
    InvalidWeight(String),
    #[error("stone {index} has a non-positive weight")]
    NonPositiveWeight { index: usize },
    #[error("map grid is empty")]
    EmptyGrid,
    #[error("no agent found on the map")]
    NoAgent,
    #[error("more than one agent found (another at row {row}, col {col})")]
    MultipleAgents { row: usize, col: usize },
    #[error("found {stones} stones but {weights} weights")]
    WeightCountMismatch { stones: usize, weights: usize },
    #[error("found {stones} stones but {targets} targets")]
    TargetCountMismatch { stones: usize, targets: usize },
    #[error("position row {row}, col {col} lies outside the grid")]
    OutOfBounds { row: usize, col: usize },
    #[error("agent or stone placed on a wall at row {row}, col {col}")]
    OnWall { row: usize, col: usize },
    #[error("two stones share row {row}, col {col}")]
    OverlappingStones { row: usize, col: usize },
    #[error("agent stands on a stone at row {row}, col {col}")]
    AgentOnStone { row: usize, col: usize },
    #[error("area reachable from the agent is not enclosed by walls (escapes at row {row}, col {col})")]
    OpenBoundary { row: usize, col: usize },
    #[error("stone at row {row}, col {col} lies outside the area enclosed around the agent")]
    StoneOutsideRegion { row: usize, col: usize },
}

/// The immutable grid of cell kinds plus the ordered stone weights.
///
/// Stone `i` always costs `weight(i)` to push, wherever it currently sits.
/// A `Map` is read-only after construction and may be shared by concurrent searches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Map {
    height: usize,
    width: usize,
    cells: Vec<CellKind>,
    targets: Vec<Pos>,
    weights: Vec<u32>,
}

impl Map {
    /// Builds a map from rows of cells and the stone weight vector.
    ///
    /// Ragged rows are padded with `CellKind::Floor` up to the widest row; an open
    /// padded area is caught later by the enclosure check in `Puzzle::new`.
    ///
    /// # Errors
    /// * `MapError::EmptyGrid` if there are no cells at all.
    /// * `MapError::NonPositiveWeight` if any weight is zero.
    pub fn new(rows: Vec<Vec<CellKind>>, weights: Vec<u32>) -> Result<Self, MapError> {
        let height = rows.len();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(MapError::EmptyGrid);
        }
        if let Some(index) = weights.iter().position(|&w| w == 0) {
            return Err(MapError::NonPositiveWeight { index });
        }

        let mut cells = Vec::with_capacity(height * width);
        for mut row in rows {
            row.resize(width, CellKind::Floor);
            cells.extend(row);
        }
        let targets = (0..height)
            .flat_map(|r| (0..width).map(move |c| (r, c)))
            .filter(|&(r, c)| cells[r * width + c] == CellKind::Target)
            .collect();

        Ok(Map {
            height,
            width,
            cells,
            targets,
            weights,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the kind of the cell at `pos`.
    ///
    /// # Panics
    /// Panics if `pos` is outside the grid.
    pub fn cell_kind(&self, (r, c): Pos) -> CellKind {
        assert!(r < self.height && c < self.width, "cell ({r}, {c}) out of bounds");
        self.cells[r * self.width + c]
    }

    pub fn is_wall(&self, pos: Pos) -> bool {
        self.cell_kind(pos) == CellKind::Wall
    }

    pub fn is_target(&self, pos: Pos) -> bool {
        self.cell_kind(pos) == CellKind::Target
    }

    pub fn contains(&self, (r, c): Pos) -> bool {
        r < self.height && c < self.width
    }

    /// Target cells in row-major order.
    pub fn targets(&self) -> &[Pos] {
        &self.targets
    }

    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    pub fn weight(&self, stone: usize) -> u32 {
        self.weights[stone]
    }

    pub fn stone_count(&self) -> usize {
        self.weights.len()
    }

    /// Flood-fills the non-wall cells 4-connected to `start`, ignoring stones.
    ///
    /// Returns a row-major mask of the region, or the first region cell found on the
    /// grid edge. A region that never touches the edge is fully enclosed by walls,
    /// which is what keeps every reachable position strictly inside the grid.
    pub fn enclosed_region(&self, start: Pos) -> Result<Vec<bool>, Pos> {
        let mut region = vec![false; self.height * self.width];
        if self.is_wall(start) {
            return Ok(region);
        }
        let mut to_visit = vec![start];
        region[start.0 * self.width + start.1] = true;

        while let Some((r, c)) = to_visit.pop() {
            if r == 0 || c == 0 || r == self.height - 1 || c == self.width - 1 {
                return Err((r, c));
            }
            for direction in Direction::ALL {
                let next = direction.step((r, c));
                let idx = next.0 * self.width + next.1;
                if !region[idx] && self.cells[idx] != CellKind::Wall {
                    region[idx] = true;
                    to_visit.push(next);
                }
            }
        }
        Ok(region)
    }
}

/// Agent position plus stone positions, index-aligned with the map's weight vector.
///
/// Equality and hashing are structural and order-sensitive on stones, so states can
/// key visited tables directly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct State {
    agent: Pos,
    stones: Vec<Pos>,
}

impl State {
    pub fn new(agent: Pos, stones: Vec<Pos>) -> Self {
        State { agent, stones }
    }

    pub fn agent(&self) -> Pos {
        self.agent
    }

    pub fn stones(&self) -> &[Pos] {
        &self.stones
    }

    /// Index of the stone occupying `pos`, if any.
    pub fn stone_at(&self, pos: Pos) -> Option<usize> {
        self.stones.iter().position(|&s| s == pos)
    }

    /// A state is a goal when every stone sits on a target.
    pub fn is_goal(&self, map: &Map) -> bool {
        self.stones.iter().all(|&s| map.is_target(s))
    }
}

/// One legal transition out of a state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Successor {
    pub mv: Move,
    pub state: State,
    /// Incremental cost: 1 for a walk, `1 + weight` for a push.
    pub cost: u64,
}

/// Attempts to move the agent one cell in `direction`.
///
/// Returns `None` when the agent would walk into a wall, or when it would push a
/// stone into a wall or into another stone. Otherwise the returned successor is a
/// walk (cost 1) or a push of the stone in front of the agent (cost `1 + weight`),
/// with the pushed stone keeping its index.
pub fn step(map: &Map, state: &State, direction: Direction) -> Option<Successor> {
    let agent = direction.step(state.agent);
    if map.is_wall(agent) {
        return None;
    }

    match state.stone_at(agent) {
        None => Some(Successor {
            mv: Move {
                direction,
                pushed: None,
            },
            state: State {
                agent,
                stones: state.stones.clone(),
            },
            cost: 1,
        }),
        Some(index) => {
            let stone = direction.step(agent);
            if map.is_wall(stone) || state.stone_at(stone).is_some() {
                return None;
            }
            let mut stones = state.stones.clone();
            stones[index] = stone;
            Some(Successor {
                mv: Move {
                    direction,
                    pushed: Some(index),
                },
                state: State { agent, stones },
                cost: 1 + u64::from(map.weight(index)),
            })
        }
    }
}

/// Enumerates the legal successors of `state` in `Direction::ALL` order.
///
/// With `prune_deadlocks` set, pushes that leave the pushed stone in a corner
/// deadlock are dropped before they reach any frontier.
pub fn successors(map: &Map, state: &State, prune_deadlocks: bool) -> Vec<Successor> {
    Direction::ALL
        .iter()
        .filter_map(|&direction| step(map, state, direction))
        .filter(|succ| match succ.mv.pushed {
            Some(index) if prune_deadlocks => {
                !is_corner_deadlock(map, succ.state.stones[index], &succ.state.stones)
            }
            _ => true,
        })
        .collect()
}

/// Failure to re-execute a move label sequence.
///
/// The transition generator never produces these; seeing one means either the
/// input path is foreign or the engine is broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("move {index}: '{label}' is not a move label")]
    InvalidLabel { index: usize, label: char },
    #[error("move {index}: '{label}' is blocked by a wall or an immovable stone")]
    Blocked { index: usize, label: char },
    #[error("move {index}: '{label}' walks but actually pushes a stone")]
    UnexpectedPush { index: usize, label: char },
    #[error("move {index}: '{label}' claims a push but no stone is in front of the agent")]
    MissingPush { index: usize, label: char },
}

/// The outcome of replaying a label string against a puzzle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replay {
    /// Every state visited, starting with the initial state.
    pub states: Vec<State>,
    /// Cumulative cost after each move.
    pub cost_trace: Vec<u64>,
    pub total_cost: u64,
}

impl Replay {
    pub fn final_state(&self) -> &State {
        // `states` always holds at least the initial state.
        &self.states[self.states.len() - 1]
    }
}

/// Parameters for `Puzzle::new_random_with_seed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomPuzzleParams {
    /// Grid height including the wall border.
    pub height: usize,
    /// Grid width including the wall border.
    pub width: usize,
    pub stones: usize,
    /// Weights are drawn uniformly from `1..=max_weight`.
    pub max_weight: u32,
    /// Number of random reverse moves applied to the solved position.
    pub scramble_moves: usize,
}

impl Default for RandomPuzzleParams {
    fn default() -> Self {
        RandomPuzzleParams {
            height: 7,
            width: 7,
            stones: 2,
            max_weight: 5,
            scramble_moves: 60,
        }
    }
}

/// A validated map together with its initial state.
///
/// # Examples
/// ```
/// use weighted_sokoban::utils::puzzle_from_str;
///
/// let puzzle = puzzle_from_str("1\n######\n#@$ .#\n######").unwrap();
/// assert_eq!(puzzle.initial_state().agent(), (1, 1));
/// assert_eq!(puzzle.initial_state().stones(), &[(1, 2)]);
/// assert!(!puzzle.is_solved());
///
/// let replay = puzzle.replay("RR").unwrap();
/// assert!(replay.final_state().is_goal(puzzle.map()));
/// assert_eq!(replay.total_cost, 4);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Puzzle {
    map: Map,
    initial: State,
}

impl Puzzle {
    /// Validates the initial placement against the map and builds the puzzle.
    ///
    /// Stones are indexed in the order given, which must match the weight order.
    ///
    /// # Errors
    /// Returns a `MapError` when counts disagree (stones vs weights vs targets), when
    /// the agent or a stone is outside the grid, on a wall, or overlapping, when the
    /// area reachable from the agent is not enclosed by walls, or when a stone lies
    /// outside that area.
    pub fn new(map: Map, agent: Pos, stones: Vec<Pos>) -> Result<Self, MapError> {
        if stones.len() != map.stone_count() {
            return Err(MapError::WeightCountMismatch {
                stones: stones.len(),
                weights: map.stone_count(),
            });
        }
        if stones.len() != map.targets().len() {
            return Err(MapError::TargetCountMismatch {
                stones: stones.len(),
                targets: map.targets().len(),
            });
        }

        for (i, &pos) in std::iter::once(&agent).chain(stones.iter()).enumerate() {
            let (row, col) = pos;
            if !map.contains(pos) {
                return Err(MapError::OutOfBounds { row, col });
            }
            if map.is_wall(pos) {
                return Err(MapError::OnWall { row, col });
            }
            if i > 0 && stones[..i - 1].contains(&pos) {
                return Err(MapError::OverlappingStones { row, col });
            }
        }
        if stones.contains(&agent) {
            return Err(MapError::AgentOnStone {
                row: agent.0,
                col: agent.1,
            });
        }
        let region = match map.enclosed_region(agent) {
            Ok(region) => region,
            Err((row, col)) => return Err(MapError::OpenBoundary { row, col }),
        };
        if let Some(&(row, col)) = stones.iter().find(|&&(r, c)| !region[r * map.width() + c]) {
            return Err(MapError::StoneOutsideRegion { row, col });
        }

        Ok(Puzzle {
            map,
            initial: State::new(agent, stones),
        })
    }

    /// Creates a solvable puzzle from a seed.
    ///
    /// The grid is an open room bordered by walls. Stones start on randomly chosen
    /// targets and the agent then makes `scramble_moves` random reverse moves, pulling
    /// a stone along when one sits behind it. Every pull undoes a legal push, so the
    /// scrambled position can always be solved. The same seed and parameters always
    /// produce the same puzzle.
    ///
    /// # Panics
    /// Panics if the room interior has fewer than `stones + 1` cells or `max_weight` is 0.
    pub fn new_random_with_seed(seed: u64, params: RandomPuzzleParams) -> Self {
        let RandomPuzzleParams {
            height,
            width,
            stones: stone_count,
            max_weight,
            scramble_moves,
        } = params;
        let interior = height.saturating_sub(2) * width.saturating_sub(2);
        assert!(
            interior > stone_count,
            "room interior of {interior} cells cannot hold {stone_count} stones and an agent"
        );
        assert!(max_weight > 0, "max_weight must be positive");

        let mut rng = SmallRng::seed_from_u64(seed);
        let mut free: Vec<Pos> = (1..height - 1)
            .flat_map(|r| (1..width - 1).map(move |c| (r, c)))
            .collect();
        free.shuffle(&mut rng);
        let targets = &free[..stone_count];
        let mut agent = free[stone_count];
        let mut stones = targets.to_vec();

        let rows = (0..height)
            .map(|r| {
                (0..width)
                    .map(|c| {
                        if r == 0 || c == 0 || r == height - 1 || c == width - 1 {
                            CellKind::Wall
                        } else if targets.contains(&(r, c)) {
                            CellKind::Target
                        } else {
                            CellKind::Floor
                        }
                    })
                    .collect()
            })
            .collect();
        let weights = (0..stone_count)
            .map(|_| rng.gen_range(1..=max_weight))
            .collect();

        let map = match Map::new(rows, weights) {
            Ok(map) => map,
            Err(e) => unreachable!("generated map is always well formed: {e}"),
        };

        for _ in 0..scramble_moves {
            let direction = Direction::ALL[rng.gen_range(0..4)];
            let next = direction.step(agent);
            if map.is_wall(next) || stones.contains(&next) {
                continue;
            }
            let behind = direction.opposite().step(agent);
            if let Some(index) = stones.iter().position(|&s| s == behind) {
                if rng.gen_bool(0.7) {
                    stones[index] = agent;
                }
            }
            agent = next;
        }

        match Puzzle::new(map, agent, stones) {
            Ok(puzzle) => puzzle,
            Err(e) => unreachable!("scrambled puzzle is always valid: {e}"),
        }
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn initial_state(&self) -> &State {
        &self.initial
    }

    /// Returns `true` if every stone already sits on a target.
    pub fn is_solved(&self) -> bool {
        self.initial.is_goal(&self.map)
    }

    /// Re-executes a move label string from the initial state.
    ///
    /// Each label must match what the transition generator would do from the current
    /// state: lowercase for a walk, uppercase for a push. Whitespace is ignored.
    ///
    /// # Errors
    /// Returns a `ReplayError` naming the first offending move.
    pub fn replay(&self, labels: &str) -> Result<Replay, ReplayError> {
        let mut states = vec![self.initial.clone()];
        let mut cost_trace = Vec::new();
        let mut total_cost = 0;

        for (index, label) in labels.chars().filter(|ch| !ch.is_whitespace()).enumerate() {
            let (direction, claims_push) =
                Direction::from_label(label).ok_or(ReplayError::InvalidLabel { index, label })?;
            let current = &states[states.len() - 1];
            let succ = step(&self.map, current, direction)
                .ok_or(ReplayError::Blocked { index, label })?;
            match (claims_push, succ.mv.is_push()) {
                (false, true) => return Err(ReplayError::UnexpectedPush { index, label }),
                (true, false) => return Err(ReplayError::MissingPush { index, label }),
                _ => {}
            }
            total_cost += succ.cost;
            cost_trace.push(total_cost);
            states.push(succ.state);
        }

        Ok(Replay {
            states,
            cost_trace,
            total_cost,
        })
    }
}

impl fmt::Display for Puzzle {
    /// Formats the initial state in the map legend.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::utils::render_state(&self.map, &self.initial))
    }
}
