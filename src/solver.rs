//! Search strategies over the weighted Sokoban state graph.
//!
//! All strategies share one transition generator (`engine::successors`), one
//! bookkeeping context and one result type. They differ only in frontier discipline
//! and in how they deduplicate states:
//!
//! | Strategy | Frontier | Deduplication | Cost-optimal |
//! |---|---|---|---|
//! | `Bfs`  | FIFO queue | re-admit a state when reached strictly cheaper | no |
//! | `Dfs`  | stack | skip states already expanded | no |
//! | `Ucs`  | min-heap on cost | finalize on first pop | yes |
//! | `AStar`| min-heap on cost + `doubled_weighted_manhattan` / 2 | re-admit when strictly cheaper | no (heuristic not admissible) |
//! | `Gbfs` | min-heap on cost + `greedy_weighted_manhattan` | skip states already expanded | no |
//!
//! Heap ties are broken by insertion order, and successors are generated in
//! `Direction::ALL` order, so every strategy is deterministic.
use crate::engine::{successors, Map, Move, Puzzle, State, Successor};
use crate::heuristics::{doubled_weighted_manhattan, greedy_weighted_manhattan};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::mem::size_of;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, trace};

/// How often (in expansions) frontier progress is logged at trace level.
const PROGRESS_INTERVAL: u64 = 100_000;

/// The interchangeable search strategies.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Breadth-first search with cost relaxation.
    Bfs,
    /// Depth-first search.
    Dfs,
    /// Uniform-cost search (Dijkstra).
    Ucs,
    /// A* with the weighted Manhattan heuristic.
    #[value(name = "astar", alias = "a*")]
    #[serde(alias = "a*")]
    AStar,
    /// Greedy best-first search with the squared-weight heuristic.
    Gbfs,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Bfs,
        Strategy::Dfs,
        Strategy::Ucs,
        Strategy::AStar,
        Strategy::Gbfs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Bfs => "bfs",
            Strategy::Dfs => "dfs",
            Strategy::Ucs => "ucs",
            Strategy::AStar => "astar",
            Strategy::Gbfs => "gbfs",
        }
    }

    /// Whether the strategy filters corner deadlocks unless told otherwise.
    pub fn prunes_deadlocks_by_default(self) -> bool {
        matches!(self, Strategy::AStar)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown strategy '{0}' (expected bfs, dfs, ucs, astar or gbfs)")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    /// Parses a strategy name, case-insensitively. `a*` is accepted for A*.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bfs" => Ok(Strategy::Bfs),
            "dfs" => Ok(Strategy::Dfs),
            "ucs" => Ok(Strategy::Ucs),
            "astar" | "a*" => Ok(Strategy::AStar),
            "gbfs" => Ok(Strategy::Gbfs),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

/// Bounds on a single search call. `None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_expansions: Option<u64>,
    pub time_limit: Option<Duration>,
}

/// Per-call search options.
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchOptions<'a> {
    pub limits: SearchLimits,
    /// Overrides `Strategy::prunes_deadlocks_by_default` when set.
    pub prune_deadlocks: Option<bool>,
    /// Cooperative cancellation flag, polled once per expansion.
    pub cancel: Option<&'a AtomicBool>,
}

/// Why a search stopped before reaching a goal or exhausting its frontier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    ExpansionBudget,
    TimeLimit,
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::ExpansionBudget => write!(f, "expansion budget exhausted"),
            AbortReason::TimeLimit => write!(f, "time limit reached"),
            AbortReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Telemetry of one search call, reported on every outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Nodes whose successors were generated.
    pub nodes_expanded: u64,
    /// Nodes inserted into the frontier, the initial node included.
    pub nodes_generated: u64,
    /// Largest frontier size observed.
    pub peak_frontier: usize,
    /// Entries in the visited/reached table when the search ended.
    pub states_reached: usize,
    pub elapsed: Duration,
    /// Estimated peak size of the frontier, reached table and search tree.
    pub approx_peak_memory_bytes: usize,
}

/// A path from the initial state to a goal state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Solution {
    pub strategy: Strategy,
    /// Number of moves in the path.
    pub steps: usize,
    pub total_cost: u64,
    /// Move labels: lowercase walks, uppercase pushes.
    pub path: String,
    pub moves: Vec<Move>,
    /// Cumulative cost after each move.
    pub cost_trace: Vec<u64>,
    pub final_state: State,
    pub stats: SearchStats,
}

/// The result of a search call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    Solved(Solution),
    /// The frontier ran dry without reaching a goal.
    NoSolution(SearchStats),
    Aborted {
        reason: AbortReason,
        stats: SearchStats,
    },
}

impl SearchOutcome {
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SearchOutcome::Solved(solution) => Some(solution),
            _ => None,
        }
    }

    pub fn into_solution(self) -> Option<Solution> {
        match self {
            SearchOutcome::Solved(solution) => Some(solution),
            _ => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, SearchOutcome::Solved(_))
    }

    pub fn stats(&self) -> &SearchStats {
        match self {
            SearchOutcome::Solved(solution) => &solution.stats,
            SearchOutcome::NoSolution(stats) => stats,
            SearchOutcome::Aborted { stats, .. } => stats,
        }
    }
}

/// Searches `puzzle` with `strategy`.
///
/// An already solved puzzle returns a zero-length solution at once, whatever the
/// strategy. Each call owns its frontier, visited table and counters, so several
/// calls may run concurrently on the same `Puzzle`.
///
/// # Examples
/// ```
/// use weighted_sokoban::solver::{solve, SearchOptions, Strategy};
/// use weighted_sokoban::utils::puzzle_from_str;
///
/// let puzzle = puzzle_from_str("1\n######\n#@$ .#\n######").unwrap();
/// let outcome = solve(&puzzle, Strategy::Ucs, &SearchOptions::default());
/// let solution = outcome.solution().unwrap();
/// assert_eq!(solution.path, "RR");
/// assert_eq!(solution.total_cost, 4);
/// ```
pub fn solve(puzzle: &Puzzle, strategy: Strategy, options: &SearchOptions<'_>) -> SearchOutcome {
    let mut ctx = SearchContext::new(puzzle, strategy, options);
    debug!(
        strategy = %strategy,
        stones = puzzle.map().stone_count(),
        prune_deadlocks = ctx.prune_deadlocks,
        max_expansions = ?options.limits.max_expansions,
        time_limit = ?options.limits.time_limit,
        "search started"
    );

    if puzzle.is_solved() {
        let root = ctx.root();
        return ctx.solved(root, 1);
    }

    match strategy {
        Strategy::Bfs => breadth_first(ctx),
        Strategy::Dfs => depth_first(ctx),
        Strategy::Ucs => uniform_cost(ctx),
        Strategy::AStar => a_star(ctx),
        Strategy::Gbfs => greedy_best_first(ctx),
    }
}

/// A frontier entry. Owns its state by value; the path lives in the search tree.
#[derive(Clone, Debug)]
struct Node {
    state: State,
    cost: u64,
    id: usize,
}

/// One edge of the search tree, indexed by `Node::id`.
#[derive(Clone, Copy, Debug)]
struct TreeEntry {
    parent: usize,
    mv: Option<Move>,
    cost: u64,
}

/// Heap entry ordered so that `BinaryHeap` pops the lowest priority first and,
/// among equal priorities, the earliest inserted.
struct Prioritized {
    priority: u64,
    seq: u64,
    node: Node,
}

impl PartialEq for Prioritized {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Prioritized {}

impl Ord for Prioritized {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Prioritized {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A stable min-priority queue of nodes.
#[derive(Default)]
struct PriorityFrontier {
    heap: BinaryHeap<Prioritized>,
    seq: u64,
}

impl PriorityFrontier {
    fn push(&mut self, priority: u64, node: Node) {
        self.heap.push(Prioritized {
            priority,
            seq: self.seq,
            node,
        });
        self.seq += 1;
    }

    fn pop(&mut self) -> Option<Node> {
        self.heap.pop().map(|entry| entry.node)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Bookkeeping shared by all strategies for the duration of one call.
struct SearchContext<'a> {
    puzzle: &'a Puzzle,
    strategy: Strategy,
    limits: SearchLimits,
    cancel: Option<&'a AtomicBool>,
    prune_deadlocks: bool,
    started: Instant,
    tree: Vec<TreeEntry>,
    nodes_expanded: u64,
    nodes_generated: u64,
    peak_frontier: usize,
}

impl<'a> SearchContext<'a> {
    fn new(puzzle: &'a Puzzle, strategy: Strategy, options: &SearchOptions<'a>) -> Self {
        SearchContext {
            puzzle,
            strategy,
            limits: options.limits,
            cancel: options.cancel,
            prune_deadlocks: options
                .prune_deadlocks
                .unwrap_or_else(|| strategy.prunes_deadlocks_by_default()),
            started: Instant::now(),
            tree: Vec::new(),
            nodes_expanded: 0,
            nodes_generated: 0,
            peak_frontier: 0,
        }
    }

    fn map(&self) -> &'a Map {
        self.puzzle.map()
    }

    fn root(&mut self) -> Node {
        debug_assert!(self.tree.is_empty(), "root created twice");
        self.tree.push(TreeEntry {
            parent: 0,
            mv: None,
            cost: 0,
        });
        self.nodes_generated += 1;
        self.peak_frontier = self.peak_frontier.max(1);
        Node {
            state: self.puzzle.initial_state().clone(),
            cost: 0,
            id: 0,
        }
    }

    /// Records `succ` as a child of `parent` and returns the new frontier node.
    fn child(&mut self, parent: &Node, succ: Successor) -> Node {
        let cost = parent.cost + succ.cost;
        let id = self.tree.len();
        self.tree.push(TreeEntry {
            parent: parent.id,
            mv: Some(succ.mv),
            cost,
        });
        self.nodes_generated += 1;
        Node {
            state: succ.state,
            cost,
            id,
        }
    }

    /// Returns the first limit that has been hit, if any. Called once per expansion.
    fn limit_reached(&self) -> Option<AbortReason> {
        if self
            .cancel
            .is_some_and(|flag| flag.load(AtomicOrdering::Relaxed))
        {
            return Some(AbortReason::Cancelled);
        }
        if self
            .limits
            .time_limit
            .is_some_and(|limit| self.started.elapsed() >= limit)
        {
            return Some(AbortReason::TimeLimit);
        }
        if self
            .limits
            .max_expansions
            .is_some_and(|max| self.nodes_expanded >= max)
        {
            return Some(AbortReason::ExpansionBudget);
        }
        None
    }

    fn expand(&mut self, node: &Node) -> Vec<Successor> {
        self.nodes_expanded += 1;
        if self.nodes_expanded % PROGRESS_INTERVAL == 0 {
            trace!(
                strategy = %self.strategy,
                expanded = self.nodes_expanded,
                generated = self.nodes_generated,
                cost = node.cost,
                "search progress"
            );
        }
        successors(self.map(), &node.state, self.prune_deadlocks)
    }

    fn observe_frontier(&mut self, len: usize) {
        self.peak_frontier = self.peak_frontier.max(len);
    }

    fn stats(&self, states_reached: usize) -> SearchStats {
        let state_bytes = size_of::<State>() + self.map().stone_count() * size_of::<(usize, usize)>();
        let approx_peak_memory_bytes = self.tree.len() * size_of::<TreeEntry>()
            + self.peak_frontier * (size_of::<Prioritized>() + state_bytes)
            + states_reached * (state_bytes + size_of::<u64>());
        SearchStats {
            nodes_expanded: self.nodes_expanded,
            nodes_generated: self.nodes_generated,
            peak_frontier: self.peak_frontier,
            states_reached,
            elapsed: self.started.elapsed(),
            approx_peak_memory_bytes,
        }
    }

    /// Walks the tree from `id` back to the root.
    fn path_to(&self, mut id: usize) -> (Vec<Move>, Vec<u64>) {
        let mut moves = Vec::new();
        let mut cost_trace = Vec::new();
        while let Some(mv) = self.tree[id].mv {
            moves.push(mv);
            cost_trace.push(self.tree[id].cost);
            id = self.tree[id].parent;
        }
        moves.reverse();
        cost_trace.reverse();
        (moves, cost_trace)
    }

    fn solved(self, node: Node, states_reached: usize) -> SearchOutcome {
        let (moves, cost_trace) = self.path_to(node.id);
        let stats = self.stats(states_reached);
        debug_assert_eq!(cost_trace.last().copied().unwrap_or(0), node.cost);
        info!(
            strategy = %self.strategy,
            steps = moves.len(),
            total_cost = node.cost,
            expanded = stats.nodes_expanded,
            generated = stats.nodes_generated,
            elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0,
            "solution found"
        );
        SearchOutcome::Solved(Solution {
            strategy: self.strategy,
            steps: moves.len(),
            total_cost: node.cost,
            path: moves.iter().map(Move::label).collect(),
            moves,
            cost_trace,
            final_state: node.state,
            stats,
        })
    }

    fn exhausted(self, states_reached: usize) -> SearchOutcome {
        let stats = self.stats(states_reached);
        info!(
            strategy = %self.strategy,
            expanded = stats.nodes_expanded,
            states = states_reached,
            "frontier exhausted without a solution"
        );
        SearchOutcome::NoSolution(stats)
    }

    fn aborted(self, reason: AbortReason, states_reached: usize) -> SearchOutcome {
        let stats = self.stats(states_reached);
        info!(
            strategy = %self.strategy,
            %reason,
            expanded = stats.nodes_expanded,
            "search aborted"
        );
        SearchOutcome::Aborted { reason, stats }
    }
}

/// FIFO search that re-admits a state whenever it is reached strictly cheaper.
///
/// The first goal dequeued is returned. A state can be dequeued before a cheaper
/// route to it turns up later in FIFO order, so the returned cost is not guaranteed
/// to be minimal.
fn breadth_first(mut ctx: SearchContext<'_>) -> SearchOutcome {
    let root = ctx.root();
    let mut best: HashMap<State, u64> = HashMap::new();
    best.insert(root.state.clone(), 0);
    let mut queue = VecDeque::from([root]);

    while let Some(node) = queue.pop_front() {
        if node.state.is_goal(ctx.map()) {
            return ctx.solved(node, best.len());
        }
        if let Some(reason) = ctx.limit_reached() {
            return ctx.aborted(reason, best.len());
        }
        for succ in ctx.expand(&node) {
            let cost = node.cost + succ.cost;
            if best.get(&succ.state).map_or(true, |&seen| cost < seen) {
                best.insert(succ.state.clone(), cost);
                queue.push_back(ctx.child(&node, succ));
            }
        }
        ctx.observe_frontier(queue.len());
    }
    ctx.exhausted(best.len())
}

/// LIFO search; each state is expanded at most once. The last generated direction
/// is explored first.
fn depth_first(mut ctx: SearchContext<'_>) -> SearchOutcome {
    let root = ctx.root();
    let mut visited: HashSet<State> = HashSet::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if node.state.is_goal(ctx.map()) {
            return ctx.solved(node, visited.len());
        }
        if !visited.insert(node.state.clone()) {
            continue;
        }
        if let Some(reason) = ctx.limit_reached() {
            return ctx.aborted(reason, visited.len());
        }
        for succ in ctx.expand(&node) {
            if !visited.contains(&succ.state) {
                stack.push(ctx.child(&node, succ));
            }
        }
        ctx.observe_frontier(stack.len());
    }
    ctx.exhausted(visited.len())
}

/// Dijkstra over the move graph. All move costs are at least 1, so the first goal
/// popped has minimum total cost.
fn uniform_cost(mut ctx: SearchContext<'_>) -> SearchOutcome {
    let root = ctx.root();
    let mut finalized: HashMap<State, u64> = HashMap::new();
    let mut frontier = PriorityFrontier::default();
    frontier.push(0, root);

    while let Some(node) = frontier.pop() {
        if node.state.is_goal(ctx.map()) {
            return ctx.solved(node, finalized.len());
        }
        if finalized
            .get(&node.state)
            .is_some_and(|&cost| cost <= node.cost)
        {
            continue;
        }
        finalized.insert(node.state.clone(), node.cost);
        if let Some(reason) = ctx.limit_reached() {
            return ctx.aborted(reason, finalized.len());
        }
        for succ in ctx.expand(&node) {
            if !finalized.contains_key(&succ.state) {
                let child = ctx.child(&node, succ);
                frontier.push(child.cost, child);
            }
        }
        ctx.observe_frontier(frontier.len());
    }
    ctx.exhausted(finalized.len())
}

/// The A* heap key: `cost + h` with `h` carrying an exact half, kept doubled.
fn a_star_priority(map: &Map, cost: u64, state: &State) -> u64 {
    2 * cost + doubled_weighted_manhattan(map, state)
}

/// Best-first search on `cost + h`, re-admitting a state when it is reached strictly
/// cheaper. Stale heap entries are skipped on pop.
fn a_star(mut ctx: SearchContext<'_>) -> SearchOutcome {
    let root = ctx.root();
    let map = ctx.map();
    let mut reached: HashMap<State, u64> = HashMap::new();
    reached.insert(root.state.clone(), 0);
    let mut frontier = PriorityFrontier::default();
    frontier.push(a_star_priority(map, 0, &root.state), root);

    while let Some(node) = frontier.pop() {
        if node.state.is_goal(map) {
            return ctx.solved(node, reached.len());
        }
        if reached
            .get(&node.state)
            .is_some_and(|&best| node.cost > best)
        {
            continue;
        }
        if let Some(reason) = ctx.limit_reached() {
            return ctx.aborted(reason, reached.len());
        }
        for succ in ctx.expand(&node) {
            let cost = node.cost + succ.cost;
            if reached.get(&succ.state).map_or(true, |&best| cost < best) {
                reached.insert(succ.state.clone(), cost);
                let priority = a_star_priority(map, cost, &succ.state);
                frontier.push(priority, ctx.child(&node, succ));
            }
        }
        ctx.observe_frontier(frontier.len());
    }
    ctx.exhausted(reached.len())
}

/// Best-first search on `cost + greedy_weighted_manhattan`; each state is expanded
/// at most once.
fn greedy_best_first(mut ctx: SearchContext<'_>) -> SearchOutcome {
    let root = ctx.root();
    let map = ctx.map();
    let mut visited: HashSet<State> = HashSet::new();
    let mut frontier = PriorityFrontier::default();
    frontier.push(greedy_weighted_manhattan(map, &root.state), root);

    while let Some(node) = frontier.pop() {
        if node.state.is_goal(map) {
            return ctx.solved(node, visited.len());
        }
        if !visited.insert(node.state.clone()) {
            continue;
        }
        if let Some(reason) = ctx.limit_reached() {
            return ctx.aborted(reason, visited.len());
        }
        for succ in ctx.expand(&node) {
            if !visited.contains(&succ.state) {
                let priority = node.cost + succ.cost + greedy_weighted_manhattan(map, &succ.state);
                frontier.push(priority, ctx.child(&node, succ));
            }
        }
        ctx.observe_frontier(frontier.len());
    }
    ctx.exhausted(visited.len())
}
