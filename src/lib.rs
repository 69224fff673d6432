//! # Weighted Sokoban Solver Library
//!
//! This library models Sokoban puzzles in which every stone carries a weight, and
//! searches them with five interchangeable strategies (BFS, DFS, UCS, A* and greedy
//! best-first). Walking costs 1 per step; pushing stone `i` costs `1 + weight[i]`.
//!
//! It is used by two binaries:
//! - `solve`: Loads a puzzle file, runs one strategy and prints the path, its cost
//!   and search statistics (optionally as JSON).
//! - `strategy_evaluator`: Runs every strategy over a batch of seeded random puzzles
//!   and compares cost and effort.
//!
//! ## Modules
//! - `engine`: The map (`Map`), search state (`State`), the move rules and transition
//!   generator, validated puzzles (`Puzzle`), replay and the random generator.
//! - `heuristics`: Distance estimates for A* and greedy search, and the corner
//!   deadlock test.
//! - `solver`: The `solve` entry point, strategies, limits and search outcomes.
//! - `config`: TOML solver configuration.
//! - `utils`: Text parsing (`puzzle_from_str`) and rendering.

pub mod config;
pub mod engine;
pub mod heuristics;
pub mod solver;
pub mod utils;
