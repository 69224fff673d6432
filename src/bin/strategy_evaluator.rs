use std::collections::HashMap;
use tracing_subscriber::EnvFilter;
use weighted_sokoban::engine::{Puzzle, RandomPuzzleParams};
use weighted_sokoban::solver::{solve, SearchLimits, SearchOptions, SearchOutcome, Strategy};

const NUM_RANDOM_PUZZLES_FOR_EVALUATION: usize = 20;
const START_SEED: u64 = 0;
const MAX_EXPANSIONS: u64 = 200_000;

#[derive(Default)]
struct Tally {
    solved: usize,
    no_solution: usize,
    aborted: usize,
    costs: Vec<u64>,
    expanded: Vec<u64>,
}

fn average(values: &[u64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<u64>() as f64 / values.len() as f64
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let params = RandomPuzzleParams::default();
    let options = SearchOptions {
        limits: SearchLimits {
            max_expansions: Some(MAX_EXPANSIONS),
            time_limit: None,
        },
        ..SearchOptions::default()
    };

    let mut tallies: HashMap<Strategy, Tally> = HashMap::new();

    println!(
        "Starting strategy evaluation for {} puzzles ({}x{}, {} stones, weights 1..={})...",
        NUM_RANDOM_PUZZLES_FOR_EVALUATION,
        params.height,
        params.width,
        params.stones,
        params.max_weight
    );

    for puzzle_idx in 0..NUM_RANDOM_PUZZLES_FOR_EVALUATION {
        let seed = START_SEED + puzzle_idx as u64;
        let puzzle = Puzzle::new_random_with_seed(seed, params);

        println!("\nEvaluating Puzzle {} (Seed: {})\n{}", puzzle_idx, seed, puzzle);

        for strategy in Strategy::ALL {
            let outcome = solve(&puzzle, strategy, &options);
            let tally = tallies.entry(strategy).or_default();
            tally.expanded.push(outcome.stats().nodes_expanded);
            match &outcome {
                SearchOutcome::Solved(solution) => {
                    tally.solved += 1;
                    tally.costs.push(solution.total_cost);
                    println!(
                        "  Strategy: {:<6}, Cost: {:<6}, Steps: {:<5}, Expanded: {}",
                        strategy,
                        solution.total_cost,
                        solution.steps,
                        solution.stats.nodes_expanded
                    );
                }
                SearchOutcome::NoSolution(stats) => {
                    tally.no_solution += 1;
                    println!(
                        "  Strategy: {:<6}, no solution, Expanded: {}",
                        strategy, stats.nodes_expanded
                    );
                }
                SearchOutcome::Aborted { reason, stats } => {
                    tally.aborted += 1;
                    println!(
                        "  Strategy: {:<6}, {}, Expanded: {}",
                        strategy, reason, stats.nodes_expanded
                    );
                }
            }
        }
    }

    println!("\n--- Evaluation Complete ---");
    println!("Number of puzzles evaluated: {}", NUM_RANDOM_PUZZLES_FOR_EVALUATION);
    println!("Expansion budget per search: {}", MAX_EXPANSIONS);
    println!("\n--- Summary (sorted by average cost) ---");

    let mut rows: Vec<(Strategy, &Tally)> = Strategy::ALL
        .iter()
        .filter_map(|s| tallies.get(s).map(|t| (*s, t)))
        .collect();
    rows.sort_by(|a, b| {
        average(&a.1.costs)
            .partial_cmp(&average(&b.1.costs))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for (strategy, tally) in rows {
        println!(
            "Strategy {:<6}: Solved = {:>2}, No solution = {:>2}, Aborted = {:>2}, Avg cost = {:>8.2}, Avg expanded = {:>10.1}",
            strategy,
            tally.solved,
            tally.no_solution,
            tally.aborted,
            average(&tally.costs),
            average(&tally.expanded)
        );
    }
}
