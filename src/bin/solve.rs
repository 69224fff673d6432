use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use weighted_sokoban::config::SolverConfig;
use weighted_sokoban::engine::{Puzzle, State};
use weighted_sokoban::solver::{solve, SearchOptions, SearchOutcome, Strategy};
use weighted_sokoban::utils::{puzzle_from_str, render_state, render_state_colored};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Search strategy (defaults to ucs)
    #[clap(short, long, value_enum)]
    strategy: Option<Strategy>,

    /// TOML solver configuration; command line flags take precedence
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Abort after this many node expansions
    #[clap(long)]
    max_expansions: Option<u64>,

    /// Abort after this many milliseconds
    #[clap(long)]
    time_limit_ms: Option<u64>,

    /// Force corner deadlock pruning on or off
    #[clap(long)]
    prune_deadlocks: Option<bool>,

    /// Print the result as JSON
    #[clap(long)]
    json: bool,

    /// Render states with ANSI colours
    #[clap(long)]
    color: bool,

    /// Path to the puzzle file (weight line followed by the grid)
    puzzle_file: PathBuf,
}

fn read_puzzle_file(path: &PathBuf) -> Result<Puzzle> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    puzzle_from_str(&content).with_context(|| format!("invalid puzzle in {}", path.display()))
}

fn load_config(args: &Args) -> Result<SolverConfig> {
    let mut config = match &args.config {
        Some(path) => SolverConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SolverConfig::default(),
    };
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(strategy);
    }
    if let Some(max) = args.max_expansions {
        config = config.with_max_expansions(max);
    }
    if let Some(millis) = args.time_limit_ms {
        config = config.with_time_limit_ms(millis);
    }
    if args.prune_deadlocks.is_some() {
        config.prune_deadlocks = args.prune_deadlocks;
    }
    Ok(config)
}

fn render(puzzle: &Puzzle, state: &State, color: bool) -> String {
    if color {
        render_state_colored(puzzle.map(), state)
    } else {
        render_state(puzzle.map(), state)
    }
}

fn print_json(outcome: &SearchOutcome) -> Result<()> {
    let report = match outcome {
        SearchOutcome::Solved(solution) => json!({ "outcome": "solved", "solution": solution }),
        SearchOutcome::NoSolution(stats) => json!({ "outcome": "no_solution", "stats": stats }),
        SearchOutcome::Aborted { reason, stats } => {
            json!({ "outcome": "aborted", "reason": reason, "stats": stats })
        }
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let puzzle = read_puzzle_file(&args.puzzle_file)?;
    let strategy = config.strategy();
    let options = SearchOptions {
        limits: config.search_limits(),
        prune_deadlocks: config.prune_deadlocks,
        cancel: None,
    };

    if !args.json {
        println!("Loaded puzzle from {}\n", args.puzzle_file.display());
        println!("Stone weights: {:?}", puzzle.map().weights());
        println!("Initial state:\n{}\n", render(&puzzle, puzzle.initial_state(), args.color));
        println!("Searching with {}...\n", strategy);
    }

    let outcome = solve(&puzzle, strategy, &options);

    if args.json {
        print_json(&outcome)?;
    } else {
        match &outcome {
            SearchOutcome::Solved(solution) => {
                println!("Solution found:\n");
                if solution.path.is_empty() {
                    println!("  Already solved, no moves needed.");
                } else {
                    println!("Path ({} moves): {}", solution.steps, solution.path);
                }
                println!("Total cost: {}", solution.total_cost);
                println!("Final state:\n{}\n", render(&puzzle, &solution.final_state, args.color));
            }
            SearchOutcome::NoSolution(_) => println!("No solution exists.\n"),
            SearchOutcome::Aborted { reason, .. } => println!("Search aborted: {}.\n", reason),
        }
        let stats = outcome.stats();
        println!("Nodes expanded:  {}", stats.nodes_expanded);
        println!("Nodes generated: {}", stats.nodes_generated);
        println!("Peak frontier:   {}", stats.peak_frontier);
        println!("States reached:  {}", stats.states_reached);
        println!(
            "Approx. memory:  {:.1} KiB",
            stats.approx_peak_memory_bytes as f64 / 1024.0
        );
        println!("Elapsed:         {:.3} ms", stats.elapsed.as_secs_f64() * 1000.0);
    }

    match outcome {
        SearchOutcome::Solved(_) => Ok(()),
        SearchOutcome::NoSolution(_) => bail!("no solution"),
        SearchOutcome::Aborted { reason, .. } => bail!("search aborted: {}", reason),
    }
}
