//! Headless empire tick runner.
//!
//! This binary runs world ticks without a game server. Each tick's events,
//! errors and metrics go to stdout as JSON lines; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Write a sample snapshot to start from
//! cargo run -p empire_headless -- sample --output skirmish.ron
//!
//! # Run 20 ship ticks with seed 7
//! cargo run -p empire_headless -- run --snapshot skirmish.ron --kind ship --ticks 20 --seed 7
//!
//! # Check that five runs agree tick by tick
//! cargo run -p empire_headless -- verify --snapshot skirmish.ron --runs 5
//!
//! # Sweep seeds 0..100 in parallel
//! cargo run -p empire_headless -- batch --snapshot skirmish.ron --seeds 0..100 --output results/
//! ```
//!
//! `RUST_LOG` overrides the log level picked by `--verbose`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use empire_core::tick::TickKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use empire_headless::{
    batch::{run_batch, BatchConfig},
    runner::{verify, HeadlessRunner, RunConfig},
    scenario::{load_config, load_snapshot, save_snapshot, ScenarioError},
};

#[derive(Parser)]
#[command(name = "empire_headless")]
#[command(about = "Headless world tick runner for CI and offline analysis")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every subcommand that runs ticks.
#[derive(Args, Clone)]
struct TickArgs {
    /// Snapshot file (RON, or JSON by extension)
    #[arg(short, long)]
    snapshot: PathBuf,

    /// Engine config (RON); defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tick kind: ship, movement, combat, planet, production, taxation, population
    #[arg(short, long, default_value = "ship")]
    kind: TickKind,

    /// Number of ticks to run
    #[arg(short, long, default_value = "10")]
    ticks: u64,

    /// Simulated seconds per tick (defaults to the kind's cadence)
    #[arg(long)]
    duration: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ticks, printing one JSON line per tick
    Run {
        #[command(flatten)]
        tick: TickArgs,

        /// Seed of the first tick; tick n uses seed + n
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Write the final snapshot here (RON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        #[command(flatten)]
        tick: TickArgs,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Run one snapshot under a range of seeds in parallel
    Batch {
        #[command(flatten)]
        tick: TickArgs,

        /// Seed range, end exclusive (e.g. 0..100)
        #[arg(long, default_value = "0..16")]
        seeds: SeedRange,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Write a sample snapshot to start from
    Sample {
        /// Output file (RON)
        #[arg(short, long, default_value = "skirmish.ron")]
        output: PathBuf,

        /// Player cruisers per side
        #[arg(long, default_value = "5")]
        ships_per_side: u32,
    },
}

/// Half-open seed range `start..end`.
#[derive(Debug, Clone, Copy)]
struct SeedRange {
    start: u64,
    end: u64,
}

impl FromStr for SeedRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once("..")
            .ok_or_else(|| format!("expected START..END, got '{s}'"))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|e| format!("bad seed '{part}': {e}"))
        };
        let range = Self {
            start: parse(start)?,
            end: parse(end)?,
        };
        if range.end < range.start {
            return Err(format!("empty seed range '{s}'"));
        }
        Ok(range)
    }
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr (stdout is for tick reports)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .init();

    let result = match cli.command {
        Commands::Run { tick, seed, output } => cmd_run(&tick, seed, output.as_deref()),
        Commands::Verify { tick, seed, runs } => cmd_verify(&tick, seed, runs),
        Commands::Batch {
            tick,
            seeds,
            parallel,
            output,
        } => cmd_batch(&tick, seeds, parallel, &output),
        Commands::Sample {
            output,
            ships_per_side,
        } => cmd_sample(&output, ships_per_side),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}

/// Load the snapshot and build the run config for `seed`.
fn prepare(
    args: &TickArgs,
    seed: u64,
) -> Result<(RunConfig, empire_core::snapshot::WorldSnapshot), ScenarioError> {
    let world = load_snapshot(&args.snapshot)?;
    let mut config = RunConfig::new(args.kind, args.ticks, seed);
    config.engine = load_config(args.config.as_deref())?;
    if let Some(duration) = args.duration {
        config.duration_secs = duration;
    }
    tracing::info!(
        snapshot = %args.snapshot.display(),
        kind = ?config.kind,
        ticks = config.ticks,
        duration_secs = config.duration_secs,
        seed,
        "Prepared run"
    );
    Ok((config, world))
}

/// Run ticks and print reports.
fn cmd_run(args: &TickArgs, seed: u64, output: Option<&Path>) -> Result<(), ScenarioError> {
    let (config, world) = prepare(args, seed)?;
    let mut runner = HeadlessRunner::new(config, world);
    let summary = runner.run()?;

    eprintln!(
        "Ran {} ticks: {} events, {} errors, {} ships destroyed, {} overruns",
        summary.ticks, summary.events, summary.errors, summary.destroyed_ships, summary.overruns
    );
    eprintln!("Final state hash: {:016x}", summary.final_hash);

    if let Some(path) = output {
        save_snapshot(runner.world(), path)?;
        eprintln!("Final snapshot written to {}", path.display());
    }
    Ok(())
}

/// Verify determinism.
fn cmd_verify(args: &TickArgs, seed: u64, runs: u32) -> Result<(), ScenarioError> {
    let (config, world) = prepare(args, seed)?;
    let report = verify(&config, &world, runs)?;

    if report.deterministic {
        eprintln!(
            "PASS: {} runs of {} ticks produced identical deltas",
            report.runs,
            report.hashes.len()
        );
        if let Some(last) = report.hashes.last() {
            eprintln!("Last delta hash: {last:016x}");
        }
        Ok(())
    } else {
        eprintln!(
            "FAIL: runs diverged at tick {}",
            report.first_divergence.unwrap_or_default()
        );
        std::process::exit(1);
    }
}

/// Sweep seeds and save results.
fn cmd_batch(
    args: &TickArgs,
    seeds: SeedRange,
    parallel: u32,
    output: &Path,
) -> Result<(), ScenarioError> {
    let (run, world) = prepare(args, seeds.start)?;
    std::fs::create_dir_all(output)?;

    let config = BatchConfig {
        run,
        seed_start: seeds.start,
        seed_end: seeds.end,
        parallel,
    };
    let results = run_batch(&world, &config);

    let results_path = output.join("batch_results.json");
    results.save(&results_path)?;

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Seeds run: {}", results.seeds.len());
    if !results.errors.is_empty() {
        eprintln!("Seeds failed: {}", results.errors.len());
    }
    eprintln!("Mean ships destroyed: {:.2}", results.mean_destroyed);
    for (name, count) in &results.event_totals {
        eprintln!("  {name:<24} {count}");
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!("Results saved to: {}", results_path.display());
    Ok(())
}

/// Write a sample snapshot.
fn cmd_sample(output: &Path, ships_per_side: u32) -> Result<(), ScenarioError> {
    let world = empire_test_utils::fixtures::skirmish_world(ships_per_side);
    save_snapshot(&world, output)?;
    eprintln!(
        "Sample snapshot with {} ships and {} planets written to {}",
        world.ships.len(),
        world.planets.len(),
        output.display()
    );
    Ok(())
}
