//! Headless tick runner for CI and offline analysis.
//!
//! Loads a world snapshot, drives it through ticks of the engine and writes
//! what happened to stdout. This enables:
//!
//! - **Determinism checks**: the same snapshot and seed must give the same
//!   delta hashes, run after run
//! - **Seed sweeps**: run one snapshot under many seeds in parallel
//! - **Debugging**: inspect the events and errors of every tick
//!
//! # Output
//!
//! - **stdout**: one JSON object per tick (see [`runner::TickReport`])
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Write a sample galaxy
//! cargo run -p empire_headless -- sample --output worlds/skirmish.ron
//!
//! # Run ten ship ticks
//! cargo run -p empire_headless -- run --snapshot worlds/skirmish.ron --kind ship --ticks 10
//!
//! # Verify determinism
//! cargo run -p empire_headless -- verify --snapshot worlds/skirmish.ron --runs 5
//! ```

pub mod batch;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use runner::{verify, HeadlessRunner, RunConfig, RunSummary, TickReport, VerifyReport};
pub use scenario::{load_config, load_snapshot, save_snapshot, ScenarioError};
