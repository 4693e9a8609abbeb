//! Seed sweeps.
//!
//! Runs the same snapshot under many seeds in parallel using rayon and
//! summarises what each seed did.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use empire_core::snapshot::WorldSnapshot;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::runner::{HeadlessRunner, RunConfig, TickReport};

/// Batch configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Per-seed run settings; `run.seed` is replaced by each swept seed.
    pub run: RunConfig,
    /// First seed, inclusive.
    pub seed_start: u64,
    /// Last seed, exclusive.
    pub seed_end: u64,
    /// Maximum parallel runs (0 = use rayon default).
    pub parallel: u32,
}

/// What one seed did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedResult {
    /// Seed of the first tick.
    pub seed: u64,
    /// Ticks completed.
    pub ticks: u64,
    /// Ships destroyed over the run.
    pub destroyed_ships: usize,
    /// Per-entity errors reported.
    pub errors: usize,
    /// Event counts by event name.
    pub events: BTreeMap<String, usize>,
    /// Hash of the final snapshot.
    pub final_hash: u64,
}

/// A seed that failed to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed that failed.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Results of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResults {
    /// Individual seed results, by seed.
    pub seeds: Vec<SeedResult>,
    /// Seeds that failed.
    pub errors: Vec<BatchError>,
    /// Mean ships destroyed per seed.
    pub mean_destroyed: f64,
    /// Event counts summed over every seed.
    pub event_totals: BTreeMap<String, usize>,
    /// Total wall time in seconds.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

fn run_seed(world: &WorldSnapshot, run: &RunConfig, seed: u64) -> Result<SeedResult, String> {
    let config = RunConfig {
        seed,
        ..run.clone()
    };
    let mut runner = HeadlessRunner::new(config, world.clone());
    let mut events: BTreeMap<String, usize> = BTreeMap::new();
    let summary = runner
        .run_with(|report: &TickReport| {
            for event in &report.events {
                *events.entry(event.kind().to_string()).or_default() += 1;
            }
            Ok(())
        })
        .map_err(|e| e.to_string())?;
    Ok(SeedResult {
        seed,
        ticks: summary.ticks,
        destroyed_ships: summary.destroyed_ships,
        errors: summary.errors,
        events,
        final_hash: summary.final_hash,
    })
}

/// Run the snapshot once per seed in `seed_start..seed_end`.
pub fn run_batch(world: &WorldSnapshot, config: &BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        kind = ?config.run.kind,
        ticks = config.run.ticks,
        seeds = config.seed_end.saturating_sub(config.seed_start),
        "Starting batch run"
    );

    if config.parallel > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<SeedResult, BatchError>> = (config.seed_start..config.seed_end)
        .into_par_iter()
        .map(|seed| {
            run_seed(world, &config.run, seed).map_err(|message| {
                warn!(seed, %message, "Seed failed");
                BatchError { seed, message }
            })
        })
        .collect();

    let mut batch = BatchResults::default();
    for result in results {
        match result {
            Ok(seed) => batch.seeds.push(seed),
            Err(e) => batch.errors.push(e),
        }
    }
    for seed in &batch.seeds {
        for (name, count) in &seed.events {
            *batch.event_totals.entry(name.clone()).or_default() += count;
        }
    }
    if !batch.seeds.is_empty() {
        let destroyed: usize = batch.seeds.iter().map(|s| s.destroyed_ships).sum();
        batch.mean_destroyed = destroyed as f64 / batch.seeds.len() as f64;
    }
    batch.duration_seconds = start.elapsed().as_secs_f64();

    info!(
        completed = batch.seeds.len(),
        failed = batch.errors.len(),
        duration_secs = format!("{:.1}", batch.duration_seconds),
        "Batch complete"
    );
    batch
}
