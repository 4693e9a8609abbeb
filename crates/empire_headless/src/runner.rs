//! Tick runner.
//!
//! Drives a snapshot through consecutive ticks, folding each delta back in,
//! and reports every tick as one JSON line on stdout.

use std::io::{self, Write};
use std::time::Duration;

use empire_core::config::EngineConfig;
use empire_core::error::{GameError, Result};
use empire_core::events::WorldEvent;
use empire_core::snapshot::WorldSnapshot;
use empire_core::tick::{run_tick_with, CancelToken, TickKind, TickMetrics, TickOutcome};
use serde::{Deserialize, Serialize};

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Which tick to run.
    pub kind: TickKind,
    /// Ticks to run.
    pub ticks: u64,
    /// Seed of the first tick; tick `n` uses `seed + n`.
    pub seed: u64,
    /// Simulated seconds per tick.
    pub duration_secs: u32,
    /// Engine tunables.
    pub engine: EngineConfig,
}

impl RunConfig {
    /// Run `ticks` of `kind` at the kind's default cadence.
    pub fn new(kind: TickKind, ticks: u64, seed: u64) -> Self {
        Self {
            kind,
            ticks,
            seed,
            duration_secs: kind.default_cadence_secs(),
            engine: EngineConfig::default(),
        }
    }

    /// Seed used for the `n`th tick of the run.
    pub fn seed_for(&self, n: u64) -> u64 {
        self.seed.wrapping_add(n)
    }
}

/// One line of run output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick number the snapshot carried before the tick.
    pub tick: u64,
    /// Seed the tick ran with.
    pub seed: u64,
    /// Hash of the delta's canonical encoding.
    pub delta_hash: u64,
    /// Ships destroyed this tick.
    pub destroyed_ships: usize,
    /// Everything that happened.
    pub events: Vec<WorldEvent>,
    /// Per-entity errors, rendered.
    pub errors: Vec<String>,
    /// Timing and counters.
    pub metrics: TickMetrics,
}

impl TickReport {
    fn new(tick: u64, seed: u64, outcome: &TickOutcome) -> Result<Self> {
        Ok(Self {
            tick,
            seed,
            delta_hash: outcome.delta.hash()?,
            destroyed_ships: outcome.delta.destroyed_ships.len(),
            events: outcome.events.clone(),
            errors: outcome.errors.errors.iter().map(ToString::to_string).collect(),
            metrics: outcome.metrics.clone(),
        })
    }

    /// Serialize as a newline-terminated JSON line.
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Ticks completed.
    pub ticks: u64,
    /// Events emitted.
    pub events: usize,
    /// Per-entity errors reported.
    pub errors: usize,
    /// Ships destroyed.
    pub destroyed_ships: usize,
    /// Ticks that took longer than their duration.
    pub overruns: u64,
    /// Time spent inside the engine.
    pub wall_time: Duration,
    /// Hash of the final snapshot.
    pub final_hash: u64,
}

/// Headless tick runner over one snapshot.
pub struct HeadlessRunner {
    config: RunConfig,
    world: WorldSnapshot,
    cancel: CancelToken,
}

impl HeadlessRunner {
    /// Create a runner starting from `world`.
    pub fn new(config: RunConfig, world: WorldSnapshot) -> Self {
        Self {
            config,
            world,
            cancel: CancelToken::new(),
        }
    }

    /// Token that stops the current and all following ticks.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current snapshot.
    pub fn world(&self) -> &WorldSnapshot {
        &self.world
    }

    /// Consume the runner, returning the snapshot.
    pub fn into_world(self) -> WorldSnapshot {
        self.world
    }

    /// Run one tick and fold its delta in.
    pub fn step(&mut self, n: u64) -> TickOutcome {
        let seed = self.config.seed_for(n);
        let outcome = run_tick_with(
            self.config.kind,
            &self.world,
            self.config.duration_secs,
            seed,
            &self.config.engine,
            &self.cancel,
        );
        self.world.apply(&outcome.delta);
        outcome
    }

    /// Run every tick, handing each report to `sink`.
    pub fn run_with<F>(&mut self, mut sink: F) -> Result<RunSummary>
    where
        F: FnMut(&TickReport) -> Result<()>,
    {
        let mut summary = RunSummary::default();
        for n in 0..self.config.ticks {
            if self.cancel.is_cancelled() {
                tracing::info!(completed = n, "Run cancelled");
                break;
            }
            let tick = self.world.tick;
            let outcome = self.step(n);
            let report = TickReport::new(tick, self.config.seed_for(n), &outcome)?;
            sink(&report)?;

            summary.ticks += 1;
            summary.events += report.events.len();
            summary.errors += report.errors.len();
            summary.destroyed_ships += report.destroyed_ships;
            summary.overruns += u64::from(report.metrics.overrun);
            summary.wall_time += report.metrics.wall_time;
        }
        summary.final_hash = self.world.state_hash()?;
        tracing::info!(
            ticks = summary.ticks,
            events = summary.events,
            errors = summary.errors,
            final_hash = summary.final_hash,
            "Run finished"
        );
        Ok(summary)
    }

    /// Run every tick, printing one JSON line per tick to stdout.
    pub fn run(&mut self) -> Result<RunSummary> {
        let stdout = io::stdout();
        self.run_with(|report| {
            let mut out = stdout.lock();
            out.write_all(report.to_json_line().as_bytes())
                .and_then(|()| out.flush())
                .map_err(|e| GameError::Io {
                    path: "<stdout>".into(),
                    message: e.to_string(),
                })
        })
    }

    /// Delta hashes of every tick, without output.
    pub fn delta_hashes(&mut self) -> Result<Vec<u64>> {
        let mut hashes = Vec::new();
        self.run_with(|report| {
            hashes.push(report.delta_hash);
            Ok(())
        })?;
        Ok(hashes)
    }
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Whether every run matched the first.
    pub deterministic: bool,
    /// Runs performed.
    pub runs: u32,
    /// First tick (0-based) where some run diverged.
    pub first_divergence: Option<u64>,
    /// Delta hashes of the first run.
    pub hashes: Vec<u64>,
}

/// Run the same ticks `runs` times from the same snapshot and compare every
/// delta hash.
pub fn verify(config: &RunConfig, world: &WorldSnapshot, runs: u32) -> Result<VerifyReport> {
    let mut reference: Option<Vec<u64>> = None;
    let mut first_divergence: Option<u64> = None;
    for run in 0..runs.max(1) {
        let hashes = HeadlessRunner::new(config.clone(), world.clone()).delta_hashes()?;
        let Some(expected) = reference.as_ref() else {
            reference = Some(hashes);
            continue;
        };
        let diverged = expected
            .iter()
            .zip(&hashes)
            .position(|(a, b)| a != b)
            .or_else(|| {
                (expected.len() != hashes.len()).then(|| expected.len().min(hashes.len()))
            });
        if let Some(at) = diverged {
            tracing::warn!(run, tick = at, "Run diverged");
            let at = at as u64;
            first_divergence = Some(first_divergence.map_or(at, |f| f.min(at)));
        }
    }
    Ok(VerifyReport {
        deterministic: first_divergence.is_none(),
        runs: runs.max(1),
        first_divergence,
        hashes: reference.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use empire_test_utils::fixtures::skirmish_world;

    #[test]
    fn test_runner_advances_world() {
        let world = skirmish_world(2);
        let start_tick = world.tick;
        let mut runner = HeadlessRunner::new(RunConfig::new(TickKind::Ship, 3, 7), world);
        let mut reports = Vec::new();
        let summary = runner
            .run_with(|r| {
                reports.push(r.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(summary.ticks, 3);
        assert_eq!(runner.world().tick, start_tick + 3);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[1].tick, start_tick + 1);
        assert_eq!(reports[2].seed, 9);
    }

    #[test]
    fn test_report_is_one_json_line() {
        let mut runner =
            HeadlessRunner::new(RunConfig::new(TickKind::Movement, 1, 0), skirmish_world(1));
        let outcome = runner.step(0);
        let line = TickReport::new(0, 0, &outcome).unwrap().to_json_line();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed["tick"], 0);
    }

    #[test]
    fn test_cancelled_runner_stops() {
        let config = RunConfig::new(TickKind::Ship, 5, 1);
        let mut runner = HeadlessRunner::new(config, skirmish_world(1));
        runner.cancel_token().cancel();
        let summary = runner.run_with(|_| Ok(())).unwrap();
        assert_eq!(summary.ticks, 0);
    }

    #[test]
    fn test_verify_same_seed_matches() {
        let report = verify(&RunConfig::new(TickKind::Ship, 4, 42), &skirmish_world(2), 3).unwrap();
        assert!(report.deterministic);
        assert_eq!(report.hashes.len(), 4);
        assert_eq!(report.first_divergence, None);
    }
}
