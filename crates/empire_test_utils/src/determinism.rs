//! Determinism testing utilities.
//!
//! Provides a harness for verifying that ticks produce identical results
//! given identical inputs.
//!
//! # Testing Strategy
//!
//! A tick must be a pure function of (kind, snapshot, duration, seed,
//! config). Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`empire_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Snapshots and deltas only hold `BTreeMap`s and `Vec`s.
//!
//! - **System randomness**: Every random draw comes from the seed the
//!   caller passes to `run_tick`.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual engine determinism (movement, combat, etc.)
//! 2. **Property tests**: Random snapshots must still tick deterministically
//! 3. **Integration tests**: Multi-tick campaigns are reproducible
//! 4. **Parallel tests**: Running N campaigns on N threads all match

use std::thread;

use empire_core::config::EngineConfig;
use empire_core::snapshot::WorldSnapshot;
use empire_core::tick::{run_tick_with, CancelToken, TickKind, TickOutcome};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic engine).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs were deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Tick engine is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a stateful process multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute a state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, u64),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for tick in 0..ticks {
            step(&mut state, tick);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// A multi-tick campaign: one tick kind, a base seed and a config.
///
/// Tick `n` of the campaign uses seed `base_seed + n` and folds its delta
/// into the snapshot before the next tick.
#[derive(Debug, Clone)]
pub struct Campaign {
    /// Kind of every tick.
    pub kind: TickKind,
    /// Seconds per tick.
    pub duration_secs: u32,
    /// Seed of the first tick.
    pub base_seed: u64,
    /// Engine tuning.
    pub config: EngineConfig,
}

impl Campaign {
    /// Campaign of `kind` ticks at the kind's default cadence.
    #[must_use]
    pub fn new(kind: TickKind, base_seed: u64) -> Self {
        Self {
            kind,
            duration_secs: kind.default_cadence_secs(),
            base_seed,
            config: EngineConfig::default(),
        }
    }

    /// Run tick `n` against `world` and fold the delta in.
    pub fn step(&self, world: &mut WorldSnapshot, n: u64) -> TickOutcome {
        let outcome = run_tick_with(
            self.kind,
            world,
            self.duration_secs,
            self.base_seed.wrapping_add(n),
            &self.config,
            &CancelToken::new(),
        );
        world.apply(&outcome.delta);
        outcome
    }

    /// Run `ticks` ticks and return the final snapshot.
    #[must_use]
    pub fn run(&self, mut world: WorldSnapshot, ticks: u64) -> WorldSnapshot {
        for n in 0..ticks {
            self.step(&mut world, n);
        }
        world
    }
}

/// Hash a snapshot, treating an encoding failure as a distinct hash.
#[must_use]
pub fn snapshot_hash(world: &WorldSnapshot) -> u64 {
    world.state_hash().unwrap_or(0)
}

/// Run a campaign `runs` times from the same snapshot and compare the final
/// state hashes.
#[must_use]
pub fn verify_campaign_determinism(
    campaign: &Campaign,
    world: &WorldSnapshot,
    ticks: u64,
    runs: usize,
) -> DeterminismResult {
    verify_determinism(
        runs,
        ticks,
        || world.clone(),
        |state, n| {
            campaign.step(state, n);
        },
        snapshot_hash,
    )
}

/// Run a single tick twice and check that the deltas encode to the same
/// bytes and the event logs match.
#[must_use]
pub fn verify_tick_determinism(
    kind: TickKind,
    world: &WorldSnapshot,
    duration_secs: u32,
    seed: u64,
) -> bool {
    let config = EngineConfig::default();
    let run = || run_tick_with(kind, world, duration_secs, seed, &config, &CancelToken::new());
    let (a, b) = (run(), run());
    match (a.delta.to_bytes(), b.delta.to_bytes()) {
        (Ok(x), Ok(y)) => x == y && a.events == b.events && a.errors == b.errors,
        _ => false,
    }
}

/// Run `num_sims` copies of a campaign on scoped threads and collect the
/// final state hashes.
#[must_use]
pub fn run_parallel_campaigns(
    campaign: &Campaign,
    world: &WorldSnapshot,
    num_sims: usize,
    ticks: u64,
) -> DeterminismResult {
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| s.spawn(|| snapshot_hash(&campaign.run(world.clone(), ticks))))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(0))
            .collect()
    });
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run two copies of a campaign tick by tick and report the first tick at
/// which their snapshots differ.
///
/// # Returns
///
/// `None` if the runs never diverge, `Some(tick)` otherwise.
#[must_use]
pub fn find_first_divergence(
    campaign: &Campaign,
    world: &WorldSnapshot,
    ticks: u64,
) -> Option<u64> {
    let mut a = world.clone();
    let mut b = world.clone();

    for n in 0..ticks {
        campaign.step(&mut a, n);
        campaign.step(&mut b, n);
        if snapshot_hash(&a) != snapshot_hash(&b) {
            tracing::debug!(tick = n, "Campaign runs diverged");
            return Some(n);
        }
    }
    None
}

/// Check that a snapshot survives an encode/decode round trip mid-campaign
/// and keeps ticking identically.
#[must_use]
pub fn verify_serialization_determinism(
    campaign: &Campaign,
    world: &WorldSnapshot,
    ticks: u64,
) -> bool {
    let mid = campaign.run(world.clone(), ticks);
    let Ok(bytes) = mid.to_bytes() else {
        return false;
    };
    let Ok(restored) = WorldSnapshot::from_bytes(&bytes) else {
        return false;
    };
    if restored != mid {
        return false;
    }
    let mut a = mid;
    let mut b = restored;
    let (x, y) = (campaign.step(&mut a, ticks), campaign.step(&mut b, ticks));
    x.delta == y.delta && x.events == y.events
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of tick determinism.
pub mod strategies {
    use empire_core::entities::{ControlMode, CyborgState, DroidState, Ship};
    use empire_core::math::{Fixed, Vec2Fixed};
    use empire_core::snapshot::WorldSnapshot;
    use proptest::prelude::*;

    use crate::fixtures::{empty_world, CRUISER, RAIDER, SENTRY};

    /// Position anywhere in the default galaxy.
    pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
        (0i32..300_000, 0i32..150_000).prop_map(|(x, y)| Vec2Fixed::from_units(x, y))
    }

    /// Heading in whole degrees.
    pub fn arb_heading() -> impl Strategy<Value = Fixed> {
        (0i32..360).prop_map(Fixed::from_num)
    }

    /// Speed up to the fastest fixture class.
    pub fn arb_speed() -> impl Strategy<Value = Fixed> {
        (0i32..2500).prop_map(Fixed::from_num)
    }

    /// Hull damage, including the destroyed boundary.
    pub fn arb_damage() -> impl Strategy<Value = Fixed> {
        (0i32..=100).prop_map(Fixed::from_num)
    }

    /// A ship of a random fixture class, owner and control mode.
    pub fn arb_ship(id: u64) -> impl Strategy<Value = Ship> {
        (
            0u8..3,
            1u64..4,
            arb_position(),
            arb_heading(),
            arb_speed(),
            0i32..99,
            0i32..4000,
        )
            .prop_map(move |(kind, owner, pos, heading, speed, damage, energy)| {
                let class = [CRUISER, RAIDER, SENTRY][usize::from(kind)];
                let mut ship = Ship::new(id, owner, class, pos);
                ship.heading = heading;
                ship.desired_heading = heading;
                ship.speed = speed.min(Fixed::from_num(1200));
                ship.desired_speed = ship.speed;
                ship.damage = Fixed::from_num(damage);
                ship.energy = Fixed::from_num(energy);
                ship.control = match kind {
                    1 => ControlMode::CyborgAi(CyborgState::default()),
                    2 => ControlMode::DroidAi(DroidState::new(pos)),
                    _ => ControlMode::Human,
                };
                ship
            })
    }

    /// A world holding up to `max_ships` random ships.
    pub fn arb_world(max_ships: usize) -> impl Strategy<Value = WorldSnapshot> {
        (1..=max_ships.max(1))
            .prop_flat_map(|n| {
                (0..n)
                    .map(|i| arb_ship(i as u64 + 1))
                    .collect::<Vec<_>>()
            })
            .prop_map(|ships| {
                let mut world = empty_world();
                for ship in ships {
                    world.ships.insert(ship.id, ship);
                }
                world
            })
    }
}
