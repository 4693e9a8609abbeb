//! Tick orchestrator.
//!
//! [`run_tick`] is the single entry point. It takes an immutable snapshot,
//! works on a private copy and returns what changed as a [`WorldDelta`],
//! together with the event log and per-entity error report.
//!
//! # Phases
//!
//! Every tick validates first. Ticks that involve ships then collect intents
//! from the validated world (player commands before AI, both read-only) and
//! apply them in a fixed order:
//!
//! ```text
//! Validate -> Intents -> Orders -> Upkeep -> Movement -> Hazards -> Combat -> Countdowns
//! ```
//!
//! Planet ticks run the economy passes instead. Each phase draws random
//! numbers from its own ChaCha stream, so the outcome of a phase does not
//! depend on how much randomness an earlier phase consumed.
//!
//! # Determinism
//!
//! Identical kind, snapshot, duration, seed and config produce a
//! byte-identical delta and event log. Only [`TickMetrics::wall_time`]
//! varies between runs.
//!
//! # Cancellation
//!
//! A [`CancelToken`] is checked between phases. A cancelled tick stops at
//! the next boundary and returns the effect of the phases it completed.
//! Mines triggered by the hazards phase are already gone from the world, so
//! their detonations are resolved at the boundary instead of being dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::ai::collect_ai_intents;
use crate::combat::CombatResolver;
use crate::config::EngineConfig;
use crate::economy::{run_population, run_production, run_taxation};
use crate::error::ErrorReport;
use crate::events::EventLog;
use crate::hazards::{run_beacons, run_mines, run_wormholes};
use crate::intent::IntentQueue;
use crate::math::Fixed;
use crate::movement::run_movement;
use crate::rng::TickRng;
use crate::snapshot::{TickLedger, WorldDelta, WorldSnapshot};
use crate::upkeep::{apply_orders, run_upkeep};
use crate::validation::validate_world;

/// Which engines a tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickKind {
    /// Main ship tick: orders, upkeep, movement, hazards and combat.
    Ship,
    /// Fast movement tick: upkeep, movement and hazards.
    Movement,
    /// Fast combat tick: orders and combat.
    Combat,
    /// All three economy passes.
    Planet,
    /// Production only.
    Production,
    /// Taxation only.
    Taxation,
    /// Population only.
    Population,
}

impl TickKind {
    /// Every tick kind.
    pub const ALL: [TickKind; 7] = [
        TickKind::Ship,
        TickKind::Movement,
        TickKind::Combat,
        TickKind::Planet,
        TickKind::Production,
        TickKind::Taxation,
        TickKind::Population,
    ];

    /// Phases this kind runs, in order.
    #[must_use]
    pub fn phases(self) -> &'static [Phase] {
        match self {
            Self::Ship => &[
                Phase::Validate,
                Phase::Intents,
                Phase::Orders,
                Phase::Upkeep,
                Phase::Movement,
                Phase::Hazards,
                Phase::Combat,
                Phase::Countdowns,
            ],
            Self::Movement => &[
                Phase::Validate,
                Phase::Upkeep,
                Phase::Movement,
                Phase::Hazards,
            ],
            Self::Combat => &[
                Phase::Validate,
                Phase::Intents,
                Phase::Orders,
                Phase::Combat,
                Phase::Countdowns,
            ],
            Self::Planet => &[
                Phase::Validate,
                Phase::Production,
                Phase::Taxation,
                Phase::Population,
            ],
            Self::Production => &[Phase::Validate, Phase::Production],
            Self::Taxation => &[Phase::Validate, Phase::Taxation],
            Self::Population => &[Phase::Validate, Phase::Population],
        }
    }

    /// How often the scheduler usually runs this kind, in seconds.
    #[must_use]
    pub fn default_cadence_secs(self) -> u32 {
        match self {
            Self::Ship => 10,
            Self::Movement => 5,
            Self::Combat => 3,
            Self::Planet | Self::Production => 30,
            Self::Taxation => 60,
            Self::Population => 120,
        }
    }

    fn runs(self, phase: Phase) -> bool {
        self.phases().contains(&phase)
    }
}

impl std::str::FromStr for TickKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ship" => Ok(Self::Ship),
            "movement" => Ok(Self::Movement),
            "combat" => Ok(Self::Combat),
            "planet" => Ok(Self::Planet),
            "production" => Ok(Self::Production),
            "taxation" | "tax" => Ok(Self::Taxation),
            "population" => Ok(Self::Population),
            other => Err(format!("unknown tick kind '{other}'")),
        }
    }
}

/// One step of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Clamp malformed state, quarantine corrupt entities.
    Validate,
    /// Collect player commands and AI decisions.
    Intents,
    /// Apply courses, actions and AI state.
    Orders,
    /// Timers, energy, shields, cloak, self-repair.
    Upkeep,
    /// Ship physics and galaxy edges.
    Movement,
    /// Mines, wormholes, beacons.
    Hazards,
    /// Weapon fire and mine detonations.
    Combat,
    /// Self-destruct countdowns.
    Countdowns,
    /// Planet production.
    Production,
    /// Planet taxation.
    Taxation,
    /// Planet population.
    Population,
}

impl Phase {
    /// ChaCha stream this phase draws from.
    #[must_use]
    pub fn stream(self) -> u64 {
        self as u64
    }
}

/// Cooperative cancellation flag shared with the scheduler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the tick to stop at the next phase boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Bookkeeping about one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickMetrics {
    /// Entities visited, summed over phases.
    pub entities_processed: usize,
    /// Orders applied plus combat intents resolved.
    pub intents_resolved: usize,
    /// Time spent computing the tick.
    pub wall_time: Duration,
    /// Processing took longer than the tick duration.
    pub overrun: bool,
    /// Phases that ran to completion.
    pub completed_phases: Vec<Phase>,
    /// The tick stopped early on request.
    pub cancelled: bool,
}

/// Everything a tick produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutcome {
    /// What changed.
    pub delta: WorldDelta,
    /// What happened, in order.
    pub events: EventLog,
    /// Per-entity problems.
    pub errors: ErrorReport,
    /// Timing and counters.
    pub metrics: TickMetrics,
}

/// Run one tick with the default engine config.
#[must_use]
pub fn run_tick(
    kind: TickKind,
    snapshot: &WorldSnapshot,
    duration_secs: u32,
    seed: u64,
) -> TickOutcome {
    run_tick_with(
        kind,
        snapshot,
        duration_secs,
        seed,
        &EngineConfig::default(),
        &CancelToken::new(),
    )
}

/// Run one tick with an explicit config and cancellation token.
#[must_use]
pub fn run_tick_with(
    kind: TickKind,
    snapshot: &WorldSnapshot,
    duration_secs: u32,
    seed: u64,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> TickOutcome {
    run_tick_until(kind, snapshot, duration_secs, seed, config, |_| cancel.is_cancelled())
}

/// Run a tick, asking `stop` before each phase whether to stop there.
fn run_tick_until(
    kind: TickKind,
    snapshot: &WorldSnapshot,
    duration_secs: u32,
    seed: u64,
    config: &EngineConfig,
    mut stop: impl FnMut(Phase) -> bool,
) -> TickOutcome {
    let started = Instant::now();
    let mut state = TickState {
        kind,
        world: snapshot.clone(),
        config,
        seed,
        dt: Fixed::saturating_from_num(duration_secs),
        intents: IntentQueue::new(),
        ledger: TickLedger::default(),
        events: EventLog::new(),
        errors: ErrorReport::default(),
        metrics: TickMetrics::default(),
    };

    for &phase in kind.phases() {
        if stop(phase) {
            tracing::info!(?kind, ?phase, tick = snapshot.tick, "Tick cancelled");
            state.metrics.cancelled = true;
            let mut rng = state.rng(Phase::Combat);
            state.resolve_detonations(&mut rng);
            break;
        }
        state.run_phase(phase);
        state.metrics.completed_phases.push(phase);
    }

    let TickState {
        world,
        ledger,
        events,
        errors,
        mut metrics,
        ..
    } = state;

    let mut delta = WorldDelta::between(snapshot, &world);
    delta.now = snapshot.now.saturating_add(u64::from(duration_secs));
    ledger.settle(&mut delta);

    metrics.wall_time = started.elapsed();
    metrics.overrun = metrics.wall_time > Duration::from_secs(u64::from(duration_secs));
    if metrics.overrun {
        tracing::warn!(
            ?kind,
            tick = snapshot.tick,
            elapsed_ms = metrics.wall_time.as_millis() as u64,
            "Tick overran its duration"
        );
    }
    tracing::debug!(
        ?kind,
        tick = snapshot.tick,
        events = events.len(),
        errors = errors.len(),
        entities = metrics.entities_processed,
        "Tick complete"
    );

    TickOutcome {
        delta,
        events,
        errors,
        metrics,
    }
}

/// Working state threaded through the phases of one tick.
struct TickState<'a> {
    kind: TickKind,
    world: WorldSnapshot,
    config: &'a EngineConfig,
    seed: u64,
    dt: Fixed,
    intents: IntentQueue,
    ledger: TickLedger,
    events: EventLog,
    errors: ErrorReport,
    metrics: TickMetrics,
}

impl TickState<'_> {
    fn rng(&self, phase: Phase) -> TickRng {
        TickRng::new(self.seed, phase.stream())
    }

    fn run_phase(&mut self, phase: Phase) {
        let config = self.config;
        let mut rng = self.rng(phase);
        let processed = match phase {
            Phase::Validate => validate_world(&mut self.world, config, &mut self.errors),
            Phase::Intents => {
                self.intents.collect_commands(&self.world);
                collect_ai_intents(
                    &self.world,
                    &config.ai,
                    &config.combat,
                    &mut rng,
                    &mut self.intents,
                )
            }
            Phase::Orders => {
                let applied = apply_orders(
                    &mut self.world,
                    &self.intents,
                    config,
                    &mut self.ledger,
                    &mut self.events,
                    &mut self.errors,
                );
                self.ledger
                    .consumed_commands
                    .extend(self.intents.consumed().iter().copied());
                self.metrics.intents_resolved += applied;
                applied
            }
            Phase::Upkeep => run_upkeep(&mut self.world, config, self.dt, &mut self.events),
            Phase::Movement => run_movement(
                &mut self.world,
                &config.movement,
                self.dt,
                &mut self.ledger,
                &mut self.events,
            ),
            Phase::Hazards => self.run_hazards(&mut rng),
            Phase::Combat => {
                let combat = self.intents.take_combat();
                let resolved = CombatResolver::new(
                    &mut self.world,
                    &config.combat,
                    &mut rng,
                    &mut self.ledger,
                    &mut self.events,
                )
                .resolve(&combat);
                self.metrics.intents_resolved += resolved;
                combat.len()
            }
            Phase::Countdowns => CombatResolver::new(
                &mut self.world,
                &config.combat,
                &mut rng,
                &mut self.ledger,
                &mut self.events,
            )
            .run_countdowns(),
            Phase::Production => {
                run_production(&mut self.world, &config.economy, &mut self.events)
            }
            Phase::Taxation => run_taxation(&mut self.world, &config.economy, &mut self.events),
            Phase::Population => {
                run_population(&mut self.world, &config.economy, &mut rng, &mut self.events)
            }
        };
        tracing::trace!(?phase, processed, "Phase complete");
        self.metrics.entities_processed += processed;
    }

    fn run_hazards(&mut self, rng: &mut TickRng) -> usize {
        let hazards = &self.config.hazards;
        let mut processed = run_mines(
            &mut self.world,
            hazards,
            rng,
            &mut self.intents,
            &mut self.events,
        );
        processed += run_wormholes(&mut self.world, hazards, &mut self.ledger, &mut self.events);
        processed += run_beacons(&mut self.world, hazards, &mut self.events);

        // Without a combat phase to follow, mines go off right away.
        if !self.kind.runs(Phase::Combat) {
            self.resolve_detonations(rng);
        }
        processed
    }

    /// Resolve mine detonations still queued, leaving weapon fire alone.
    fn resolve_detonations(&mut self, rng: &mut TickRng) {
        let detonations = self.intents.take_detonations();
        if detonations.is_empty() {
            return;
        }
        let resolved = CombatResolver::new(
            &mut self.world,
            &self.config.combat,
            rng,
            &mut self.ledger,
            &mut self.events,
        )
        .resolve(&detonations);
        self.metrics.intents_resolved += resolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        AiMode, ControlMode, CyborgMode, CyborgState, Mine, Ship, ShipClass, WeaponKind,
    };
    use crate::events::WorldEvent;
    use crate::math::Vec2Fixed;
    use crate::snapshot::{Command, CommandKind};

    fn world() -> WorldSnapshot {
        let mut world = WorldSnapshot::default();
        world.classes.insert(
            1,
            ShipClass {
                name: "Scout".into(),
                max_speed: Fixed::from_num(1000),
                max_acceleration: Fixed::from_num(50),
                max_turn_rate: Fixed::from_num(45),
                max_energy: Fixed::from_num(2000),
                energy_regen: Fixed::from_num(5),
                max_shield_type: 4,
                armament: [WeaponKind::Phaser].into_iter().collect(),
                damage_factor: 90,
                repair_rate: Fixed::from_num(1),
                scan_range: Fixed::from_num(40_000),
                sensor_rating: 40,
                tonnage: 100,
                kill_points: 50,
                max_cloak: 0,
                can_lay_mines: false,
            },
        );
        let mut ship = Ship::new(1, 1, 1, Vec2Fixed::from_units(50_000, 50_000));
        ship.energy = Fixed::from_num(1000);
        world.ships.insert(1, ship);
        world
    }

    #[test]
    fn test_tick_kind_parsing_and_cadence() {
        assert_eq!("Ship".parse::<TickKind>(), Ok(TickKind::Ship));
        assert_eq!("tax".parse::<TickKind>(), Ok(TickKind::Taxation));
        assert!("warp".parse::<TickKind>().is_err());
        assert_eq!(TickKind::Combat.default_cadence_secs(), 3);
        assert!(TickKind::ALL.iter().all(|k| k.phases()[0] == Phase::Validate));
    }

    #[test]
    fn test_snapshot_is_untouched_and_tick_advances() {
        let world = world();
        let before = world.clone();
        let outcome = run_tick(TickKind::Ship, &world, 10, 42);
        assert_eq!(world, before);
        assert_eq!(outcome.delta.next_tick, 1);
        assert_eq!(outcome.delta.now, 10);
        assert_eq!(outcome.metrics.completed_phases.len(), 8);
    }

    #[test]
    fn test_commands_are_consumed() {
        let mut world = world();
        world.commands.push(Command {
            ship: 1,
            seq: 3,
            kind: CommandKind::SetCourse {
                heading: Fixed::from_num(90),
                speed: Fixed::from_num(200),
            },
        });
        let outcome = run_tick(TickKind::Ship, &world, 10, 1);
        assert!(outcome.delta.consumed_commands.contains(&(1, 3)));
        let ship = &outcome.delta.ships[&1];
        assert_eq!(ship.desired_heading, Fixed::from_num(90));

        let mut next = world.clone();
        next.apply(&outcome.delta);
        assert!(next.commands.is_empty());
    }

    #[test]
    fn test_movement_tick_ignores_commands() {
        let mut world = world();
        world.commands.push(Command {
            ship: 1,
            seq: 0,
            kind: CommandKind::RaiseShields,
        });
        let outcome = run_tick(TickKind::Movement, &world, 5, 1);
        assert!(outcome.delta.consumed_commands.is_empty());
    }

    #[test]
    fn test_cancelled_tick_commits_nothing_after_the_flag() {
        let world = world();
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = run_tick_with(
            TickKind::Ship,
            &world,
            10,
            7,
            &EngineConfig::default(),
            &cancel,
        );
        assert!(outcome.metrics.cancelled);
        assert!(outcome.metrics.completed_phases.is_empty());
        assert!(outcome.delta.is_empty());
        assert!(outcome.events.is_empty());
    }

    fn mined_and_raided() -> WorldSnapshot {
        let mut world = world();
        world.mines.insert(
            5,
            Mine {
                id: 5,
                owner: 66,
                position: Vec2Fixed::from_units(50_000, 50_000),
                timer: 0,
                damage_potential: Fixed::from_num(30),
                stealth: true,
                armed: true,
            },
        );
        let mut raider = Ship::new(2, 66, 1, Vec2Fixed::from_units(80_000, 50_000));
        raider.damage = Fixed::from_num(60);
        raider.control = ControlMode::CyborgAi(CyborgState::default());
        world.ships.insert(2, raider);
        world
    }

    #[test]
    fn test_stop_after_hazards_still_detonates_triggered_mines() {
        let world = mined_and_raided();
        let config = EngineConfig::default();
        let full = run_tick(TickKind::Ship, &world, 10, 9);
        let cut = run_tick_until(TickKind::Ship, &world, 10, 9, &config, |phase| {
            phase == Phase::Combat
        });

        assert!(cut.metrics.cancelled);
        assert_eq!(cut.metrics.completed_phases.last(), Some(&Phase::Hazards));
        assert!(cut.delta.removed_mines.contains(&5));
        let hit = cut.delta.ships[&1].damage;
        assert!(hit > Fixed::ZERO);
        assert_eq!(hit, full.delta.ships[&1].damage);
    }

    #[test]
    fn test_ai_mode_change_is_reported_with_the_orders_that_apply_it() {
        let world = mined_and_raided();
        let config = EngineConfig::default();
        let changed = |outcome: &TickOutcome| {
            outcome
                .events
                .iter()
                .filter(|e| matches!(e, WorldEvent::AiStateChanged { ship: 2, .. }))
                .count()
        };

        let cut = run_tick_until(TickKind::Ship, &world, 10, 9, &config, |phase| {
            phase == Phase::Orders
        });
        assert_eq!(cut.metrics.completed_phases, vec![Phase::Validate, Phase::Intents]);
        assert_eq!(changed(&cut), 0);
        assert!(!cut.delta.ships.contains_key(&2));

        let full = run_tick(TickKind::Ship, &world, 10, 9);
        assert_eq!(changed(&full), 1);
        assert!(full.events.contains(&WorldEvent::AiStateChanged {
            ship: 2,
            from: AiMode::Cyborg(CyborgMode::Patrol),
            to: AiMode::Cyborg(CyborgMode::Retreat),
        }));
        let ControlMode::CyborgAi(state) = &full.delta.ships[&2].control else {
            panic!("raider lost its AI");
        };
        assert_eq!(state.mode, CyborgMode::Retreat);
    }

    #[test]
    fn test_huge_duration_does_not_overflow() {
        let mut world = world();
        let ship = world.ships.get_mut(&1).unwrap();
        ship.heading = Fixed::from_num(90);
        ship.desired_heading = ship.heading;
        ship.speed = Fixed::from_num(100);
        ship.desired_speed = ship.speed;
        let outcome = run_tick(TickKind::Movement, &world, u32::MAX, 1);
        assert_eq!(outcome.delta.now, u64::from(u32::MAX));
        assert!(world.galaxy.contains(outcome.delta.ships[&1].position));
    }

    #[test]
    fn test_planet_tick_leaves_ships_alone() {
        let world = world();
        let outcome = run_tick(TickKind::Planet, &world, 30, 3);
        assert!(outcome.delta.ships.is_empty());
    }
}
