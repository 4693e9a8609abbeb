//! End-to-end tick scenarios.

use empire_core::combat::{absorb, apply_hull_damage, shield_absorption, HULL_LIMIT};
use empire_core::config::CombatConfig;
use empire_core::entities::{
    AiMode, ControlMode, DroidMode, DroidState, EntityRef, Item, Shield, ShieldStatus, Subsystems,
};
use empire_core::error::EntityError;
use empire_core::events::{DamageSource, WorldEvent};
use empire_core::math::Fixed;
use empire_core::snapshot::{BoundaryMode, Command, CommandKind, WorldSnapshot};
use empire_core::tick::{run_tick, TickKind};
use empire_test_utils::determinism::strategies::arb_world;
use empire_test_utils::determinism::verify_tick_determinism;
use empire_test_utils::fixtures::{
    at, droid, empty_world, fixed, mine, planet, ship, skirmish_world, CRUISER,
};
use empire_test_utils::proptest::prelude::*;

#[test]
fn test_ship_cruises_east_one_second() {
    let mut world = empty_world();
    let mut cruiser = ship(1, 1, CRUISER, at(10, 10));
    cruiser.heading = fixed(90);
    cruiser.desired_heading = fixed(90);
    cruiser.speed = fixed(5);
    cruiser.desired_speed = fixed(5);
    world.ships.insert(1, cruiser);

    let outcome = run_tick(TickKind::Movement, &world, 1, 99);
    assert_eq!(outcome.delta.ships[&1].position, at(15, 10));
    assert!(outcome.events.contains(&WorldEvent::ShipMoved {
        ship: 1,
        from: at(10, 10),
        to: at(15, 10),
    }));
}

#[test]
fn test_acceleration_is_bounded() {
    let mut world = empty_world();
    let mut cruiser = ship(1, 1, CRUISER, at(10, 10));
    cruiser.heading = fixed(90);
    cruiser.desired_heading = fixed(90);
    cruiser.speed = fixed(5);
    cruiser.desired_speed = fixed(20);
    world.ships.insert(1, cruiser);

    let outcome = run_tick(TickKind::Movement, &world, 1, 99);
    let after = &outcome.delta.ships[&1];
    // max_acceleration 2 over one second.
    assert_eq!(after.speed, fixed(7));
    assert_eq!(after.position, at(17, 10));
}

#[test]
fn test_half_absorbing_shield_halves_phaser_hit() {
    let config = CombatConfig::default();
    let mut target = ship(2, 2, CRUISER, at(0, 0));
    target.shield = Shield {
        kind: 5,
        status: ShieldStatus::Up,
        charge: fixed(100),
    };
    let fraction = shield_absorption(&target.shield, &target.systems, &config);
    assert_eq!(fraction, Fixed::from_num(0.5));

    let (hull, absorbed) = absorb(fixed(80), fraction);
    assert_eq!((hull, absorbed), (fixed(40), fixed(40)));
    assert!(!apply_hull_damage(&mut target, hull));
    assert_eq!(target.damage, fixed(40));
    assert!(target.is_alive());
}

#[test]
fn test_production_tick_applies_planet_modifiers() {
    let mut world = empty_world();
    let mut colony = planet(1, Some(1), at(50_000, 50_000));
    colony.resources = 5;
    colony.environment = 3;
    colony.technology = 0;
    colony.stocks = Default::default();
    colony.stock_mut(Item::Food).rate = 10;
    world.planets.insert(1, colony.clone());

    let outcome = run_tick(TickKind::Production, &world, 30, 1);
    assert_eq!(outcome.delta.planets[&1].quantity(Item::Food), 18);

    colony.stock_mut(Item::Food).quantity = colony.max_quantity - 5;
    world.planets.insert(1, colony.clone());
    let outcome = run_tick(TickKind::Production, &world, 30, 1);
    assert_eq!(
        outcome.delta.planets[&1].quantity(Item::Food),
        colony.max_quantity
    );
}

#[test]
fn test_damaged_droid_switches_to_self_repair() {
    let mut world = empty_world();
    let mut sentry = droid(1, at(100_000, 80_000));
    sentry.damage = fixed(65);
    world.ships.insert(1, sentry);

    let outcome = run_tick(TickKind::Ship, &world, 10, 4);
    let after = &outcome.delta.ships[&1];
    let ControlMode::DroidAi(state) = &after.control else {
        panic!("droid lost its AI: {:?}", after.control);
    };
    assert_eq!(state.mode, DroidMode::SelfRepair);
    // Repair starts the same tick: 3 points for the sentry class.
    assert_eq!(after.damage, fixed(62));
    assert!(outcome.events.contains(&WorldEvent::AiStateChanged {
        ship: 1,
        from: AiMode::Droid(DroidMode::Patrol),
        to: AiMode::Droid(DroidMode::SelfRepair),
    }));
}

fn mined_world() -> WorldSnapshot {
    let mut world = empty_world();
    world.ships.insert(1, ship(1, 1, CRUISER, at(40_000, 40_000)));
    let mut mine = mine(1, 7, at(41_000, 40_000), 40);
    mine.timer = 1;
    mine.armed = false;
    mine.stealth = true;
    world.mines.insert(1, mine);
    world
}

#[test]
fn test_mine_arms_and_detonates_in_one_tick() {
    let world = mined_world();
    let outcome = run_tick(TickKind::Ship, &world, 10, 5);

    assert!(outcome.delta.removed_mines.contains(&1));
    assert_eq!(outcome.delta.ships[&1].damage, fixed(40));
    assert!(outcome.events.contains(&WorldEvent::MineArmed { mine: 1 }));
    assert!(outcome
        .events
        .contains(&WorldEvent::MineDetonated { mine: 1, trigger: 1 }));
    assert!(outcome.events.contains(&WorldEvent::DamageDealt {
        target: 1,
        source: DamageSource::Mine(1),
        hull: fixed(40),
        absorbed: Fixed::ZERO,
        critical: false,
    }));
}

#[test]
fn test_movement_tick_resolves_mines_without_combat_phase() {
    let world = mined_world();
    let outcome = run_tick(TickKind::Movement, &world, 5, 5);
    assert_eq!(outcome.delta.ships[&1].damage, fixed(40));
}

#[test]
fn test_wraparound_east_edge() {
    let mut world = empty_world();
    let width = i32::try_from(world.galaxy.width).unwrap();
    let mut cruiser = ship(1, 1, CRUISER, at(width - 1, 5_000));
    cruiser.heading = fixed(90);
    cruiser.desired_heading = fixed(90);
    cruiser.speed = fixed(2);
    cruiser.desired_speed = fixed(2);
    world.ships.insert(1, cruiser);

    let outcome = run_tick(TickKind::Movement, &world, 1, 0);
    assert_eq!(outcome.delta.ships[&1].position, at(1, 5_000));
}

#[test]
fn test_zipper_edge_stops_and_damages() {
    let mut world = empty_world();
    world.galaxy.boundary = BoundaryMode::Zipper;
    let width = i32::try_from(world.galaxy.width).unwrap();
    let mut cruiser = ship(1, 1, CRUISER, at(width - 1, 5_000));
    cruiser.heading = fixed(90);
    cruiser.desired_heading = fixed(90);
    cruiser.speed = fixed(2);
    cruiser.desired_speed = fixed(2);
    world.ships.insert(1, cruiser);

    let outcome = run_tick(TickKind::Movement, &world, 1, 0);
    let after = &outcome.delta.ships[&1];
    assert!(world.galaxy.contains(after.position));
    assert_eq!(after.speed, Fixed::ZERO);
    assert_eq!(after.damage, fixed(10));
}

#[test]
fn test_taxation_charges_once_per_call() {
    let mut world = empty_world();
    world.planets.insert(1, planet(1, Some(1), at(10_000, 10_000)));

    let first = run_tick(TickKind::Taxation, &world, 60, 1);
    // 10 000 people at 10%.
    assert_eq!(first.delta.planets[&1].cash, 2_000);
    world.apply(&first.delta);

    let second = run_tick(TickKind::Taxation, &world, 60, 1);
    assert_eq!(second.delta.planets[&1].cash, 3_000);
}

#[test]
fn test_high_tax_rate_is_collected_without_errors() {
    let mut world = empty_world();
    let mut taxed = planet(1, Some(1), at(10_000, 10_000));
    taxed.tax_rate = 80;
    world.planets.insert(1, taxed);

    let outcome = run_tick(TickKind::Taxation, &world, 60, 1);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.delta.planets[&1].tax_rate, 80);
    // 10 000 people at 80% on top of 1 000 cash.
    assert_eq!(outcome.delta.planets[&1].cash, 9_000);
}

#[test]
fn test_missing_class_quarantines_ship_and_keeps_its_orders() {
    let mut world = empty_world();
    world.ships.insert(1, ship(1, 1, 99, at(10_000, 10_000)));
    world.ships.insert(2, ship(2, 1, CRUISER, at(20_000, 10_000)));
    world.commands.push(Command {
        ship: 1,
        seq: 0,
        kind: CommandKind::RaiseShields,
    });

    let outcome = run_tick(TickKind::Ship, &world, 10, 2);
    assert!(outcome.delta.quarantined.contains(&EntityRef::Ship(1)));
    assert!(outcome.errors.errors.iter().any(|e| matches!(
        e,
        EntityError::MissingClass { class: 99, .. }
    )));
    assert!(outcome.delta.consumed_commands.is_empty());
    assert!(!outcome.delta.ships.contains_key(&1));

    world.apply(&outcome.delta);
    let again = run_tick(TickKind::Ship, &world, 10, 3);
    // Already quarantined: not reported a second time.
    assert!(again.delta.quarantined.is_empty());
    assert_eq!(world.commands.len(), 1);
}

#[test]
fn test_skirmish_ticks_are_deterministic() {
    let world = skirmish_world(3);
    for kind in TickKind::ALL {
        assert!(
            verify_tick_determinism(kind, &world, kind.default_cadence_secs(), 1234),
            "{kind:?} tick diverged"
        );
    }
}

#[test]
fn test_droid_home_survives_a_campaign() {
    let mut world = empty_world();
    let home = at(100_000, 80_000);
    world.ships.insert(1, droid(1, home));
    for _ in 0..10 {
        let outcome = run_tick(TickKind::Ship, &world, 10, world.tick);
        world.apply(&outcome.delta);
    }
    let ControlMode::DroidAi(DroidState { home: kept, .. }) = &world.ships[&1].control else {
        panic!("droid lost its AI");
    };
    assert_eq!(*kept, home);
    assert_eq!(world.tick, 10);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_random_worlds_tick_deterministically(world in arb_world(8), seed in any::<u64>()) {
        prop_assert!(verify_tick_determinism(TickKind::Ship, &world, 10, seed));
    }

    #[test]
    fn test_hull_damage_stays_in_range(
        start in 0i32..=100,
        hits in prop::collection::vec(-50i32..150, 1..6),
    ) {
        let mut target = ship(1, 1, CRUISER, at(0, 0));
        target.damage = fixed(start);
        target.destroyed = start == 100;
        for hit in hits {
            apply_hull_damage(&mut target, fixed(hit));
            prop_assert!(target.damage >= Fixed::ZERO && target.damage <= HULL_LIMIT);
            prop_assert_eq!(target.destroyed, target.damage == HULL_LIMIT);
        }
    }

    #[test]
    fn test_stronger_shields_never_absorb_less(raw in 0i32..500, a in 0u8..20, b in 0u8..20) {
        let config = CombatConfig::default();
        let (weak, strong) = (a.min(b), a.max(b));
        let shield = |kind| Shield { kind, status: ShieldStatus::Up, charge: fixed(100) };
        let systems = Subsystems::default();
        let soaked = |kind| {
            let fraction = shield_absorption(&shield(kind), &systems, &config);
            absorb(fixed(raw), fraction).1
        };
        let (soaked_weak, soaked_strong) = (soaked(weak), soaked(strong));
        prop_assert!(soaked_strong >= soaked_weak);
    }
}
