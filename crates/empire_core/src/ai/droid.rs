//! Droid defenders.
//!
//! Droids hold a home point. Heavy damage sends them into self-repair at
//! once; everything else is re-evaluated on a fixed schedule so droids keep
//! a mode for several ticks instead of flickering between them.

use super::{AiView, Contact};
use crate::entities::{DroidMode, DroidState};
use crate::intent::{IntentOrigin, IntentQueue};
use crate::math::{bearing_deg, percent, Fixed};

/// Decide this tick's intents and return the next state.
pub fn evaluate(view: &AiView<'_>, state: &DroidState, intents: &mut IntentQueue) -> DroidState {
    let ship = view.ship;
    let config = view.config;
    let mut next = state.clone();

    if ship.damage > Fixed::from_num(config.droid_repair_damage) {
        next.mode = DroidMode::SelfRepair;
        next.target = None;
    } else if next.mode == DroidMode::SelfRepair
        && ship.damage < Fixed::from_num(config.droid_repaired_damage)
    {
        next.mode = DroidMode::Rest;
    }

    if next.mode != DroidMode::SelfRepair {
        next.update_counter += 1;
        if next.update_counter >= config.droid_update_interval {
            next.update_counter = 0;
            reconsider(view, &mut next);
        }
    }

    match next.mode {
        DroidMode::Defend | DroidMode::Hunt => {
            let range = view.scan_range();
            match next.target.and_then(|id| view.reacquire(id, range)) {
                Some(target) => close_and_fire(view, &target, intents),
                None => {
                    next.mode = DroidMode::Patrol;
                    next.target = None;
                    patrol(view, &next, intents);
                }
            }
        }
        DroidMode::Rest | DroidMode::SelfRepair => {
            intents.push_course(ship.id, IntentOrigin::Ai, ship.heading, Fixed::ZERO);
        }
        DroidMode::Patrol => patrol(view, &next, intents),
    }
    next
}

/// Scheduled re-evaluation, in priority order.
fn reconsider(view: &AiView<'_>, state: &mut DroidState) {
    let config = view.config;
    let defend = Fixed::from_num(config.defend_radius);
    if let Some(intruder) = view.hostiles_near(state.home, defend).first() {
        state.mode = DroidMode::Defend;
        state.target = Some(intruder.id);
        return;
    }
    if let Some(prey) = view.hostiles_within(view.scan_range()).first() {
        state.mode = DroidMode::Hunt;
        state.target = Some(prey.id);
        return;
    }
    state.target = None;

    let energy = view.ship.energy;
    let max_energy = view.class.max_energy;
    let rest_line = max_energy * percent(i64::from(config.rest_energy_percent));
    let resume_line = max_energy * percent(i64::from(config.resume_energy_percent));
    if energy < rest_line || (state.mode == DroidMode::Rest && energy <= resume_line) {
        state.mode = DroidMode::Rest;
        return;
    }
    if state.mode == DroidMode::Patrol {
        state.patrol_leg = (state.patrol_leg + 1) % 4;
    }
    state.mode = DroidMode::Patrol;
}

fn close_and_fire(view: &AiView<'_>, target: &Contact, intents: &mut IntentQueue) {
    let speed = view.pursuit_speed(target.distance);
    intents.push_course(view.ship.id, IntentOrigin::Ai, target.bearing, speed);
    view.engage(target, intents);
}

/// Square legs around home; head back once a leg runs too far out.
fn patrol(view: &AiView<'_>, state: &DroidState, intents: &mut IntentQueue) {
    let galaxy = &view.world.galaxy;
    let ship = view.ship;
    let leash = Fixed::from_num(view.config.patrol_leg_length);
    let heading = if galaxy.distance(ship.position, state.home) > leash {
        bearing_deg(galaxy.offset(ship.position, state.home))
    } else {
        Fixed::from_num(u32::from(state.patrol_leg) * 90)
    };
    intents.push_course(ship.id, IntentOrigin::Ai, heading, view.cruise_speed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AiConfig, CombatConfig};
    use crate::entities::{ControlMode, Ship, ShipClass, WeaponKind};
    use crate::math::Vec2Fixed;
    use crate::snapshot::WorldSnapshot;

    const HOME: (i32, i32) = (150_000, 75_000);

    fn sentry_class() -> ShipClass {
        ShipClass {
            name: "Sentry".into(),
            max_speed: Fixed::from_num(1200),
            max_acceleration: Fixed::from_num(100),
            max_turn_rate: Fixed::from_num(20),
            max_energy: Fixed::from_num(4000),
            energy_regen: Fixed::from_num(30),
            max_shield_type: 10,
            armament: [WeaponKind::Phaser].into_iter().collect(),
            damage_factor: 100,
            repair_rate: Fixed::from_num(3),
            scan_range: Fixed::from_num(80_000),
            sensor_rating: 70,
            tonnage: 600,
            kill_points: 250,
            max_cloak: 0,
            can_lay_mines: false,
        }
    }

    fn world(damage: i32, energy: i32) -> WorldSnapshot {
        let mut world = WorldSnapshot::default();
        world.classes.insert(1, sentry_class());
        let home = Vec2Fixed::from_units(HOME.0, HOME.1);
        let mut droid = Ship::new(1, 77, 1, home);
        droid.damage = Fixed::from_num(damage);
        droid.energy = Fixed::from_num(energy);
        droid.control = ControlMode::DroidAi(DroidState::new(home));
        world.ships.insert(1, droid);
        world
    }

    fn run(world: &WorldSnapshot, state: &DroidState) -> (DroidState, IntentQueue) {
        let config = AiConfig::default();
        let combat = CombatConfig::default();
        let view = AiView {
            world,
            ship: &world.ships[&1],
            class: &world.classes[&1],
            config: &config,
            combat: &combat,
        };
        let mut intents = IntentQueue::new();
        let next = evaluate(&view, state, &mut intents);
        (next, intents)
    }

    fn home_state() -> DroidState {
        DroidState::new(Vec2Fixed::from_units(HOME.0, HOME.1))
    }

    #[test]
    fn test_heavy_damage_forces_self_repair() {
        let world = world(65, 3000);
        let (next, intents) = run(&world, &home_state());
        assert_eq!(next.mode, DroidMode::SelfRepair);
        assert_eq!(intents.courses()[&1].speed, Fixed::ZERO);
    }

    #[test]
    fn test_repair_finishes_into_rest() {
        let world = world(15, 3000);
        let mut state = home_state();
        state.mode = DroidMode::SelfRepair;
        let (next, _) = run(&world, &state);
        assert_eq!(next.mode, DroidMode::Rest);
    }

    #[test]
    fn test_defends_home_on_schedule() {
        let mut world = world(0, 3000);
        world.ships.insert(
            2,
            Ship::new(2, 5, 1, Vec2Fixed::from_units(HOME.0 + 20_000, HOME.1)),
        );
        let mut state = home_state();
        state.update_counter = 3;
        let (next, _) = run(&world, &state);
        // Not due yet.
        assert_eq!(next.mode, DroidMode::Patrol);
        assert_eq!(next.update_counter, 4);

        let (next, mut intents) = run(&world, &next);
        assert_eq!(next.mode, DroidMode::Defend);
        assert_eq!(next.target, Some(2));
        assert_eq!(next.update_counter, 0);
        assert_eq!(intents.courses()[&1].heading, Fixed::from_num(90));
        assert_eq!(intents.take_combat().len(), 1);
    }

    #[test]
    fn test_rests_when_drained_until_resume_line() {
        let world = world(0, 900);
        let mut state = home_state();
        state.update_counter = 4;
        let (next, _) = run(&world, &state);
        assert_eq!(next.mode, DroidMode::Rest);

        // Half full is above the rest line but below the resume line.
        let world = self::world(0, 2000);
        let mut state = next;
        state.update_counter = 4;
        let (next, _) = run(&world, &state);
        assert_eq!(next.mode, DroidMode::Rest);
    }

    #[test]
    fn test_patrol_turns_to_next_leg() {
        let world = world(0, 3000);
        let mut state = home_state();
        state.update_counter = 4;
        let (next, intents) = run(&world, &state);
        assert_eq!(next.patrol_leg, 1);
        assert_eq!(intents.courses()[&1].heading, Fixed::from_num(90));
        assert_eq!(intents.courses()[&1].speed, Fixed::from_num(600));
    }

    #[test]
    fn test_lost_target_returns_to_patrol() {
        let world = world(0, 3000);
        let mut state = home_state();
        state.mode = DroidMode::Hunt;
        state.target = Some(42);
        let (next, _) = run(&world, &state);
        assert_eq!(next.mode, DroidMode::Patrol);
        assert_eq!(next.target, None);
    }
}
