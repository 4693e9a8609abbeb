//! Cyborg raiders.
//!
//! Modes, checked in priority order each tick:
//! 1. Retreat while hull damage is high, running from the nearest hostile
//! 2. Engage the most threatening hostile in scan range
//! 3. MineLay whenever carrying mines and nothing is around, one mine per
//!    `mine_lay_interval` ticks
//! 4. Patrol on random courses

use super::{AiView, Contact};
use crate::entities::{CyborgMode, CyborgState, Item};
use crate::intent::{IntentOrigin, IntentQueue, ShipAction};
use crate::math::{normalize_degrees, Fixed};
use crate::rng::TickRng;

/// Decide this tick's intents and return the next state.
pub fn evaluate(
    view: &AiView<'_>,
    state: &CyborgState,
    rng: &mut TickRng,
    intents: &mut IntentQueue,
) -> CyborgState {
    let ship = view.ship;
    let config = view.config;
    let range = view.scan_range();
    let contacts = view.hostiles_within(range);

    let damaged = ship.damage > Fixed::from_num(config.cyborg_flee_damage);
    let recovering = state.mode == CyborgMode::Retreat
        && ship.damage >= Fixed::from_num(config.cyborg_recover_damage);
    if damaged || recovering {
        retreat(view, contacts.first(), intents);
        return CyborgState {
            mode: CyborgMode::Retreat,
            target: None,
            hold_course: 0,
        };
    }

    if let Some(target) = view.most_threatening(&contacts, range) {
        steer_at(view, &target, intents);
        view.engage(&target, intents);
        return CyborgState {
            mode: CyborgMode::Engage,
            target: Some(target.id),
            hold_course: 0,
        };
    }

    if view.class.can_lay_mines && ship.cargo.count(Item::Mine) > 0 {
        return lay_mines(view, state, intents);
    }

    patrol(view, state, rng, intents)
}

/// Keep course and drop a mine each time the laying timer runs out.
fn lay_mines(view: &AiView<'_>, state: &CyborgState, intents: &mut IntentQueue) -> CyborgState {
    if state.mode == CyborgMode::MineLay && state.hold_course > 0 {
        return CyborgState {
            mode: CyborgMode::MineLay,
            target: None,
            hold_course: state.hold_course - 1,
        };
    }
    intents.push_action(IntentOrigin::Ai, view.ship.id, ShipAction::LayMine);
    CyborgState {
        mode: CyborgMode::MineLay,
        target: None,
        hold_course: view.config.mine_lay_interval,
    }
}

fn retreat(view: &AiView<'_>, nearest: Option<&Contact>, intents: &mut IntentQueue) {
    let ship = view.ship;
    let Some(threat) = nearest else {
        // Nobody chasing: keep heading, full speed.
        intents.push_course(ship.id, IntentOrigin::Ai, ship.heading, view.class.max_speed);
        return;
    };
    let away = normalize_degrees(threat.bearing + Fixed::from_num(180));
    intents.push_course(ship.id, IntentOrigin::Ai, away, view.class.max_speed);
    if !ship.is_jamming() && ship.cargo.count(Item::Jammer) > 0 {
        intents.push_action(IntentOrigin::Ai, ship.id, ShipAction::Jam);
    }
    if view.class.can_lay_mines && ship.cargo.count(Item::Mine) > 0 {
        intents.push_action(IntentOrigin::Ai, ship.id, ShipAction::LayMine);
    }
}

fn steer_at(view: &AiView<'_>, target: &Contact, intents: &mut IntentQueue) {
    let speed = view.pursuit_speed(target.distance);
    intents.push_course(view.ship.id, IntentOrigin::Ai, target.bearing, speed);
}

fn patrol(
    view: &AiView<'_>,
    state: &CyborgState,
    rng: &mut TickRng,
    intents: &mut IntentQueue,
) -> CyborgState {
    let config = view.config;
    if state.mode == CyborgMode::Patrol && state.hold_course > 0 {
        return CyborgState {
            mode: CyborgMode::Patrol,
            target: None,
            hold_course: state.hold_course - 1,
        };
    }
    let heading = Fixed::from_num(rng.range_u32(0, 359));
    intents.push_course(view.ship.id, IntentOrigin::Ai, heading, view.cruise_speed());
    CyborgState {
        mode: CyborgMode::Patrol,
        target: None,
        hold_course: rng.range_u32(config.patrol_hold_min, config.patrol_hold_max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AiConfig, CombatConfig};
    use crate::entities::{ControlMode, Ship, ShipClass, WeaponKind};
    use crate::math::Vec2Fixed;
    use crate::snapshot::WorldSnapshot;

    fn raider_class() -> ShipClass {
        ShipClass {
            name: "Raider".into(),
            max_speed: Fixed::from_num(2000),
            max_acceleration: Fixed::from_num(200),
            max_turn_rate: Fixed::from_num(30),
            max_energy: Fixed::from_num(5000),
            energy_regen: Fixed::from_num(20),
            max_shield_type: 8,
            armament: [WeaponKind::Phaser, WeaponKind::Torpedo].into_iter().collect(),
            damage_factor: 90,
            repair_rate: Fixed::from_num(2),
            scan_range: Fixed::from_num(100_000),
            sensor_rating: 60,
            tonnage: 800,
            kill_points: 300,
            max_cloak: 0,
            can_lay_mines: true,
        }
    }

    fn world() -> WorldSnapshot {
        let mut world = WorldSnapshot::default();
        world.classes.insert(1, raider_class());
        let mut cyborg = Ship::new(1, 66, 1, Vec2Fixed::from_units(100_000, 50_000));
        cyborg.energy = Fixed::from_num(3000);
        cyborg.control = ControlMode::CyborgAi(CyborgState::default());
        world.ships.insert(1, cyborg);
        world
    }

    fn run(world: &WorldSnapshot, state: &CyborgState) -> (CyborgState, IntentQueue) {
        let ship = &world.ships[&1];
        let config = AiConfig::default();
        let combat = CombatConfig::default();
        let view = AiView {
            world,
            ship,
            class: &world.classes[&1],
            config: &config,
            combat: &combat,
        };
        let mut intents = IntentQueue::new();
        let mut rng = TickRng::new(5, 2);
        let next = evaluate(&view, state, &mut rng, &mut intents);
        (next, intents)
    }

    #[test]
    fn test_engages_visible_hostile() {
        let mut world = world();
        world
            .ships
            .insert(2, Ship::new(2, 1, 1, Vec2Fixed::from_units(120_000, 50_000)));
        let (next, mut intents) = run(&world, &CyborgState::default());
        assert_eq!(next.mode, CyborgMode::Engage);
        assert_eq!(next.target, Some(2));
        let course = intents.courses()[&1];
        assert_eq!(course.heading, Fixed::from_num(90));
        // 20 000 away: inside close range, quarter speed.
        assert_eq!(course.speed, Fixed::from_num(500));
        assert_eq!(intents.take_combat().len(), 1);
    }

    #[test]
    fn test_ignores_cloaked_ships() {
        let mut world = world();
        let mut ghost = Ship::new(2, 1, 1, Vec2Fixed::from_units(110_000, 50_000));
        ghost.cloak = 1;
        world.ships.insert(2, ghost);
        let (next, _) = run(&world, &CyborgState::default());
        assert_ne!(next.mode, CyborgMode::Engage);
    }

    #[test]
    fn test_retreats_until_recovered() {
        let mut world = world();
        world.ships.get_mut(&1).unwrap().damage = Fixed::from_num(55);
        let (next, _) = run(&world, &CyborgState::default());
        assert_eq!(next.mode, CyborgMode::Retreat);

        // Still above the recovery line: keep running.
        world.ships.get_mut(&1).unwrap().damage = Fixed::from_num(30);
        let (next, _) = run(&world, &next);
        assert_eq!(next.mode, CyborgMode::Retreat);

        world.ships.get_mut(&1).unwrap().damage = Fixed::from_num(20);
        let (next, _) = run(&world, &next);
        assert_eq!(next.mode, CyborgMode::Patrol);
    }

    fn unarmed_world() -> WorldSnapshot {
        let mut world = world();
        world.ships.get_mut(&1).unwrap().cargo = Default::default();
        world
    }

    #[test]
    fn test_quiet_cyborg_with_mines_lays_them() {
        let mut world = world();
        world.ships.get_mut(&1).unwrap().cargo.add(Item::Mine, 2);
        let laid = |q: &IntentQueue| {
            q.actions()
                .iter()
                .filter(|a| a.ship == 1 && a.action == ShipAction::LayMine)
                .count()
        };
        let (next, intents) = run(&world, &CyborgState::default());
        assert_eq!(next.mode, CyborgMode::MineLay);
        assert_eq!(next.hold_course, AiConfig::default().mine_lay_interval);
        assert_eq!(laid(&intents), 1);

        // Timer running: stay in MineLay without dropping another.
        let (held, intents) = run(&world, &next);
        assert_eq!(held.mode, CyborgMode::MineLay);
        assert_eq!(held.hold_course, next.hold_course - 1);
        assert_eq!(laid(&intents), 0);

        let expired = CyborgState {
            hold_course: 0,
            ..held
        };
        let (again, intents) = run(&world, &expired);
        assert_eq!(again.mode, CyborgMode::MineLay);
        assert_eq!(laid(&intents), 1);
    }

    #[test]
    fn test_out_of_mines_returns_to_patrol() {
        let world = unarmed_world();
        let state = CyborgState {
            mode: CyborgMode::MineLay,
            target: None,
            hold_course: 3,
        };
        let (next, intents) = run(&world, &state);
        assert_eq!(next.mode, CyborgMode::Patrol);
        assert_eq!(intents.courses().len(), 1);
    }

    #[test]
    fn test_patrol_holds_course() {
        let world = unarmed_world();
        let state = CyborgState {
            mode: CyborgMode::Patrol,
            target: None,
            hold_course: 4,
        };
        let (next, intents) = run(&world, &state);
        assert_eq!(next.hold_course, 3);
        assert!(intents.courses().is_empty());
    }
}
