//! Orders and ship housekeeping.
//!
//! [`apply_orders`] writes collected intents (courses, actions, AI state)
//! onto the working world. [`run_upkeep`] does the per-tick bookkeeping
//! every live ship needs before it moves: timers, energy, shields, cloak and
//! droid self-repair.

use crate::config::{CombatConfig, EngineConfig, UpkeepConfig};
use crate::entities::{ControlMode, DroidMode, EntityId, EntityRef, Item, ShieldStatus, Subsystem};
use crate::error::{EntityError, ErrorReport};
use crate::events::{EventLog, WorldEvent};
use crate::intent::{IntentQueue, ShipAction};
use crate::math::{clamp_fixed, normalize_degrees, Fixed};
use crate::snapshot::{MineSpawn, TickLedger, WorldSnapshot};

fn live_ships(world: &WorldSnapshot) -> Vec<EntityId> {
    world
        .ships
        .values()
        .filter(|s| s.is_alive() && !world.is_quarantined(EntityRef::Ship(s.id)))
        .map(|s| s.id)
        .collect()
}

/// Apply collected courses, actions and AI states. Returns intents applied.
pub fn apply_orders(
    world: &mut WorldSnapshot,
    intents: &IntentQueue,
    config: &EngineConfig,
    ledger: &mut TickLedger,
    events: &mut EventLog,
    errors: &mut ErrorReport,
) -> usize {
    let mut applied = 0;

    for (&id, state) in intents.ai_states() {
        let Some(ship) = world.ships.get_mut(&id) else {
            continue;
        };
        if !ship.is_alive() || !ship.is_ai() {
            continue;
        }
        if let (Some(from), Some(to)) = (ship.control.ai_mode(), state.ai_mode()) {
            if from != to {
                tracing::debug!(ship = id, ?from, ?to, "AI mode change");
                events.push(WorldEvent::AiStateChanged { ship: id, from, to });
            }
        }
        ship.control = state.clone();
    }

    for (&id, course) in intents.courses() {
        let Some(ship) = world.ships.get_mut(&id) else {
            continue;
        };
        if !ship.is_alive() {
            continue;
        }
        let max_speed = world
            .classes
            .get(&ship.class)
            .map_or(Fixed::ZERO, |c| c.max_speed);
        let speed = clamp_fixed(course.speed, Fixed::ZERO, max_speed);
        if speed != course.speed {
            errors.push(EntityError::clamped(
                EntityRef::Ship(id),
                "desired_speed",
                format!("{} -> {speed}", course.speed),
            ));
        }
        ship.desired_heading = normalize_degrees(course.heading);
        ship.desired_speed = speed;
        applied += 1;
    }

    for intent in intents.actions() {
        let ok = apply_action(
            world,
            intent.ship,
            intent.action,
            &config.combat,
            ledger,
            events,
            errors,
        );
        if ok {
            applied += 1;
        }
    }
    applied
}

fn apply_action(
    world: &mut WorldSnapshot,
    id: EntityId,
    action: ShipAction,
    config: &CombatConfig,
    ledger: &mut TickLedger,
    events: &mut EventLog,
    errors: &mut ErrorReport,
) -> bool {
    let entity = EntityRef::Ship(id);
    let galaxy = world.galaxy;
    let Some(ship) = world.ships.get_mut(&id) else {
        return false;
    };
    if !ship.is_alive() {
        return false;
    }
    let Some(class) = world.classes.get(&ship.class) else {
        return false;
    };

    match action {
        ShipAction::RaiseShields => ship.shield.status = ShieldStatus::Up,
        ShipAction::LowerShields => ship.shield.status = ShieldStatus::Down,
        ShipAction::Cloak(level) => {
            if level > class.max_cloak {
                errors.push(EntityError::clamped(
                    entity,
                    "cloak",
                    format!("{level} -> {}", class.max_cloak),
                ));
            }
            ship.cloak = level.min(class.max_cloak);
        }
        ShipAction::ArmSelfDestruct => {
            if ship.self_destruct.is_some() {
                return false;
            }
            if galaxy.is_neutral(ship.position) {
                errors.push(EntityError::skipped(entity, "self-destruct in neutral zone"));
                return false;
            }
            let countdown = config.self_destruct_countdown.max(1);
            ship.self_destruct = Some(countdown);
            events.push(WorldEvent::SelfDestructArmed { ship: id, countdown });
        }
        ShipAction::AbortSelfDestruct => {
            if ship.self_destruct.take().is_none() {
                return false;
            }
            events.push(WorldEvent::SelfDestructAborted { ship: id });
        }
        ShipAction::LayMine => {
            if !class.can_lay_mines || !ship.cargo.take(Item::Mine, 1) {
                errors.push(EntityError::skipped(entity, "no mine to lay"));
                return false;
            }
            ledger.spawned_mines.push(MineSpawn {
                laid_by: id,
                owner: ship.owner,
                position: ship.position,
                timer: config.mine_arm_ticks,
                damage_potential: Fixed::from_num(config.mine_damage),
            });
            events.push(WorldEvent::MineLaid {
                ship: id,
                position: ship.position,
            });
        }
        ShipAction::Jam => {
            if !ship.cargo.take(Item::Jammer, 1) {
                errors.push(EntityError::skipped(entity, "no jammer aboard"));
                return false;
            }
            ship.jammer_ticks = config.jammer_duration;
        }
    }
    true
}

/// Per-tick housekeeping for every live ship. Returns ships processed.
pub fn run_upkeep(
    world: &mut WorldSnapshot,
    config: &EngineConfig,
    dt: Fixed,
    events: &mut EventLog,
) -> usize {
    let upkeep: &UpkeepConfig = &config.upkeep;
    let ids = live_ships(world);
    for &id in &ids {
        let Some(ship) = world.ships.get_mut(&id) else {
            continue;
        };
        let Some(class) = world.classes.get(&ship.class) else {
            continue;
        };

        ship.cooldowns.retain(|_, ticks| {
            *ticks = ticks.saturating_sub(1);
            *ticks > 0
        });
        ship.jammer_ticks = ship.jammer_ticks.saturating_sub(1);

        let regen = class.energy_regen.saturating_mul(dt);
        ship.energy = ship.energy.saturating_add(regen).min(class.max_energy);

        if ship.shield.is_up() {
            let drain = upkeep.shield_drain.saturating_mul(dt);
            ship.energy = ship.energy.saturating_sub(drain).max(Fixed::ZERO);
            if ship.energy < Fixed::from_num(upkeep.shield_min_energy) {
                ship.shield.status = ShieldStatus::Down;
                events.push(WorldEvent::ShieldsDropped { ship: id });
            } else {
                let efficiency = ship.systems.efficiency(Subsystem::Shields);
                let gain = upkeep.shield_recharge.saturating_mul(dt).saturating_mul(efficiency);
                let charge = ship.shield.charge.saturating_add(gain);
                ship.shield.charge = charge.min(Fixed::from_num(100));
            }
        }

        if ship.cloak > 0 {
            let cost = (upkeep.cloak_drain * Fixed::from_num(ship.cloak)).saturating_mul(dt);
            if ship.energy >= cost {
                ship.energy -= cost;
            } else {
                ship.cloak = 0;
                events.push(WorldEvent::CloakFailed { ship: id });
            }
        }

        if let ControlMode::DroidAi(state) = &ship.control {
            if state.mode == DroidMode::SelfRepair {
                let per_point = Fixed::from_num(config.ai.repair_energy_per_point.max(1));
                let affordable = ship.energy / per_point;
                let repaired = class.repair_rate.min(ship.damage).min(affordable);
                if repaired > Fixed::ZERO {
                    ship.damage -= repaired;
                    ship.energy -= repaired * per_point;
                }
            }
        }
    }
    ids.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DroidState, Ship, ShipClass, WeaponKind};
    use crate::intent::IntentOrigin;
    use crate::math::Vec2Fixed;

    fn world_with_ship() -> WorldSnapshot {
        let mut world = WorldSnapshot::default();
        world.classes.insert(
            1,
            ShipClass {
                name: "Frigate".into(),
                max_speed: Fixed::from_num(1000),
                max_acceleration: Fixed::from_num(100),
                max_turn_rate: Fixed::from_num(30),
                max_energy: Fixed::from_num(1000),
                energy_regen: Fixed::from_num(10),
                max_shield_type: 5,
                armament: [WeaponKind::Phaser].into_iter().collect(),
                damage_factor: 90,
                repair_rate: Fixed::from_num(5),
                scan_range: Fixed::from_num(50_000),
                sensor_rating: 50,
                tonnage: 100,
                kill_points: 100,
                max_cloak: 2,
                can_lay_mines: true,
            },
        );
        let mut ship = Ship::new(1, 1, 1, Vec2Fixed::from_units(500, 500));
        ship.energy = Fixed::from_num(500);
        world.ships.insert(1, ship);
        world
    }

    #[test]
    fn test_cooldowns_tick_down_and_energy_regenerates() {
        let mut world = world_with_ship();
        let ship = world.ships.get_mut(&1).unwrap();
        ship.cooldowns.insert(WeaponKind::Phaser, 1);
        ship.cooldowns.insert(WeaponKind::Torpedo, 3);
        let mut events = EventLog::new();
        run_upkeep(&mut world, &EngineConfig::default(), Fixed::ONE, &mut events);
        let ship = &world.ships[&1];
        assert_eq!(ship.cooldown(WeaponKind::Phaser), 0);
        assert_eq!(ship.cooldown(WeaponKind::Torpedo), 2);
        assert_eq!(ship.energy, Fixed::from_num(510));
    }

    #[test]
    fn test_shields_drop_when_energy_runs_low() {
        let mut world = world_with_ship();
        let ship = world.ships.get_mut(&1).unwrap();
        ship.energy = Fixed::from_num(40);
        ship.shield.status = ShieldStatus::Up;
        let mut events = EventLog::new();
        run_upkeep(&mut world, &EngineConfig::default(), Fixed::ONE, &mut events);
        assert!(!world.ships[&1].shield.is_up());
        assert_eq!(events, vec![WorldEvent::ShieldsDropped { ship: 1 }]);
    }

    #[test]
    fn test_self_repair_spends_energy() {
        let mut world = world_with_ship();
        let ship = world.ships.get_mut(&1).unwrap();
        ship.damage = Fixed::from_num(70);
        let mut state = DroidState::new(Vec2Fixed::ZERO);
        state.mode = DroidMode::SelfRepair;
        ship.control = ControlMode::DroidAi(state);
        let mut events = EventLog::new();
        run_upkeep(&mut world, &EngineConfig::default(), Fixed::ONE, &mut events);
        let ship = &world.ships[&1];
        assert_eq!(ship.damage, Fixed::from_num(65));
        // 500 + 10 regen - 5 points * 10 energy
        assert_eq!(ship.energy, Fixed::from_num(460));
    }

    #[test]
    fn test_lay_mine_and_self_destruct_orders() {
        let mut world = world_with_ship();
        world.ships.get_mut(&1).unwrap().cargo.add(Item::Mine, 1);
        let mut intents = IntentQueue::new();
        intents.push_action(IntentOrigin::Command, 1, ShipAction::LayMine);
        intents.push_action(IntentOrigin::Command, 1, ShipAction::LayMine);
        intents.push_action(IntentOrigin::Command, 1, ShipAction::ArmSelfDestruct);

        let mut ledger = TickLedger::default();
        let mut events = EventLog::new();
        let mut errors = ErrorReport::default();
        let applied = apply_orders(
            &mut world,
            &intents,
            &EngineConfig::default(),
            &mut ledger,
            &mut events,
            &mut errors,
        );
        assert_eq!(applied, 2);
        assert_eq!(ledger.spawned_mines.len(), 1);
        assert_eq!(ledger.spawned_mines[0].timer, 3);
        assert_eq!(world.ships[&1].self_destruct, Some(10));
        assert_eq!(errors.len(), 1);
    }
}
