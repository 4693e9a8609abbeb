//! Input validation.
//!
//! Runs on the working copy before any engine. Out-of-range fields are
//! clamped and reported; entities that cannot be processed at all are
//! quarantined and reported as fatal. Quarantined entities are skipped by
//! every later phase.

use crate::config::EngineConfig;
use crate::entities::{EntityRef, BEACON_MESSAGE_MAX, MAX_SHIELD_TYPE};
use crate::error::{EntityError, ErrorReport};
use crate::math::{clamp_fixed, normalize_degrees, Fixed};
use crate::snapshot::WorldSnapshot;

const HUNDRED: Fixed = Fixed::from_bits(100 << 32);

/// Validate and repair the world in place. Returns how many entities were checked.
pub fn validate_world(
    world: &mut WorldSnapshot,
    config: &EngineConfig,
    errors: &mut ErrorReport,
) -> usize {
    let mut checked = 0;
    checked += validate_ships(world, errors);
    checked += validate_planets(world, config, errors);
    checked += validate_hazards(world, errors);
    checked
}

fn validate_ships(world: &mut WorldSnapshot, errors: &mut ErrorReport) -> usize {
    let galaxy = world.galaxy;
    let mut checked = 0;
    let mut quarantine = Vec::new();

    for ship in world.ships.values_mut() {
        let entity = EntityRef::Ship(ship.id);
        if world.quarantine.contains(&entity) || ship.destroyed {
            continue;
        }
        checked += 1;

        let Some(class) = world.classes.get(&ship.class) else {
            errors.push(EntityError::MissingClass {
                entity,
                class: ship.class,
            });
            quarantine.push(entity);
            continue;
        };
        if class.max_energy <= Fixed::ZERO {
            errors.push(EntityError::Corrupt {
                entity,
                reason: format!("class {} has no energy capacity", class.name),
            });
            quarantine.push(entity);
            continue;
        }

        let speed = clamp_fixed(ship.speed, Fixed::ZERO, class.max_speed);
        if speed != ship.speed {
            errors.push(EntityError::clamped(
                entity,
                "speed",
                format!("{} -> {}", ship.speed, speed),
            ));
            ship.speed = speed;
        }
        let desired = clamp_fixed(ship.desired_speed, Fixed::ZERO, class.max_speed);
        if desired != ship.desired_speed {
            errors.push(EntityError::clamped(
                entity,
                "desired_speed",
                format!("{} -> {}", ship.desired_speed, desired),
            ));
            ship.desired_speed = desired;
        }
        for (field, value) in [
            ("heading", &mut ship.heading),
            ("desired_heading", &mut ship.desired_heading),
        ] {
            let normalized = normalize_degrees(*value);
            if normalized != *value {
                errors.push(EntityError::clamped(
                    entity,
                    field,
                    format!("{} -> {}", *value, normalized),
                ));
                *value = normalized;
            }
        }
        let damage = clamp_fixed(ship.damage, Fixed::ZERO, HUNDRED);
        if damage != ship.damage {
            errors.push(EntityError::clamped(
                entity,
                "damage",
                format!("{} -> {}", ship.damage, damage),
            ));
            ship.damage = damage;
        }
        let energy = clamp_fixed(ship.energy, Fixed::ZERO, class.max_energy);
        if energy != ship.energy {
            errors.push(EntityError::clamped(
                entity,
                "energy",
                format!("{} -> {}", ship.energy, energy),
            ));
            ship.energy = energy;
        }
        let shield_cap = class.max_shield_type.min(MAX_SHIELD_TYPE);
        if ship.shield.kind > shield_cap {
            errors.push(EntityError::clamped(
                entity,
                "shield.kind",
                format!("{} -> {}", ship.shield.kind, shield_cap),
            ));
            ship.shield.kind = shield_cap;
        }
        let charge = clamp_fixed(ship.shield.charge, Fixed::ZERO, HUNDRED);
        if charge != ship.shield.charge {
            errors.push(EntityError::clamped(
                entity,
                "shield.charge",
                format!("{} -> {}", ship.shield.charge, charge),
            ));
            ship.shield.charge = charge;
        }
        if ship.cloak > class.max_cloak {
            errors.push(EntityError::clamped(
                entity,
                "cloak",
                format!("{} -> {}", ship.cloak, class.max_cloak),
            ));
            ship.cloak = class.max_cloak;
        }
        for system in crate::entities::Subsystem::ALL {
            let value = ship.systems.get_mut(system);
            *value = clamp_fixed(*value, Fixed::ZERO, HUNDRED);
        }
        if !galaxy.contains(ship.position) {
            let wrapped = galaxy.wrap(ship.position);
            errors.push(EntityError::clamped(
                entity,
                "position",
                format!("{:?} -> {:?}", ship.position, wrapped),
            ));
            ship.position = wrapped;
        }
    }

    if !quarantine.is_empty() {
        tracing::warn!(count = quarantine.len(), "Quarantining ships");
    }
    world.quarantine.extend(quarantine);
    checked
}

fn validate_planets(
    world: &mut WorldSnapshot,
    config: &EngineConfig,
    errors: &mut ErrorReport,
) -> usize {
    let mut checked = 0;
    for planet in world.planets.values_mut() {
        let entity = EntityRef::Planet(planet.id);
        if world.quarantine.contains(&entity) {
            continue;
        }
        checked += 1;

        for (field, value) in [
            ("environment", &mut planet.environment),
            ("resources", &mut planet.resources),
        ] {
            let clamped = (*value).clamp(1, 5);
            if clamped != *value {
                errors.push(EntityError::clamped(
                    entity,
                    field,
                    format!("{} -> {clamped}", *value),
                ));
                *value = clamped;
            }
        }
        let ceiling = config.economy.max_tax_rate.min(100);
        if planet.tax_rate > ceiling {
            errors.push(EntityError::clamped(
                entity,
                "tax_rate",
                format!("{} -> {ceiling}", planet.tax_rate),
            ));
            planet.tax_rate = ceiling;
        }
        let cap = planet.max_quantity;
        for item in crate::entities::Item::ALL {
            let stock = planet.stock_mut(item);
            if stock.quantity > cap {
                errors.push(EntityError::clamped(
                    entity,
                    "quantity",
                    format!("{item:?} {} -> {cap}", stock.quantity),
                ));
                stock.quantity = cap;
            }
        }
    }
    checked
}

fn validate_hazards(world: &mut WorldSnapshot, errors: &mut ErrorReport) -> usize {
    let galaxy = world.galaxy;
    let mut checked = 0;

    for mine in world.mines.values_mut() {
        let entity = EntityRef::Mine(mine.id);
        if world.quarantine.contains(&entity) {
            continue;
        }
        checked += 1;
        if !galaxy.contains(mine.position) {
            mine.position = galaxy.wrap(mine.position);
            errors.push(EntityError::clamped(entity, "position", "wrapped into galaxy"));
        }
        if mine.damage_potential < Fixed::ZERO {
            mine.damage_potential = Fixed::ZERO;
            errors.push(EntityError::clamped(entity, "damage_potential", "negative -> 0"));
        }
    }

    for wormhole in world.wormholes.values_mut() {
        let entity = EntityRef::Wormhole(wormhole.id);
        if world.quarantine.contains(&entity) {
            continue;
        }
        checked += 1;
        if wormhole.stability > 100 {
            errors.push(EntityError::clamped(
                entity,
                "stability",
                format!("{} -> 100", wormhole.stability),
            ));
            wormhole.stability = 100;
        }
        if wormhole.energy_required < Fixed::ZERO {
            wormhole.energy_required = Fixed::ZERO;
            errors.push(EntityError::clamped(entity, "energy_required", "negative -> 0"));
        }
    }

    for beacon in world.beacons.values_mut() {
        let entity = EntityRef::Beacon(beacon.id);
        if world.quarantine.contains(&entity) {
            continue;
        }
        checked += 1;
        if beacon.message.chars().count() > BEACON_MESSAGE_MAX {
            beacon.message = beacon.message.chars().take(BEACON_MESSAGE_MAX).collect();
            errors.push(EntityError::clamped(
                entity,
                "message",
                format!("truncated to {BEACON_MESSAGE_MAX} characters"),
            ));
        }
    }
    checked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Planet, Ship, ShipClass};
    use crate::error::Severity;
    use crate::math::Vec2Fixed;

    fn class() -> ShipClass {
        ShipClass {
            name: "Scout".into(),
            max_speed: Fixed::from_num(1000),
            max_acceleration: Fixed::from_num(100),
            max_turn_rate: Fixed::from_num(30),
            max_energy: Fixed::from_num(1000),
            energy_regen: Fixed::from_num(10),
            max_shield_type: 5,
            armament: Default::default(),
            damage_factor: 90,
            repair_rate: Fixed::from_num(2),
            scan_range: Fixed::from_num(50_000),
            sensor_rating: 50,
            tonnage: 100,
            kill_points: 100,
            max_cloak: 0,
            can_lay_mines: false,
        }
    }

    #[test]
    fn test_ship_fields_are_clamped() {
        let mut world = WorldSnapshot::default();
        world.classes.insert(1, class());
        let mut ship = Ship::new(7, 1, 1, Vec2Fixed::from_units(-10, 20));
        ship.speed = Fixed::from_num(-5);
        ship.heading = Fixed::from_num(450);
        ship.damage = Fixed::from_num(140);
        ship.energy = Fixed::from_num(5000);
        ship.shield.kind = 12;
        world.ships.insert(7, ship);

        let mut errors = ErrorReport::default();
        let checked = validate_world(&mut world, &EngineConfig::default(), &mut errors);
        assert_eq!(checked, 1);

        let ship = &world.ships[&7];
        assert_eq!(ship.speed, Fixed::ZERO);
        assert_eq!(ship.heading, Fixed::from_num(90));
        assert_eq!(ship.damage, Fixed::from_num(100));
        assert_eq!(ship.energy, Fixed::from_num(1000));
        assert_eq!(ship.shield.kind, 5);
        assert!(world.galaxy.contains(ship.position));
        assert!(errors
            .by_severity(Severity::Validation)
            .all(|e| e.entity() == EntityRef::Ship(7)));
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_missing_class_quarantines() {
        let mut world = WorldSnapshot::default();
        world.ships.insert(3, Ship::new(3, 1, 99, Vec2Fixed::ZERO));
        let mut errors = ErrorReport::default();
        validate_world(&mut world, &EngineConfig::default(), &mut errors);
        assert!(world.is_quarantined(EntityRef::Ship(3)));
        assert_eq!(errors.quarantined(), vec![EntityRef::Ship(3)]);
    }

    #[test]
    fn test_planet_ratings_and_beacon_text() {
        let mut world = WorldSnapshot::default();
        world.planets.insert(
            1,
            Planet {
                id: 1,
                name: "Ceti".into(),
                owner: None,
                position: Vec2Fixed::ZERO,
                environment: 9,
                resources: 0,
                technology: 0,
                stocks: Default::default(),
                max_quantity: 100,
                cash: 0,
                tax_rate: 180,
                population: 0,
                warnings: 0,
                last_attacked: None,
            },
        );
        world.beacons.insert(
            2,
            crate::entities::Beacon {
                id: 2,
                owner: 1,
                position: Vec2Fixed::ZERO,
                message: "x".repeat(100),
                expires_at: None,
                active: true,
            },
        );
        let mut errors = ErrorReport::default();
        validate_world(&mut world, &EngineConfig::default(), &mut errors);
        let planet = &world.planets[&1];
        assert_eq!(planet.environment, 5);
        assert_eq!(planet.resources, 1);
        assert_eq!(planet.tax_rate, 100);
        assert_eq!(world.beacons[&2].message.len(), BEACON_MESSAGE_MAX);
        assert_eq!(errors.len(), 4);
    }
}
