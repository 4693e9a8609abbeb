//! Ship movement.
//!
//! Each live ship turns toward its desired heading, accelerates toward its
//! desired speed, pays for the maneuver in energy and is displaced along its
//! heading. Heading 0 points north (-y), 90 east (+x).
//!
//! Ships leaving the galaxy either wrap around or, in zipper mode, are thrown
//! back inside, stopped and damaged.

use crate::combat::inflict;
use crate::config::MovementConfig;
use crate::entities::{EntityId, EntityRef, Ship, ShipClass, Subsystem};
use crate::events::{DamageSource, EventLog, WorldEvent};
use crate::math::{normalize_degrees, shortest_turn, Fixed, Vec2Fixed};
use crate::snapshot::{BoundaryMode, Galaxy, TickLedger, WorldSnapshot};

/// New heading after turning at most `max_step` degrees toward `desired`.
#[must_use]
pub fn turn_toward(heading: Fixed, desired: Fixed, max_step: Fixed) -> Fixed {
    let diff = shortest_turn(heading, desired);
    if diff.abs() <= max_step {
        return normalize_degrees(desired);
    }
    let step = if diff > Fixed::ZERO { max_step } else { -max_step };
    normalize_degrees(heading + step)
}

/// New speed after changing at most `accel` (or `decel` when slowing) toward `desired`.
#[must_use]
pub fn approach_speed(speed: Fixed, desired: Fixed, accel: Fixed, decel: Fixed) -> Fixed {
    if desired > speed {
        (speed + accel).min(desired)
    } else {
        (speed - decel).max(desired)
    }
}

/// Outcome of integrating one ship over one tick, before boundary handling.
struct Step {
    heading: Fixed,
    speed: Fixed,
    energy: Fixed,
    desired_speed: Fixed,
    position: Vec2Fixed,
}

fn integrate(ship: &Ship, class: &ShipClass, config: &MovementConfig, dt: Fixed) -> Step {
    let helm = ship.systems.efficiency(Subsystem::Helm);
    let engines = ship.systems.efficiency(Subsystem::Engines);
    let desired_speed = ship.desired_speed.max(Fixed::ZERO).min(class.max_speed);

    let turn_step = class.max_turn_rate.saturating_mul(dt).saturating_mul(helm);
    let accel = class.max_acceleration.saturating_mul(dt).saturating_mul(engines);
    let decel = accel.saturating_mul(Fixed::saturating_from_num(config.decel_factor));

    let mut heading = turn_toward(ship.heading, ship.desired_heading, turn_step);
    let mut speed = approach_speed(ship.speed, desired_speed, accel, decel);
    let mut energy = ship.energy;
    let mut desired = desired_speed;

    let turned = shortest_turn(ship.heading, heading).abs();
    let cost = config.turn_cost * turned + config.accel_cost * (speed - ship.speed).abs();
    if cost > energy {
        // Not enough energy to maneuver: coast.
        heading = ship.heading;
        speed = ship.speed.min(class.max_speed);
    } else {
        energy -= cost;
    }

    if speed > Fixed::from_num(config.cruise_speed) {
        let drain = config.cruise_drain.saturating_mul(dt);
        if energy >= drain {
            energy -= drain;
        } else {
            desired = Fixed::ZERO;
        }
    }

    let distance = speed.saturating_mul(dt);
    let position = ship.position + Vec2Fixed::along_heading(heading, distance);
    Step {
        heading,
        speed,
        energy,
        desired_speed: desired,
        position,
    }
}

/// Whether a zipped ship may land at `spot`.
fn spot_is_clear(
    world: &WorldSnapshot,
    ship: EntityId,
    spot: Vec2Fixed,
    clearance: Fixed,
) -> bool {
    let galaxy = &world.galaxy;
    let mine_near = world
        .mines
        .values()
        .any(|m| m.armed && galaxy.distance(m.position, spot) < clearance);
    let ship_near = world
        .ships
        .values()
        .any(|s| s.id != ship && s.is_alive() && galaxy.distance(s.position, spot) < clearance);
    !mine_near && !ship_near
}

/// Find a landing spot `margin` inside the edge(s) a ship crossed, stepping
/// inward while the spot is crowded. Falls back to wraparound.
fn zipper_landing(
    world: &WorldSnapshot,
    ship: EntityId,
    raw: Vec2Fixed,
    config: &MovementConfig,
) -> Vec2Fixed {
    let galaxy: &Galaxy = &world.galaxy;
    let width = galaxy.width_fixed();
    let height = galaxy.height_fixed();
    let margin = Fixed::from_num(config.zipper_margin);
    let clearance = Fixed::from_num(config.zipper_clearance);

    // Inward direction per axis: +1 from the low edge, -1 from the high edge.
    let (mut x, dx) = if raw.x < Fixed::ZERO {
        (margin, 1)
    } else if raw.x >= width {
        (width - margin, -1)
    } else {
        (raw.x, 0)
    };
    let (mut y, dy) = if raw.y < Fixed::ZERO {
        (margin, 1)
    } else if raw.y >= height {
        (height - margin, -1)
    } else {
        (raw.y, 0)
    };

    for _ in 0..config.zipper_attempts.max(1) {
        let spot = Vec2Fixed::new(x, y);
        if galaxy.contains(spot) && spot_is_clear(world, ship, spot, clearance) {
            return spot;
        }
        x += clearance * Fixed::from_num(dx);
        y += clearance * Fixed::from_num(dy);
    }
    tracing::debug!(ship, "No clear zipper landing, wrapping");
    galaxy.wrap(raw)
}

/// Move every live ship. Returns ships processed.
pub fn run_movement(
    world: &mut WorldSnapshot,
    config: &MovementConfig,
    dt: Fixed,
    ledger: &mut TickLedger,
    events: &mut EventLog,
) -> usize {
    let ids: Vec<EntityId> = world
        .ships
        .values()
        .filter(|s| s.is_alive())
        .filter(|s| !world.is_quarantined(EntityRef::Ship(s.id)))
        .map(|s| s.id)
        .collect();

    let mut moved = 0;
    for id in ids {
        let Some(ship) = world.ships.get_mut(&id) else {
            continue;
        };
        // Held by a tractor lock: the lock wears off one movement pass at a time.
        if ship.cant_exit > 0 {
            ship.cant_exit -= 1;
            continue;
        }
        let ship = &*ship;
        let Some(class) = world.classes.get(&ship.class) else {
            continue;
        };
        let from = ship.position;
        let step = integrate(ship, class, config, dt);

        let mut zipped = false;
        let position = if world.galaxy.contains(step.position) {
            step.position
        } else {
            match world.galaxy.boundary {
                BoundaryMode::Wrap => world.galaxy.wrap(step.position),
                BoundaryMode::Zipper => {
                    zipped = true;
                    zipper_landing(world, id, step.position, config)
                }
            }
        };
        let neutral = world.galaxy.is_neutral(position);

        let Some(ship) = world.ships.get_mut(&id) else {
            continue;
        };
        ship.heading = step.heading;
        ship.speed = step.speed;
        ship.energy = step.energy;
        ship.desired_speed = step.desired_speed;
        ship.position = position;
        moved += 1;

        if position != from {
            events.push(WorldEvent::ShipMoved {
                ship: id,
                from,
                to: position,
            });
        }
        if neutral && ship.self_destruct.take().is_some() {
            events.push(WorldEvent::SelfDestructAborted { ship: id });
        }
        if zipped {
            ship.speed = Fixed::ZERO;
            ship.desired_speed = Fixed::ZERO;
            events.push(WorldEvent::ShipZipped { ship: id, position });
            let damage = Fixed::from_num(config.zipper_damage);
            events.push(WorldEvent::DamageDealt {
                target: id,
                source: DamageSource::Zipper,
                hull: damage,
                absorbed: Fixed::ZERO,
                critical: false,
            });
            inflict(world, id, damage, None, ledger, events);
        }
    }
    moved
}
